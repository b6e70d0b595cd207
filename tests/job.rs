mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use jobvisor::{
    ActionRef, EventTrigger, Job, JobExecution, JobExecutionState, PipelineConfig, Task,
};
use serde_json::json;

use common::{
    Acks, Database, Journal, Mode, Numbers, Schedule, Step, Webhook, data, eventually,
    init_tracing, num,
};

fn fast() -> PipelineConfig {
    PipelineConfig {
        poll_timeout: Duration::from_millis(50),
        offer_timeout: Duration::from_millis(20),
        termination_wait: Duration::from_millis(200),
        idle_check_interval: Duration::from_millis(10),
        ..PipelineConfig::default()
    }
}

async fn run(job: &Job) -> Arc<JobExecution> {
    let execution = Arc::new(JobExecution::new(job.id()));
    job.run(Arc::clone(&execution)).await;
    execution
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tasks_run_in_order_and_finish() {
    init_tracing();
    let journal = Arc::new(Journal::default());
    let first = Arc::new(Step::new("first", Mode::Pass, 2).with_journal(&journal));
    let second = Arc::new(Step::new("second", Mode::Pass, 1).with_journal(&journal));

    let job = Job::builder("ordered")
        .with_task(Task::builder("t1").with_action(first.clone()).build())
        .with_task(
            Task::builder("t2")
                .with_name("second task")
                .with_action(second.clone())
                .build(),
        )
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Finished);
    assert!(execution.started().is_some());
    assert!(execution.finished().is_some());
    assert_eq!(execution.current_task().as_deref(), Some("second task"));

    let processed: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("process:"))
        .collect();
    assert_eq!(processed, vec!["process:first", "process:second"]);
    assert!(job.current_execution().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_inactive_task_is_skipped() {
    let skipped = Step::pass("skipped");
    let job = Job::builder("skips")
        .with_task(Task::builder("on").with_action(Step::pass("ran")).build())
        .with_task(
            Task::builder("off")
                .with_active(false)
                .with_action(skipped.clone())
                .build(),
        )
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Finished);
    assert_eq!(skipped.calls(), 0);
    assert_eq!(execution.current_task().as_deref(), Some("on"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_action_failure_fails_execution_and_stops_later_tasks() {
    init_tracing();
    let later = Step::pass("later");
    let job = Job::builder("broken")
        .with_task(
            Task::builder("t1")
                .with_action(Arc::new(Step::new("bad", Mode::Fail, 2)))
                .build(),
        )
        .with_task(Task::builder("t2").with_action(later.clone()).build())
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Failed);
    let cause = execution.error_cause().unwrap();
    assert!(cause.contains("bad rejected item"), "cause: {cause}");
    assert_eq!(later.calls(), 0);
    assert!(execution.finished().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_configuration_error_fails_before_processing() {
    let job = Job::builder("misconfigured")
        .with_task(
            Task::builder("t")
                .with_action(Arc::new(Step::new("zero", Mode::Pass, 0)))
                .build(),
        )
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Failed);
    assert!(
        execution
            .error_cause()
            .unwrap()
            .starts_with("invalid pipeline configuration")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_winds_down_a_blocked_pipeline() {
    init_tracing();
    let blocker = Arc::new(Step::new("blocker", Mode::Block, 2));
    let job = Arc::new(
        Job::builder("blocked")
            .with_task(Task::builder("t").with_action(blocker.clone()).build())
            .with_config(fast())
            .build(),
    );
    assert!(!job.cancel());

    let execution = Arc::new(JobExecution::new("blocked"));
    let handle = tokio::spawn({
        let job = Arc::clone(&job);
        let execution = Arc::clone(&execution);
        async move { job.run(execution).await }
    });

    assert!(eventually(Duration::from_secs(2), || blocker.calls() == 1).await);
    assert_eq!(execution.state(), JobExecutionState::Running);
    assert!(job.cancel());

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run winds down after cancel")
        .unwrap();
    assert_eq!(execution.state(), JobExecutionState::Cancelled);
    assert!(execution.finished().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_provider_dispatches_one_item_per_datum() {
    let step = Step::pass("collect");
    let job = Job::builder("provided")
        .with_trigger(Schedule::new(data(&[("env", json!("prod"))])))
        .with_task(
            Task::builder("t")
                .with_provider(Numbers::new(5))
                .with_action(step.clone())
                .build(),
        )
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Finished);
    let seen = step.seen();
    assert_eq!(seen.len(), 5);
    let ns: BTreeSet<i64> = seen.iter().filter_map(|i| num(i, "n")).collect();
    assert_eq!(ns, (0..5).collect());
    assert!(
        seen.iter()
            .all(|i| i.data().unwrap()["env"] == json!("prod"))
    );
    assert!(seen.iter().all(|i| i.job_id() == Some("provided")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_trigger_data_wins_over_provided_data() {
    let step = Step::pass("collect");
    let job = Job::builder("overlay")
        .with_trigger(Schedule::new(data(&[("n", json!(42))])))
        .with_task(
            Task::builder("t")
                .with_provider(Numbers::new(2))
                .with_action(step.clone())
                .build(),
        )
        .with_config(fast())
        .build();

    run(&job).await;

    let seen = step.seen();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|i| num(i, "n") == Some(42)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_trigger_is_acknowledged_per_item_reaching_last_action() {
    let acks = Arc::new(Acks::default());
    let actions: Vec<ActionRef> = vec![
        Arc::new(Step::new("a", Mode::Pass, 2)),
        Arc::new(Step::new("b", Mode::Pass, 1)),
    ];
    let job = Job::builder("acked")
        .with_trigger(Schedule::acknowledged(data(&[]), &acks))
        .with_task(
            Task::builder("t")
                .with_provider(Numbers::new(3))
                .with_actions(actions)
                .build(),
        )
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Finished);
    assert_eq!(acks.count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_trigger_is_acknowledged_on_dispatch_without_actions() {
    let acks = Arc::new(Acks::default());
    let job = Job::builder("empty")
        .with_trigger(Schedule::acknowledged(data(&[]), &acks))
        .with_task(
            Task::builder("t")
                .with_action(Arc::new(Step::new("off", Mode::Pass, 1).inactive()))
                .build(),
        )
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Finished);
    assert_eq!(acks.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_connector_wraps_its_owners_once() {
    let journal = Arc::new(Journal::default());
    let db = Database::new(&journal);
    let a = Step::new("a", Mode::Pass, 1)
        .with_journal(&journal)
        .with_connector(db.clone());
    let b = Step::new("b", Mode::Pass, 1)
        .with_journal(&journal)
        .with_connector(db);
    let actions: Vec<ActionRef> = vec![Arc::new(a), Arc::new(b)];

    let job = Job::builder("connected")
        .with_task(Task::builder("t").with_actions(actions).build())
        .with_config(fast())
        .build();

    let execution = run(&job).await;

    assert_eq!(execution.state(), JobExecutionState::Finished);
    assert_eq!(
        journal.entries(),
        vec![
            "init:db",
            "init:a",
            "init:b",
            "process:a",
            "process:b",
            "shutdown:b",
            "shutdown:a",
            "shutdown:db",
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_event_job_stays_active_and_counts_events() {
    init_tracing();
    let webhook = Webhook::new();
    let step = Step::pass("handle");
    let job = Arc::new(
        Job::builder("hooks")
            .with_trigger(webhook.clone())
            .with_task(Task::builder("t").with_action(step.clone()).build())
            .with_config(fast())
            .build(),
    );
    assert!(job.is_event_triggered());
    assert_eq!(job.live_state(), JobExecutionState::Active);

    let execution = Arc::new(JobExecution::new("hooks"));
    let handle = tokio::spawn({
        let job = Arc::clone(&job);
        let execution = Arc::clone(&execution);
        async move { job.run(execution).await }
    });

    assert!(eventually(Duration::from_secs(2), || webhook.is_listening()).await);
    assert_eq!(execution.state(), JobExecutionState::Active);

    webhook.process_event(data(&[("n", json!(1))])).unwrap();
    webhook.process_event(data(&[("n", json!(2))])).unwrap();
    assert!(
        eventually(Duration::from_secs(2), || {
            execution.processed_events() == 2 && step.calls() == 2
        })
        .await
    );

    let seen = step.seen();
    assert!(
        seen.iter()
            .all(|i| i.meta().unwrap()["source"] == json!("webhook"))
    );

    assert!(job.cancel());
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("event job stops after cancel")
        .unwrap();
    assert_eq!(execution.state(), JobExecutionState::Cancelled);
    assert!(!webhook.is_listening());
    assert!(webhook.process_event(data(&[])).is_err());
}

#[tokio::test]
async fn test_simulation_limits_provided_input() {
    let step = Step::pass("preview");
    let config = PipelineConfig {
        simulation_limit: 4,
        ..fast()
    };
    let job = Job::builder("dry")
        .with_task(
            Task::builder("t")
                .with_provider(Numbers::new(10))
                .with_action(step.clone())
                .build(),
        )
        .with_config(config)
        .build();

    let sims = job.simulate().await.unwrap();

    assert_eq!(sims.len(), 1);
    assert_eq!(sims[0].task_id, "t");
    assert_eq!(sims[0].input.len(), 4);
    let stage = &sims[0].stages[0];
    assert_eq!(stage.action_id, "preview");
    assert_eq!(stage.items.len(), 4);
    assert!(stage.items.iter().all(|i| i.is_simulation()));
    assert!(stage.items.iter().all(|i| i.data().unwrap()["preview"] == json!(true)));
    assert!(job.current_execution().is_none());
}

#[tokio::test]
async fn test_simulation_uses_event_samples() {
    let webhook = Webhook::with_samples(vec![data(&[("n", json!(1))]), data(&[("n", json!(2))])]);
    let job = Job::builder("dry-hooks")
        .with_trigger(webhook.clone())
        .with_task(Task::builder("t").with_action(Step::pass("p")).build())
        .build();

    let sims = job.simulate().await.unwrap();

    let input: Vec<i64> = sims[0].input.iter().filter_map(|i| num(i, "n")).collect();
    assert_eq!(input, vec![1, 2]);
    assert_eq!(sims[0].stages[0].items.len(), 2);
    assert!(!webhook.is_listening());
}
