//! # Data items flowing through action chains.
//!
//! A [`DataItem`] is a JSON object with two reserved top-level sections:
//! ```text
//! {
//!   "meta": { "jobId": "...", "taskId": "...", "timestamp": 1700000000000, ... },
//!   "data": { ...action-visible payload... }
//! }
//! ```
//! Reserved keys are enumerated by [`DataKey`].

mod item;

pub use item::{DataItem, DataKey, Map, Value};
