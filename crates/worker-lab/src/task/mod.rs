//! Task and result model
//!
//! - [`Task`] - immutable unit of work (operation tag + integer payload)
//! - [`TaskResult`] - output of processing one task
//! - [`TaskGenerator`] - deterministic producer used by the demo, tests and benches

mod definition;
mod generator;
mod result;

pub use definition::{Operation, Task};
pub use generator::{OperationMix, TaskGenerator};
pub use result::{ResultValue, TaskResult};
