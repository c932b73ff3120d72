//! Task generation for demos, tests and benchmarks
//!
//! Stands in for the external producer: ids are sequential, payloads are
//! deterministic (see [`Task::generate`]).

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::definition::{Operation, Task};

/// How the generator picks an operation for each task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperationMix {
    /// Sum, Multiply, Square, Filter, Sum, ...
    #[default]
    RoundRobin,
    /// Uniformly random over the known operations
    Random,
    /// Always the same operation
    Fixed(Operation),
}

/// Produces batches of tasks with sequential ids
#[derive(Debug, Clone)]
pub struct TaskGenerator {
    next_id: u64,
    payload_size: usize,
    mix: OperationMix,
}

impl TaskGenerator {
    pub fn new(payload_size: usize) -> Self {
        Self {
            next_id: 0,
            payload_size,
            mix: OperationMix::default(),
        }
    }

    /// Set the operation mix
    pub fn with_mix(mut self, mix: OperationMix) -> Self {
        self.mix = mix;
        self
    }

    /// Start numbering tasks at `id`
    pub fn starting_at(mut self, id: u64) -> Self {
        self.next_id = id;
        self
    }

    /// Generate the next task
    pub fn next_task(&mut self) -> Task {
        let id = self.next_id;
        self.next_id += 1;

        let operation = match self.mix {
            OperationMix::RoundRobin => Operation::ALL[(id % Operation::ALL.len() as u64) as usize],
            OperationMix::Random => {
                Operation::ALL[rand::thread_rng().gen_range(0..Operation::ALL.len())]
            }
            OperationMix::Fixed(op) => op,
        };

        Task::generate(id, self.payload_size, operation)
    }

    /// Generate `count` tasks
    pub fn batch(&mut self, count: usize) -> Vec<Task> {
        (0..count).map(|_| self.next_task()).collect()
    }
}

impl Iterator for TaskGenerator {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        Some(self.next_task())
    }
}
