//! Task definitions
//!
//! A [`Task`] is an immutable unit of work: an operation tag plus an integer
//! payload. Processing a task is a pure function producing a [`TaskResult`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::result::{ResultValue, TaskResult};

/// Operation applied to a task's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Arithmetic sum of the payload
    Sum,
    /// Arithmetic product of the payload (wraps on overflow)
    Multiply,
    /// Element-wise square
    Square,
    /// Keep even values only
    Filter,
    /// Tag that did not match a known operation
    Unknown(i64),
}

impl Operation {
    /// All known operations, in tag order
    pub const ALL: [Operation; 4] = [
        Operation::Sum,
        Operation::Multiply,
        Operation::Square,
        Operation::Filter,
    ];

    /// Numeric tag of this operation
    pub fn tag(&self) -> i64 {
        match self {
            Self::Sum => 0,
            Self::Multiply => 1,
            Self::Square => 2,
            Self::Filter => 3,
            Self::Unknown(tag) => *tag,
        }
    }

    /// Name used as a metric label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Multiply => "multiply",
            Self::Square => "square",
            Self::Filter => "filter",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Whether this is one of the known operations
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl From<i64> for Operation {
    fn from(tag: i64) -> Self {
        match tag {
            0 => Self::Sum,
            1 => Self::Multiply,
            2 => Self::Square,
            3 => Self::Filter,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work
///
/// Immutable once created. Ownership moves from the producer into the task
/// queue and then to whichever worker dequeues it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: u64,
    data: Vec<i64>,
    operation: Operation,
}

impl Task {
    /// Create a task from an explicit payload
    pub fn new(id: u64, data: Vec<i64>, operation: Operation) -> Self {
        Self {
            id,
            data,
            operation,
        }
    }

    /// Create a task with a deterministic pseudo-random payload
    ///
    /// `data[i] = (i * 7 + id * 3) % 100`
    pub fn generate(id: u64, size: usize, operation: Operation) -> Self {
        let data = (0..size as u64)
            .map(|i| (i.wrapping_mul(7).wrapping_add(id.wrapping_mul(3)) % 100) as i64)
            .collect();
        Self::new(id, data, operation)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn data(&self) -> &[i64] {
        &self.data
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Apply the task's operation to its payload
    ///
    /// Unknown operations yield a [`ResultValue::Null`] with an explanatory
    /// info string; they are never an error.
    pub fn process(&self) -> TaskResult {
        let n = self.data.len();
        let (value, info) = match self.operation {
            Operation::Sum => {
                let sum = self.data.iter().fold(0i64, |acc, v| acc.wrapping_add(*v));
                (ResultValue::Integer(sum), format!("Sum of {n} numbers"))
            }
            Operation::Multiply => {
                let product = self.data.iter().fold(1i64, |acc, v| acc.wrapping_mul(*v));
                (ResultValue::Integer(product), format!("Product of {n} numbers"))
            }
            Operation::Square => {
                let squares = self.data.iter().map(|v| v.wrapping_mul(*v)).collect();
                (ResultValue::Sequence(squares), format!("Squared {n} numbers"))
            }
            Operation::Filter => {
                let evens: Vec<i64> = self.data.iter().copied().filter(|v| v % 2 == 0).collect();
                let info = format!("Filtered {} even numbers from {n}", evens.len());
                (ResultValue::Sequence(evens), info)
            }
            Operation::Unknown(_) => (ResultValue::Null, "Unknown operation".to_string()),
        };

        TaskResult::new(self.id, value, info)
    }

    /// CPU-bound scoring of the payload, used as a profiling hook
    ///
    /// `Σ sqrt(v) * ln(v + 1)`. Negative values contribute NaN, matching
    /// floating-point semantics.
    pub fn complexity(&self) -> f64 {
        self.data
            .iter()
            .map(|&v| {
                let v = v as f64;
                v.sqrt() * (v + 1.0).ln()
            })
            .sum()
    }
}
