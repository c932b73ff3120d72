//! Task results

use serde::{Deserialize, Serialize};

/// Value produced by processing a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultValue {
    Integer(i64),
    Sequence(Vec<i64>),
    /// No value (unknown operation)
    Null,
}

impl ResultValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[i64]> {
        match self {
            Self::Sequence(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Output of processing exactly one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    task_id: u64,
    value: ResultValue,
    info: String,
}

impl TaskResult {
    pub fn new(task_id: u64, value: ResultValue, info: impl Into<String>) -> Self {
        Self {
            task_id,
            value,
            info: info.into(),
        }
    }

    pub fn task_id(&self) -> u64 {
        self.task_id
    }

    pub fn value(&self) -> &ResultValue {
        &self.value
    }

    /// Human-readable description of what was computed
    pub fn info(&self) -> &str {
        &self.info
    }
}
