//! Lifecycle strategies
//!
//! Both pool designs share one implementation; the strategy picked at
//! construction decides how auxiliary activities (helpers, monitor, sampler)
//! are started and whether `stop()` waits for them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a pool manages its auxiliary activities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStrategy {
    /// Every activity observes the stop signal and `stop()` waits for all of
    /// them. Pre-sizes buffers and reuses scratch space. Labelled `optimized`.
    #[default]
    #[serde(alias = "optimized")]
    Cooperative,

    /// Auxiliary activities are spawned untracked and ignore `stop()`; they
    /// only end when the pool itself is dropped. Allocates per tick and per
    /// task. Labelled `bad`; kept as the negative example.
    #[serde(alias = "bad")]
    FireAndForget,
}

impl LifecycleStrategy {
    /// Metric label value (`worker_type`)
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cooperative => "optimized",
            Self::FireAndForget => "bad",
        }
    }

    /// Whether `stop()` cancels and waits for helpers, monitor and sampler
    pub fn joins_auxiliary(&self) -> bool {
        matches!(self, Self::Cooperative)
    }

    /// Whether buffers are pre-sized and reused across ticks/tasks
    pub fn reuses_buffers(&self) -> bool {
        matches!(self, Self::Cooperative)
    }
}

impl fmt::Display for LifecycleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unrecognised strategy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle strategy '{0}' (expected optimized|cooperative|bad|fire_and_forget)")]
pub struct ParseStrategyError(String);

impl FromStr for LifecycleStrategy {
    type Err = ParseStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimized" | "cooperative" => Ok(Self::Cooperative),
            "bad" | "fire_and_forget" | "fire-and-forget" => Ok(Self::FireAndForget),
            _ => Err(ParseStrategyError(s.to_string())),
        }
    }
}
