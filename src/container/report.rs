//! Orchestration Reports
//!
//! Every orchestration sequence records the steps it completed, so a caller
//! that sees an error knows exactly how far the node got.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed orchestration step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Short step name, e.g. `mon-mkfs`
    pub step: String,
    /// Detail such as the unit or path acted upon
    pub detail: String,
    pub completed_at: DateTime<Utc>,
}

/// Ordered record of a sequence's completed steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationReport {
    pub steps: Vec<StepRecord>,
}

impl OrchestrationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: &str, detail: impl Into<String>) {
        self.steps.push(StepRecord {
            step: step.to_string(),
            detail: detail.into(),
            completed_at: Utc::now(),
        });
    }

    /// Step names in completion order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step.as_str()).collect()
    }

    pub fn contains(&self, step: &str) -> bool {
        self.steps.iter().any(|s| s.step == step)
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    /// Append another report's steps
    pub fn extend(&mut self, other: OrchestrationReport) {
        self.steps.extend(other.steps);
    }
}
