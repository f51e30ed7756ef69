//! Structured branch and request events.
//!
//! The scorer reports every branch outcome to an injected [`ScoringObserver`]
//! so callers (and tests) can see which branch degraded without parsing logs.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

/// One independently failing unit of the scoring pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Branch {
    Caption,
    Description,
    /// Prompt vs caption with the primary model.
    PrimarySimilarity,
    /// Prompt vs description with the primary model.
    DescriptionSimilarity,
    /// Image vs prompt in the shared vector space.
    Multimodal,
    /// One entry of the embedding model comparison, by key.
    ModelComparison(String),
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caption => f.write_str("caption"),
            Self::Description => f.write_str("description"),
            Self::PrimarySimilarity => f.write_str("primary_similarity"),
            Self::DescriptionSimilarity => f.write_str("description_similarity"),
            Self::Multimodal => f.write_str("multimodal"),
            Self::ModelComparison(key) => write!(f, "model_comparison[{key}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    Succeeded,
    /// The branch produced a substitute value (fallback score, empty caption).
    Degraded(String),
    /// The branch produced nothing; its output is absent or zeroed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchEvent {
    pub request_id: String,
    pub branch: Branch,
    pub outcome: BranchOutcome,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed,
    /// Validation failed; no provider was called.
    Rejected(String),
    /// A panic escaped the branches.
    Crashed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub request_id: String,
    pub outcome: RequestOutcome,
    pub elapsed: Duration,
}

/// Receives scoring events. Implementations must be cheap and non-blocking.
pub trait ScoringObserver: Send + Sync {
    fn on_branch(&self, event: &BranchEvent);

    fn on_request(&self, _event: &RequestEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ScoringObserver for TracingObserver {
    fn on_branch(&self, event: &BranchEvent) {
        let elapsed_ms = event.elapsed.as_millis() as u64;
        let request_id = event.request_id.as_str();
        let branch = &event.branch;
        match &event.outcome {
            BranchOutcome::Succeeded => debug!(request_id, %branch, elapsed_ms, "Branch succeeded"),
            BranchOutcome::Degraded(reason) => {
                warn!(request_id, %branch, elapsed_ms, reason = reason.as_str(), "Branch degraded")
            }
            BranchOutcome::Failed(reason) => {
                warn!(request_id, %branch, elapsed_ms, reason = reason.as_str(), "Branch failed")
            }
        }
    }

    fn on_request(&self, event: &RequestEvent) {
        let elapsed_ms = event.elapsed.as_millis() as u64;
        let request_id = event.request_id.as_str();
        match &event.outcome {
            RequestOutcome::Completed => info!(request_id, elapsed_ms, "Scoring completed"),
            RequestOutcome::Rejected(reason) => {
                info!(request_id, elapsed_ms, reason = reason.as_str(), "Scoring request rejected")
            }
            RequestOutcome::Crashed(reason) => {
                error!(request_id, elapsed_ms, reason = reason.as_str(), "Scoring crashed")
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    branches: Mutex<Vec<BranchEvent>>,
    requests: Mutex<Vec<RequestEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branch_events(&self) -> Vec<BranchEvent> {
        self.branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_events(&self) -> Vec<RequestEvent> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Outcome of the most recent event for `branch`.
    pub fn outcome_of(&self, branch: &Branch) -> Option<BranchOutcome> {
        self.branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|e| &e.branch == branch)
            .map(|e| e.outcome.clone())
    }
}

impl ScoringObserver for RecordingObserver {
    fn on_branch(&self, event: &BranchEvent) {
        self.branches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }

    fn on_request(&self, event: &RequestEvent) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
