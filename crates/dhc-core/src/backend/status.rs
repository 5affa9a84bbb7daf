use serde::{Deserialize, Serialize};

/// Event reported by the backend for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Machine readable reason (`SuccessfulCreate`, `Completed`, `BackoffLimitExceeded`...).
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

impl JobEvent {
    pub fn new(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Snapshot of what the backend knows about a job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatus {
    /// Events in the order the backend emitted them.
    pub events: Vec<JobEvent>,
}

impl JobStatus {
    pub fn new(events: Vec<JobEvent>) -> Self {
        Self { events }
    }

    pub fn has_reason(&self, reason: &str) -> bool {
        self.events.iter().any(|e| e.reason == reason)
    }

    pub fn find(&self, reason: &str) -> Option<&JobEvent> {
        self.events.iter().find(|e| e.reason == reason)
    }
}
