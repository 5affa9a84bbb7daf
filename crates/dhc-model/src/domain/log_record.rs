use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::RunId;

/// Append-only log entry attached to a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    pub run: RunId,
    pub project: String,
    pub content: String,
    #[serde(with = "crate::domain::time_serde")]
    pub created_at: SystemTime,
}

impl LogRecord {
    pub fn new(run: RunId, project: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            run,
            project: project.into(),
            content: content.into(),
            created_at: SystemTime::now(),
        }
    }
}
