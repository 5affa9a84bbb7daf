use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{RunId, RunState, Runnable};

/// Stored record of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Stable run identifier.
    pub id: RunId,
    /// Owning project.
    pub project: String,
    pub runtime: String,
    pub task: String,
    /// Backend the run was dispatched to.
    pub framework: String,
    /// Last observed lifecycle state.
    pub state: RunState,
    /// When the run was submitted.
    #[serde(with = "super::time_serde")]
    pub created_at: SystemTime,
    /// When the state last changed.
    #[serde(with = "super::time_serde")]
    pub updated_at: SystemTime,
    /// Last error message (if state is Error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Run {
    /// Fresh record for a runnable that was just submitted.
    pub fn from_runnable(runnable: &Runnable) -> Self {
        let now = SystemTime::now();
        Self {
            id: runnable.id.clone(),
            project: runnable.project.clone(),
            runtime: runnable.runtime.clone(),
            task: runnable.task.clone(),
            framework: runnable.framework.clone(),
            state: runnable.state,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
