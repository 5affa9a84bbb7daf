use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Lifecycle stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Run record exists, workload not yet observed on the backend.
    Created,
    /// Backend accepted the workload and created its pod.
    Ready,
    /// Workload is executing.
    Running,
    /// Workload finished successfully.
    Completed,
    /// Workload or tracking failed.
    Error,
    /// Run was stopped on request.
    Stopped,
}

impl RunState {
    pub const ALL: [RunState; 6] = [
        RunState::Created,
        RunState::Ready,
        RunState::Running,
        RunState::Completed,
        RunState::Error,
        RunState::Stopped,
    ];

    /// Returns `true` if the run will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Error | RunState::Stopped
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Created => "CREATED",
            RunState::Ready => "READY",
            RunState::Running => "RUNNING",
            RunState::Completed => "COMPLETED",
            RunState::Error => "ERROR",
            RunState::Stopped => "STOPPED",
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        RunState::Created
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase();
        RunState::ALL
            .into_iter()
            .find(|state| state.as_str() == norm)
            .ok_or_else(|| ModelError::UnknownState(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunState::Completed.is_terminal());
        assert!(RunState::Error.is_terminal());
        assert!(RunState::Stopped.is_terminal());

        assert!(!RunState::Created.is_terminal());
        assert!(!RunState::Ready.is_terminal());
        assert!(!RunState::Running.is_terminal());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("running".parse::<RunState>().unwrap(), RunState::Running);
        assert_eq!(" COMPLETED ".parse::<RunState>().unwrap(), RunState::Completed);
        assert!(matches!(
            "paused".parse::<RunState>(),
            Err(ModelError::UnknownState(s)) if s == "paused"
        ));
    }

    #[test]
    fn serde_uses_platform_names() {
        let json = serde_json::to_string(&RunState::Created).unwrap();
        assert_eq!(json, r#""CREATED""#);

        let back: RunState = serde_json::from_str(r#""ERROR""#).unwrap();
        assert_eq!(back, RunState::Error);
    }
}
