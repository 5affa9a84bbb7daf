use std::fmt;

use serde::{Deserialize, Serialize};

/// Named trigger that moves a run between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunEvent {
    Build,
    Run,
    Complete,
    Fail,
    Stop,
}

impl RunEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunEvent::Build => "BUILD",
            RunEvent::Run => "RUN",
            RunEvent::Complete => "COMPLETE",
            RunEvent::Fail => "FAIL",
            RunEvent::Stop => "STOP",
        }
    }
}

impl fmt::Display for RunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
