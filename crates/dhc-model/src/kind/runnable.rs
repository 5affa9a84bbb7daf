use serde::{Deserialize, Serialize};

use crate::{RunEnv, RunId, RunState};

/// Concrete execution request produced by a builder.
///
/// Everything except `state` is fixed once the builder returns it; `state` only moves
/// forward through the run state machine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Runnable {
    /// Run identifier; also the last segment of every backend name derived from it.
    pub id: RunId,
    /// Runtime that produced this runnable (e.g. `"python"`, `"container"`).
    pub runtime: String,
    /// Task kind within the runtime (e.g. `"job"`, `"build"`).
    pub task: String,
    /// Backend identifier used to resolve the framework (e.g. `"k8sjob"`).
    pub framework: String,
    /// Container image.
    pub image: String,
    /// Entrypoint token.
    pub command: String,
    /// Arguments appended after `command`, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// User supplied environment; overrides the framework baseline.
    #[serde(default, skip_serializing_if = "RunEnv::is_empty")]
    pub env: RunEnv,
    /// Owning project.
    pub project: String,
    /// Declared current state.
    #[serde(default)]
    pub state: RunState,
}

impl Runnable {
    /// Full command line: `command` followed by `args`.
    pub fn command_line(&self) -> Vec<String> {
        std::iter::once(self.command.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_prepends_command() {
        let runnable = Runnable {
            id: RunId::from("abc123"),
            runtime: "python".into(),
            task: "job".into(),
            framework: "k8sjob".into(),
            image: "img:1".into(),
            command: "run.sh".into(),
            args: vec!["--x".into(), "1".into()],
            env: RunEnv::single("K", "V"),
            project: "demo".into(),
            state: RunState::Created,
        };

        assert_eq!(runnable.command_line(), vec!["run.sh", "--x", "1"]);
    }

    #[test]
    fn state_defaults_to_created_when_missing() {
        let json = r#"{
            "id": "r1", "runtime": "container", "task": "job", "framework": "k8sjob",
            "image": "busybox", "command": "echo", "project": "p"
        }"#;
        let runnable: Runnable = serde_json::from_str(json).unwrap();
        assert_eq!(runnable.state, RunState::Created);
        assert!(runnable.args.is_empty());
        assert!(runnable.env.is_empty());
    }
}
