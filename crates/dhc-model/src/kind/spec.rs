use serde::{Deserialize, Serialize};

use crate::{RunEnv, RunId};

/// Function definition a run executes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub name: String,
    pub project: String,
    /// Runtime the function belongs to; half of the builder key.
    pub runtime: String,
    /// Image to run; builders may fall back to a runtime default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Source entrypoint for interpreted runtimes (e.g. `"main.py"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "RunEnv::is_empty")]
    pub env: RunEnv,
}

/// Task of a function: the kind of work and where it runs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    /// Task kind; the other half of the builder key.
    pub kind: String,
    /// Backend identifier; defaults to the builder's own choice when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "RunEnv::is_empty")]
    pub env: RunEnv,
}

/// Parameters of a single run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    pub id: RunId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "RunEnv::is_empty")]
    pub env: RunEnv,
}

/// Everything a builder needs to produce a runnable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    pub function: FunctionSpec,
    pub task: TaskSpec,
    pub run: RunSpec,
}

impl BuildRequest {
    pub fn runtime(&self) -> &str {
        &self.function.runtime
    }

    pub fn task_kind(&self) -> &str {
        &self.task.kind
    }

    /// Environment with precedence function < task < run.
    pub fn merged_env(&self) -> RunEnv {
        self.function
            .env
            .merged(&self.task.env)
            .merged(&self.run.env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_env_run_wins_over_task_and_function() {
        let req = BuildRequest {
            function: FunctionSpec {
                env: [("A", "fn"), ("B", "fn"), ("C", "fn")].into_iter().collect(),
                ..Default::default()
            },
            task: TaskSpec {
                env: [("B", "task"), ("C", "task")].into_iter().collect(),
                ..Default::default()
            },
            run: RunSpec {
                env: RunEnv::single("C", "run"),
                ..Default::default()
            },
        };

        let env = req.merged_env();
        assert_eq!(env.get("A"), Some("fn"));
        assert_eq!(env.get("B"), Some("task"));
        assert_eq!(env.get("C"), Some("run"));
    }
}
