//! Builders turning a function + task + run triple into a [`Runnable`].
//!
//! Each builder owns one `(runtime, task)` key. [`default_builders`] is the static
//! registration table handed to the builder registry at startup.

mod container;
pub use container::ContainerJobBuilder;

mod python;
pub use python::{PythonBuildBuilder, PythonJobBuilder};

use std::sync::Arc;

use dhc_core::Builder;
use dhc_model::{BuildRequest, RunEnv, RunState, Runnable};

use crate::framework::JobFramework;

/// Every builder shipped with this crate.
pub fn default_builders() -> Vec<Arc<dyn Builder>> {
    vec![
        Arc::new(ContainerJobBuilder),
        Arc::new(PythonJobBuilder::default()),
        Arc::new(PythonBuildBuilder::default()),
    ]
}

/// Fields every builder fills the same way.
struct Draft {
    image: String,
    command: String,
    args: Vec<String>,
    /// Builder defaults, overridden by the request environment.
    env: RunEnv,
}

fn assemble(builder: &dyn Builder, request: &BuildRequest, draft: Draft) -> Runnable {
    let framework = request
        .task
        .framework
        .clone()
        .unwrap_or_else(|| JobFramework::NAME.to_string());

    let mut args = draft.args;
    args.extend(request.run.args.iter().cloned());

    Runnable {
        id: request.run.id.clone(),
        runtime: builder.runtime().to_string(),
        task: builder.task().to_string(),
        framework,
        image: draft.image,
        command: draft.command,
        args,
        env: draft.env.merged(&request.merged_env()),
        project: request.function.project.clone(),
        state: RunState::Created,
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use dhc_model::{BuildRequest, FunctionSpec, RunId, RunSpec, TaskSpec};

    pub fn request(runtime: &str, task: &str) -> BuildRequest {
        BuildRequest {
            function: FunctionSpec {
                name: "hello".into(),
                project: "demo".into(),
                runtime: runtime.into(),
                ..Default::default()
            },
            task: TaskSpec {
                kind: task.into(),
                ..Default::default()
            },
            run: RunSpec {
                id: RunId::from("abc123"),
                ..Default::default()
            },
        }
    }
}
