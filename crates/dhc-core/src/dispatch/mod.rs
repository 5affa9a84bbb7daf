use std::sync::Arc;

use dhc_model::{BuildRequest, Runnable};
use tracing::{debug, info, instrument};

use crate::{
    error::CoreError,
    registry::{BuilderRegistry, FrameworkRegistry},
};

/// Entry point for callers: resolve the builder, build, resolve the framework, execute.
///
/// Holds the startup registries by reference; cloning is cheap.
#[derive(Clone)]
pub struct Dispatcher {
    builders: Arc<BuilderRegistry>,
    frameworks: Arc<FrameworkRegistry>,
}

impl Dispatcher {
    pub fn new(builders: Arc<BuilderRegistry>, frameworks: Arc<FrameworkRegistry>) -> Self {
        info!(
            builders = builders.len(),
            frameworks = frameworks.names().count(),
            "dispatcher ready"
        );
        Self {
            builders,
            frameworks,
        }
    }

    pub fn builders(&self) -> &BuilderRegistry {
        &self.builders
    }

    pub fn frameworks(&self) -> &FrameworkRegistry {
        &self.frameworks
    }

    /// Build the runnable for `request` and hand it to its framework.
    #[instrument(
        level = "debug",
        skip(self, request),
        fields(run = %request.run.id, runtime = %request.runtime(), task = %request.task_kind())
    )]
    pub async fn submit(&self, request: &BuildRequest) -> Result<Runnable, CoreError> {
        let builder = self
            .builders
            .get_builder(request.runtime(), request.task_kind())?;
        let runnable = builder.build(request)?;
        debug!(framework = %runnable.framework, "runnable built");

        let framework = self.frameworks.get_framework(&runnable.framework)?;
        framework.execute(&runnable).await?;
        Ok(runnable)
    }

    /// Stop a previously submitted runnable through its framework.
    #[instrument(level = "debug", skip(self, runnable), fields(run = %runnable.id))]
    pub async fn stop(&self, runnable: &Runnable) -> Result<(), CoreError> {
        let framework = self.frameworks.get_framework(&runnable.framework)?;
        framework.stop(runnable).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builder::{BuildError, Builder},
        framework::Framework,
    };
    use async_trait::async_trait;
    use dhc_model::{FunctionSpec, RunId, RunSpec, RunState, TaskSpec};
    use std::sync::Mutex;

    struct Echo;

    impl Builder for Echo {
        fn runtime(&self) -> &'static str {
            "container"
        }
        fn task(&self) -> &'static str {
            "job"
        }
        fn build(&self, request: &BuildRequest) -> Result<Runnable, BuildError> {
            Ok(Runnable {
                id: request.run.id.clone(),
                runtime: self.runtime().into(),
                task: self.task().into(),
                framework: request
                    .task
                    .framework
                    .clone()
                    .unwrap_or_else(|| "recording".into()),
                image: request
                    .function
                    .image
                    .clone()
                    .ok_or(BuildError::MissingField("image"))?,
                command: "echo".into(),
                args: vec![],
                env: request.merged_env(),
                project: request.function.project.clone(),
                state: RunState::Created,
            })
        }
    }

    #[derive(Default)]
    struct Recording {
        executed: Mutex<Vec<RunId>>,
    }

    #[async_trait]
    impl Framework for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }
        async fn execute(&self, runnable: &Runnable) -> Result<(), CoreError> {
            self.executed.lock().unwrap().push(runnable.id.clone());
            Ok(())
        }
        async fn stop(&self, _runnable: &Runnable) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn request(runtime: &str, framework: Option<&str>) -> BuildRequest {
        BuildRequest {
            function: FunctionSpec {
                name: "f".into(),
                project: "demo".into(),
                runtime: runtime.into(),
                image: Some("busybox".into()),
                ..Default::default()
            },
            task: TaskSpec {
                kind: "job".into(),
                framework: framework.map(str::to_string),
                ..Default::default()
            },
            run: RunSpec {
                id: RunId::from("r1"),
                ..Default::default()
            },
        }
    }

    fn dispatcher(framework: Arc<Recording>) -> Dispatcher {
        let builders = BuilderRegistry::new(vec![Arc::new(Echo)]).unwrap();
        let framework: Arc<dyn Framework> = framework;
        let frameworks = FrameworkRegistry::new(vec![framework]).unwrap();
        Dispatcher::new(Arc::new(builders), Arc::new(frameworks))
    }

    #[tokio::test]
    async fn submit_builds_and_executes() {
        let framework = Arc::new(Recording::default());
        let dispatcher = dispatcher(Arc::clone(&framework));

        let runnable = dispatcher.submit(&request("container", None)).await.unwrap();
        assert_eq!(runnable.image, "busybox");
        assert_eq!(*framework.executed.lock().unwrap(), vec![RunId::from("r1")]);
    }

    #[tokio::test]
    async fn submit_unknown_builder_is_configuration_error() {
        let dispatcher = dispatcher(Arc::new(Recording::default()));
        let err = dispatcher.submit(&request("python", None)).await.unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[tokio::test]
    async fn submit_unknown_framework_is_configuration_error() {
        let framework = Arc::new(Recording::default());
        let dispatcher = dispatcher(Arc::clone(&framework));
        let err = dispatcher
            .submit(&request("container", Some("k8sserve")))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(framework.executed.lock().unwrap().is_empty());
    }
}
