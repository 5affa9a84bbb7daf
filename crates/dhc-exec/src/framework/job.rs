use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use dhc_core::{
    Framework, PollingService,
    backend::{BackendError, BatchClient, Container, EnvVar, JobManifest, PullPolicy},
    error::CoreError,
    fsm::{RunContext, RunLifecycle, StateError},
    metrics::{MetricsHandle, SubmitOutcome, noop_metrics},
    poller::Steps,
    state::{LogStore, RunStore, StoreError},
};
use dhc_model::{Run, RunEnv, RunId, RunState, Runnable};

use super::{
    ENV_PROJECT, ENV_RUN_ID, JobFrameworkConfig, JobStatusStep, container_name, job_labels,
    job_name, managed_selector,
};

/// Tracking target: what a poller needs to know about a run.
struct Tracked {
    run_id: RunId,
    project: String,
    job: String,
    state: RunState,
}

/// Framework submitting each run as a single-container batch job.
#[derive(Clone)]
pub struct JobFramework {
    client: Arc<dyn BatchClient>,
    polling: PollingService,
    lifecycle: RunLifecycle,
    runs: Arc<dyn RunStore>,
    logs: Arc<dyn LogStore>,
    metrics: MetricsHandle,
    config: JobFrameworkConfig,
}

impl JobFramework {
    pub const NAME: &'static str = "k8sjob";

    pub fn new(
        client: Arc<dyn BatchClient>,
        polling: PollingService,
        runs: Arc<dyn RunStore>,
        logs: Arc<dyn LogStore>,
    ) -> Self {
        Self {
            client,
            polling,
            lifecycle: RunLifecycle::new(),
            runs,
            logs,
            metrics: noop_metrics(),
            config: JobFrameworkConfig::default(),
        }
    }

    pub fn with_config(mut self, config: JobFrameworkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &JobFrameworkConfig {
        &self.config
    }

    pub fn polling(&self) -> &PollingService {
        &self.polling
    }

    /// Baseline environment overlaid with the runnable's own variables.
    pub fn environment(&self, runnable: &Runnable) -> RunEnv {
        let mut base = self.config.base_env.clone();
        base.push(ENV_PROJECT, runnable.project.as_str());
        base.push(ENV_RUN_ID, runnable.id.as_str());
        base.merged(&runnable.env)
    }

    /// Job submitted for `runnable`.
    pub fn manifest(&self, runnable: &Runnable) -> JobManifest {
        let id = runnable.id.as_str();
        let job = job_name(&runnable.runtime, &runnable.task, id);
        let container = Container {
            name: container_name(&runnable.runtime, &runnable.task, id),
            image: runnable.image.clone(),
            command: runnable.command_line(),
            image_pull_policy: PullPolicy::IfNotPresent,
            env: self
                .environment(runnable)
                .iter()
                .map(|kv| EnvVar {
                    name: kv.key().to_string(),
                    value: kv.value().to_string(),
                })
                .collect(),
        };
        let labels = job_labels(&job, &self.config.version);
        JobManifest::single_container(job, self.config.namespace.clone(), labels, container)
    }

    /// Re-attach trackers to managed jobs whose runs are still active.
    ///
    /// Returns the names of the jobs a tracker was started for. Managed jobs without an active
    /// run record are reported and left untouched.
    #[instrument(level = "debug", skip(self), fields(namespace = %self.config.namespace))]
    pub async fn reconcile(&self) -> Result<Vec<String>, CoreError> {
        let jobs: HashSet<String> = self
            .client
            .list_jobs(&self.config.namespace, &managed_selector())
            .await?
            .into_iter()
            .collect();

        let mut known = HashSet::new();
        let mut attached = Vec::new();
        for run in self.runs.list_active().await? {
            if run.framework != Self::NAME {
                continue;
            }
            let job = job_name(&run.runtime, &run.task, run.id.as_str());
            known.insert(job.clone());
            if !jobs.contains(&job) || self.polling.is_running(&job) {
                continue;
            }
            info!(job = %job, state = %run.state, "re-attaching tracker");
            self.track(Tracked {
                run_id: run.id,
                project: run.project,
                job: job.clone(),
                state: run.state,
            })
            .await?;
            attached.push(job);
        }

        for job in jobs.difference(&known) {
            warn!(job = %job, "managed job has no active run; leaving it alone");
        }
        Ok(attached)
    }

    async fn track(&self, target: Tracked) -> Result<(), CoreError> {
        let fsm = self
            .lifecycle
            .create(target.state, RunContext::new(target.run_id, target.project));
        let step = JobStatusStep::new(
            Arc::clone(&self.client),
            Arc::clone(&self.runs),
            Arc::clone(&self.logs),
            Arc::clone(&self.metrics),
            self.config.namespace.clone(),
            target.job.clone(),
            fsm,
            self.config.poll_timeout,
        );
        let steps: Steps = vec![Box::new(step)];

        self.polling
            .create_poller(&target.job, steps, self.config.poll_interval, true)
            .await?;
        self.polling.start_one(&target.job)
    }
}

#[async_trait]
impl Framework for JobFramework {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(level = "debug", skip_all, fields(run = %runnable.id))]
    async fn execute(&self, runnable: &Runnable) -> Result<(), CoreError> {
        let manifest = self.manifest(runnable);
        let job = manifest.name().to_string();

        if runnable.state.is_terminal() {
            self.metrics.record_submission(Self::NAME, SubmitOutcome::Rejected);
            return Err(StateError::Terminal {
                state: runnable.state.to_string(),
            }
            .into());
        }

        if self.runs.get(&runnable.id).await?.is_some() {
            self.metrics.record_submission(Self::NAME, SubmitOutcome::Rejected);
            return Err(CoreError::Submission {
                name: job,
                reason: format!("run {} already exists", runnable.id),
            });
        }

        if let Err(err) = self.client.create_job(&manifest).await {
            self.metrics.record_submission(Self::NAME, SubmitOutcome::Rejected);
            warn!(job = %job, error = %err, "job submission rejected");
            return Err(CoreError::Submission {
                name: job,
                reason: err.to_string(),
            });
        }
        self.metrics.record_submission(Self::NAME, SubmitOutcome::Accepted);
        info!(job = %job, namespace = %manifest.namespace(), "job submitted");

        match self.runs.create(Run::from_runnable(runnable)).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(id)) => {
                warn!(job = %job, run = %id, "run recorded concurrently; leaving its tracker alone");
                return Err(CoreError::Submission {
                    name: job,
                    reason: format!("run {id} already exists"),
                });
            }
            Err(err) => return Err(err.into()),
        }

        self.track(Tracked {
            run_id: runnable.id.clone(),
            project: runnable.project.clone(),
            job,
            state: runnable.state,
        })
        .await
    }

    #[instrument(level = "debug", skip_all, fields(run = %runnable.id))]
    async fn stop(&self, runnable: &Runnable) -> Result<(), CoreError> {
        let job = job_name(&runnable.runtime, &runnable.task, runnable.id.as_str());
        self.polling.stop_one(&job).await;

        match self.client.delete_job(&self.config.namespace, &job).await {
            Ok(()) => debug!(job = %job, "job deleted"),
            Err(BackendError::NotFound(_)) => debug!(job = %job, "job already gone"),
            Err(err) => return Err(err.into()),
        }

        let Some(run) = self.runs.get(&runnable.id).await? else {
            return Ok(());
        };
        if run.is_terminal() {
            return Ok(());
        }

        let mut fsm = self
            .lifecycle
            .create(run.state, RunContext::new(run.id.clone(), run.project.clone()));
        fsm.go_to_state(RunState::Stopped)?;
        self.runs.update_state(&run.id, RunState::Stopped, None).await?;
        self.metrics.record_transition(run.state, RunState::Stopped);
        info!(job = %job, "run stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhc_core::state::{InMemoryLogStore, InMemoryRunStore};

    use crate::testing::FakeBatch;

    fn runnable() -> Runnable {
        Runnable {
            id: RunId::from("abc123"),
            runtime: "python".into(),
            task: "job".into(),
            framework: JobFramework::NAME.into(),
            image: "img:1".into(),
            command: "run.sh".into(),
            args: vec!["--x".into()],
            env: RunEnv::single("K", "V"),
            project: "demo".into(),
            state: RunState::Created,
        }
    }

    fn framework(client: Arc<FakeBatch>) -> JobFramework {
        JobFramework::new(
            client,
            PollingService::new(),
            Arc::new(InMemoryRunStore::new()),
            Arc::new(InMemoryLogStore::new()),
        )
    }

    #[test]
    fn manifest_follows_naming_and_policies() {
        let fw = framework(Arc::new(FakeBatch::new()));
        let manifest = fw.manifest(&runnable());

        assert_eq!(manifest.name(), "j-python-job-abc123");
        assert_eq!(manifest.namespace(), "default");
        assert_eq!(
            manifest.metadata.labels["app.kubernetes.io/instance"],
            "dhcore-j-python-job-abc123"
        );

        let container = &manifest.containers()[0];
        assert_eq!(container.name, "c-python-job-abc123");
        assert_eq!(container.image, "img:1");
        assert_eq!(container.command, vec!["run.sh", "--x"]);
        assert_eq!(container.image_pull_policy, PullPolicy::IfNotPresent);
        assert!(container.env.iter().any(|e| e.name == "K" && e.value == "V"));
    }

    #[test]
    fn runnable_env_overrides_baseline() {
        let config = JobFrameworkConfig::default()
            .with_base_env([("SHARED", "base"), ("ONLY_BASE", "b")].into_iter().collect());
        let fw = framework(Arc::new(FakeBatch::new())).with_config(config);

        let mut r = runnable();
        r.env = [("SHARED", "user"), ("ONLY_USER", "u")].into_iter().collect();

        let env = fw.environment(&r);
        assert_eq!(env.get("SHARED"), Some("user"));
        assert_eq!(env.get("ONLY_BASE"), Some("b"));
        assert_eq!(env.get("ONLY_USER"), Some("u"));
        assert_eq!(env.get(ENV_RUN_ID), Some("abc123"));
        assert_eq!(env.get(ENV_PROJECT), Some("demo"));
    }

    #[tokio::test]
    async fn rejected_submission_is_not_tracked() {
        let client = Arc::new(FakeBatch::new());
        client.reject_next(BackendError::Rejected("quota".into()));
        let fw = framework(Arc::clone(&client));

        let err = fw.execute(&runnable()).await.unwrap_err();
        assert!(matches!(err, CoreError::Submission { ref name, .. } if name == "j-python-job-abc123"));
        assert!(fw.polling().keys().is_empty());
    }
}
