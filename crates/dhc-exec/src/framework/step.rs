use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use dhc_core::{
    backend::{BackendError, BatchClient, JobEvent, JobStatus},
    error::CoreError,
    fsm::{RunStateMachine, StateError},
    metrics::MetricsHandle,
    poller::{StepOutcome, WorkflowStep},
    state::{LogStore, RunStore},
};
use dhc_model::{LogRecord, RunState};

pub const REASON_CREATED: &str = "SuccessfulCreate";
pub const REASON_COMPLETED: &str = "Completed";

/// Event reasons that end a run in ERROR.
pub const FAILURE_REASONS: &[&str] = &["BackoffLimitExceeded", "DeadlineExceeded", "Failed"];

/// Check-and-react step for one job.
///
/// Owns the run's state machine; every transition it applies is mirrored to the run store.
pub struct JobStatusStep {
    client: Arc<dyn BatchClient>,
    runs: Arc<dyn RunStore>,
    logs: Arc<dyn LogStore>,
    metrics: MetricsHandle,
    namespace: String,
    job: String,
    fsm: RunStateMachine,
    poll_timeout: Duration,
    failing_since: Option<Instant>,
}

impl JobStatusStep {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: Arc<dyn BatchClient>,
        runs: Arc<dyn RunStore>,
        logs: Arc<dyn LogStore>,
        metrics: MetricsHandle,
        namespace: impl Into<String>,
        job: impl Into<String>,
        fsm: RunStateMachine,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            runs,
            logs,
            metrics,
            namespace: namespace.into(),
            job: job.into(),
            fsm,
            poll_timeout,
            failing_since: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.fsm.current_state()
    }

    async fn on_query_error(&mut self, err: BackendError) -> StepOutcome {
        if !err.is_transient() {
            self.metrics.record_poll_error(false);
            error!(job = %self.job, error = %err, "job status query failed");
            self.fail(err.to_string()).await;
            return StepOutcome::Stop;
        }

        self.metrics.record_poll_error(true);
        let since = *self.failing_since.get_or_insert_with(Instant::now);
        if since.elapsed() < self.poll_timeout {
            debug!(job = %self.job, error = %err, "transient status failure; retrying next tick");
            return StepOutcome::Continue;
        }

        let err = CoreError::TransientPoll {
            key: self.job.clone(),
            reason: err.to_string(),
        };
        warn!(job = %self.job, error = %err, "giving up after repeated status failures");
        self.fail(err.to_string()).await;
        StepOutcome::Stop
    }

    async fn observe(&mut self, status: JobStatus) -> StepOutcome {
        for event in &status.events {
            self.record_event(event).await;
        }

        if let Some(failure) = status
            .events
            .iter()
            .find(|e| FAILURE_REASONS.contains(&e.reason.as_str()))
        {
            let reason = if failure.message.is_empty() {
                failure.reason.clone()
            } else {
                format!("{}: {}", failure.reason, failure.message)
            };
            self.fail(reason).await;
            return StepOutcome::Stop;
        }

        if status.has_reason(REASON_COMPLETED) {
            return self.complete().await;
        }
        self.failing_since = None;

        if status.has_reason(REASON_CREATED)
            && let Err(err) = self.advance(&[RunState::Ready, RunState::Running]).await
        {
            error!(job = %self.job, error = %err, "cannot start run");
            return StepOutcome::Stop;
        }

        StepOutcome::Continue
    }

    async fn complete(&mut self) -> StepOutcome {
        let output = match self.client.job_logs(&self.namespace, &self.job).await {
            Ok(output) => output,
            Err(err) if err.is_transient() => return self.on_query_error(err).await,
            Err(err) => {
                warn!(job = %self.job, error = %err, "job logs unavailable");
                String::new()
            }
        };

        if let Err(err) = self.advance(&[RunState::Ready, RunState::Running]).await {
            error!(job = %self.job, error = %err, "cannot complete run");
            return StepOutcome::Stop;
        }
        self.append_log(output).await;
        if let Err(err) = self.transition(RunState::Completed, None).await {
            error!(job = %self.job, error = %err, "cannot complete run");
            return StepOutcome::Stop;
        }

        info!(job = %self.job, "run completed");
        StepOutcome::Stop
    }

    /// Drive the run to ERROR, persisting whatever output the job produced.
    async fn fail(&mut self, reason: String) {
        match self.client.job_logs(&self.namespace, &self.job).await {
            Ok(output) if !output.is_empty() => self.append_log(output).await,
            Ok(_) => {}
            Err(err) => debug!(job = %self.job, error = %err, "no logs for failed job"),
        }
        if let Err(err) = self.transition(RunState::Error, Some(reason)).await {
            error!(job = %self.job, error = %err, "cannot fail run");
        }
    }

    /// Walk `path` from just after the current state.
    async fn advance(&mut self, path: &[RunState]) -> Result<(), StateError> {
        let current = self.fsm.current_state();
        let start = path
            .iter()
            .position(|s| *s == current)
            .map_or(0, |i| i + 1);
        for &target in &path[start..] {
            self.transition(target, None).await?;
        }
        Ok(())
    }

    async fn transition(&mut self, target: RunState, error: Option<String>) -> Result<(), StateError> {
        let from = self.fsm.current_state();
        self.fsm.go_to_state(target)?;
        if from == target {
            return Ok(());
        }
        self.metrics.record_transition(from, target);
        debug!(job = %self.job, %from, to = %target, "run transition");

        let run_id = &self.fsm.context().run_id;
        if let Err(err) = self.runs.update_state(run_id, target, error).await {
            warn!(job = %self.job, run = %run_id, error = %err, "run state not persisted");
        }
        Ok(())
    }

    async fn record_event(&mut self, event: &JobEvent) {
        let ctx = self.fsm.context_mut();
        if ctx.accumulator.contains(&event.reason) {
            return;
        }
        ctx.accumulator.push(event.reason.clone());

        match serde_json::to_string(event) {
            Ok(content) => self.append_log(content).await,
            Err(err) => warn!(job = %self.job, error = %err, "cannot encode job event"),
        }
    }

    async fn append_log(&self, content: String) {
        let ctx = self.fsm.context();
        let record = LogRecord::new(ctx.run_id.clone(), ctx.project.clone(), content);
        if let Err(err) = self.logs.append(record).await {
            warn!(job = %self.job, error = %err, "log record not persisted");
        }
    }
}

#[async_trait]
impl WorkflowStep for JobStatusStep {
    fn name(&self) -> &str {
        &self.job
    }

    async fn run(&mut self) -> StepOutcome {
        if self.fsm.current_state().is_terminal() {
            return StepOutcome::Stop;
        }
        match self.client.job_status(&self.namespace, &self.job).await {
            Ok(status) => self.observe(status).await,
            Err(err) => self.on_query_error(err).await,
        }
    }
}
