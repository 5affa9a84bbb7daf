use std::sync::Arc;

use dhc_model::RunState;

/// Outcome of a workload submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected,
}

impl SubmitOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitOutcome::Accepted => "accepted",
            SubmitOutcome::Rejected => "rejected",
        }
    }
}

/// Sink for dispatch and tracking metrics.
pub trait MetricsBackend: Send + Sync {
    fn record_submission(&self, framework: &str, outcome: SubmitOutcome);

    fn record_transition(&self, from: RunState, to: RunState);

    /// A status query failed; `transient` is false when it ended the run.
    fn record_poll_error(&self, transient: bool);

    fn record_active_pollers(&self, count: usize);
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    fn record_submission(&self, _framework: &str, _outcome: SubmitOutcome) {}
    fn record_transition(&self, _from: RunState, _to: RunState) {}
    fn record_poll_error(&self, _transient: bool) {}
    fn record_active_pollers(&self, _count: usize) {}
}

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
