use prometheus::{IntCounterVec, IntGauge, Opts, Registry, proto::MetricFamily};

use dhc_core::metrics::{MetricsBackend, SubmitOutcome};
use dhc_model::RunState;

#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    submissions: IntCounterVec,
    transitions: IntCounterVec,
    poll_errors: IntCounterVec,
    active_pollers: IntGauge,
}

impl PrometheusMetrics {
    /// Metrics registered in a fresh private registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Registry::new())
    }

    /// Metrics registered in `registry`, e.g. one shared with the rest of the process.
    pub fn with_registry(registry: Registry) -> Result<Self, prometheus::Error> {
        let submissions = IntCounterVec::new(
            Opts::new("dhc_runs_submitted_total", "Workload submissions by outcome"),
            &["framework", "outcome"],
        )?;
        let transitions = IntCounterVec::new(
            Opts::new("dhc_run_transitions_total", "Applied run state transitions"),
            &["from", "to"],
        )?;
        let poll_errors = IntCounterVec::new(
            Opts::new("dhc_poll_errors_total", "Failed job status queries"),
            &["kind"],
        )?;
        let active_pollers = IntGauge::new("dhc_active_pollers", "Pollers currently ticking")?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(poll_errors.clone()))?;
        registry.register(Box::new(active_pollers.clone()))?;

        Ok(Self {
            registry,
            submissions,
            transitions,
            poll_errors,
            active_pollers,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_submission(&self, framework: &str, outcome: SubmitOutcome) {
        self.submissions
            .with_label_values(&[framework, outcome.as_str()])
            .inc();
    }

    fn record_transition(&self, from: RunState, to: RunState) {
        self.transitions
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }

    fn record_poll_error(&self, transient: bool) {
        let kind = if transient { "transient" } else { "terminal" };
        self.poll_errors.with_label_values(&[kind]).inc();
    }

    fn record_active_pollers(&self, count: usize) {
        self.active_pollers
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use prometheus::{Encoder, TextEncoder};

    fn render(metrics: &PrometheusMetrics) -> String {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metrics.gather(), &mut buffer)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn counters_carry_labels() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_submission("k8sjob", SubmitOutcome::Accepted);
        metrics.record_submission("k8sjob", SubmitOutcome::Accepted);
        metrics.record_submission("k8sjob", SubmitOutcome::Rejected);
        metrics.record_transition(RunState::Running, RunState::Completed);

        assert_eq!(
            metrics
                .submissions
                .with_label_values(&["k8sjob", "accepted"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .transitions
                .with_label_values(&["RUNNING", "COMPLETED"])
                .get(),
            1
        );

        let text = render(&metrics);
        assert!(text.contains(r#"dhc_runs_submitted_total{framework="k8sjob",outcome="accepted"} 2"#));
        assert!(text.contains(r#"dhc_runs_submitted_total{framework="k8sjob",outcome="rejected"} 1"#));
    }

    #[test]
    fn poll_errors_and_gauge() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_poll_error(true);
        metrics.record_poll_error(true);
        metrics.record_poll_error(false);
        metrics.record_active_pollers(3);
        metrics.record_active_pollers(1);

        assert_eq!(metrics.poll_errors.with_label_values(&["transient"]).get(), 2);
        assert_eq!(metrics.poll_errors.with_label_values(&["terminal"]).get(), 1);
        assert_eq!(metrics.active_pollers.get(), 1);
    }

    #[test]
    fn shared_registry_rejects_double_registration() {
        let registry = Registry::new();
        PrometheusMetrics::with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::with_registry(registry).is_err());
    }
}
