use std::time::Duration;

use dhc_model::RunEnv;

/// Platform endpoint advertised to every container.
pub const ENV_ENDPOINT: &str = "DHCORE_ENDPOINT";
/// Per-run identifiers added on top of the configured baseline.
pub const ENV_PROJECT: &str = "DHCORE_PROJECT";
pub const ENV_RUN_ID: &str = "DHCORE_RUN_ID";

/// Settings of [`JobFramework`](super::JobFramework).
#[derive(Debug, Clone)]
pub struct JobFrameworkConfig {
    /// Namespace every job is created in.
    pub namespace: String,
    /// Value of the `app.kubernetes.io/version` label.
    pub version: String,
    /// Delay between two status polls of the same job.
    pub poll_interval: Duration,
    /// How long consecutive transient poll failures are tolerated before the run fails.
    pub poll_timeout: Duration,
    /// Baseline environment of every container; the runnable's own env overrides it.
    pub base_env: RunEnv,
}

impl Default for JobFrameworkConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            version: "0.0.3".to_string(),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(300),
            base_env: RunEnv::single(ENV_ENDPOINT, "http://localhost:8080"),
        }
    }
}

impl JobFrameworkConfig {
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_base_env(mut self, env: RunEnv) -> Self {
        self.base_env = env;
        self
    }
}
