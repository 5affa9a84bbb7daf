use std::{env, time::Duration};

use anyhow::{Context, bail};
use dhc_exec::JobFrameworkConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Proc,
    Kube,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub backend: BackendKind,
    pub framework: JobFrameworkConfig,
    /// Print the Prometheus exposition on exit.
    pub dump_metrics: bool,
}

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let backend = match lookup("DHCORE_BACKEND").as_deref() {
            None | Some("proc") => BackendKind::Proc,
            Some("kube") => BackendKind::Kube,
            Some(other) => bail!("unknown backend {other:?} (expected proc|kube)"),
        };

        let mut framework = JobFrameworkConfig::default();
        if let Some(ns) = lookup("DHCORE_NAMESPACE") {
            framework = framework.with_namespace(ns);
        }
        if let Some(ms) = lookup("DHCORE_POLL_INTERVAL_MS") {
            let ms: u64 = ms.parse().context("DHCORE_POLL_INTERVAL_MS")?;
            framework = framework.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(secs) = lookup("DHCORE_POLL_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().context("DHCORE_POLL_TIMEOUT_SECS")?;
            framework = framework.with_poll_timeout(Duration::from_secs(secs));
        }
        if let Some(endpoint) = lookup(dhc_exec::framework::ENV_ENDPOINT) {
            let mut env = framework.base_env.clone();
            env.push(dhc_exec::framework::ENV_ENDPOINT, endpoint);
            framework = framework.with_base_env(env);
        }

        Ok(Self {
            backend,
            framework,
            dump_metrics: lookup("DHCORE_DUMP_METRICS").is_some_and(|v| v == "1" || v == "true"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_processes() {
        let cfg = AgentConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.backend, BackendKind::Proc);
        assert_eq!(cfg.framework.namespace, "default");
        assert_eq!(cfg.framework.poll_interval, Duration::from_secs(1));
        assert!(!cfg.dump_metrics);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = AgentConfig::from_lookup(|key| match key {
            "DHCORE_BACKEND" => Some("kube".into()),
            "DHCORE_NAMESPACE" => Some("runs".into()),
            "DHCORE_POLL_INTERVAL_MS" => Some("250".into()),
            "DHCORE_ENDPOINT" => Some("http://core:8080".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.backend, BackendKind::Kube);
        assert_eq!(cfg.framework.namespace, "runs");
        assert_eq!(cfg.framework.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.framework.base_env.get("DHCORE_ENDPOINT"), Some("http://core:8080"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(AgentConfig::from_lookup(|k| (k == "DHCORE_BACKEND").then(|| "k8s".into())).is_err());
        assert!(
            AgentConfig::from_lookup(|k| (k == "DHCORE_POLL_INTERVAL_MS").then(|| "soon".into()))
                .is_err()
        );
    }
}
