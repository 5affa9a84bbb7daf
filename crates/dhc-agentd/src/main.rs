//! `dhc-agentd <request.json>`: dispatch one build request and follow it to completion.

mod config;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, bail};
use tracing::{info, warn};

use dhc_core::{
    BuilderRegistry, Dispatcher, Framework, FrameworkRegistry, PollingService,
    backend::BatchClient,
    metrics::MetricsHandle,
    state::{InMemoryLogStore, InMemoryRunStore, LogStore, RunStore},
};
use dhc_exec::{JobFramework, default_builders, prelude::ProcBackend};
use dhc_model::{BuildRequest, RunId, RunState};
use dhc_observe::{LoggerConfig, logger_init};
use dhc_prometheus::{Encoder, PrometheusMetrics, TextEncoder};

use config::{AgentConfig, BackendKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger_init(&LoggerConfig::from_env()?)?;
    let cfg = AgentConfig::from_env()?;

    let path = std::env::args()
        .nth(1)
        .context("usage: dhc-agentd <request.json>")?;
    let request: BuildRequest = serde_json::from_str(
        &std::fs::read_to_string(&path).with_context(|| format!("read {path}"))?,
    )
    .with_context(|| format!("parse {path}"))?;

    let metrics = PrometheusMetrics::new()?;
    let handle: MetricsHandle = Arc::new(metrics.clone());
    let runs = Arc::new(InMemoryRunStore::new());
    let logs = Arc::new(InMemoryLogStore::new());

    let framework = JobFramework::new(
        backend(cfg.backend)?,
        PollingService::with_metrics(handle.clone()),
        runs.clone(),
        logs.clone(),
    )
    .with_config(cfg.framework.clone())
    .with_metrics(handle);

    let reattached = framework.reconcile().await?;
    if !reattached.is_empty() {
        info!(jobs = ?reattached, "re-attached trackers");
    }

    let polling = framework.polling().clone();
    let frameworks: Vec<Arc<dyn Framework>> = vec![Arc::new(framework)];
    let dispatcher = Dispatcher::new(
        Arc::new(BuilderRegistry::new(default_builders())?),
        Arc::new(FrameworkRegistry::new(frameworks)?),
    );

    let runnable = dispatcher.submit(&request).await?;
    info!(run = %runnable.id, framework = %runnable.framework, "submitted");

    let state = tokio::select! {
        state = wait_terminal(runs.as_ref(), &runnable.id) => state?,
        _ = tokio::signal::ctrl_c() => {
            warn!(run = %runnable.id, "interrupted; stopping run");
            dispatcher.stop(&runnable).await?;
            RunState::Stopped
        }
    };
    polling.stop_all().await;

    for record in logs.list_by_run(&runnable.id).await? {
        println!("{}", record.content.trim_end());
    }
    if cfg.dump_metrics {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metrics.gather(), &mut buffer)?;
        print!("{}", String::from_utf8_lossy(&buffer));
    }

    info!(run = %runnable.id, %state, "finished");
    if state != RunState::Completed {
        bail!("run {} ended in {state}", runnable.id);
    }
    Ok(())
}

fn backend(kind: BackendKind) -> anyhow::Result<Arc<dyn BatchClient>> {
    match kind {
        BackendKind::Proc => Ok(Arc::new(ProcBackend::default())),
        #[cfg(feature = "kube")]
        BackendKind::Kube => {
            use dhc_exec::backend::{KubeClient, KubeConfig};
            Ok(Arc::new(KubeClient::new(KubeConfig::from_env())?))
        }
        #[cfg(not(feature = "kube"))]
        BackendKind::Kube => bail!("built without the kube feature"),
    }
}

async fn wait_terminal(runs: &dyn RunStore, id: &RunId) -> anyhow::Result<RunState> {
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    loop {
        ticker.tick().await;
        let run = runs
            .get(id)
            .await?
            .with_context(|| format!("run {id} disappeared"))?;
        if run.is_terminal() {
            return Ok(run.state);
        }
    }
}
