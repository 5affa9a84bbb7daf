//! Runs each job's container command as a local child process.
//!
//! The image is ignored. Lifecycle is reported with the same event reasons a cluster emits:
//! `SuccessfulCreate` once spawned, then `Completed`, `BackoffLimitExceeded` (non-zero exit or
//! signal) or `Failed` (the process could not be started or waited on).

use std::{
    collections::{BTreeMap, HashMap},
    path::PathBuf,
    process::{ExitStatus, Stdio},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Child,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use dhc_core::backend::{
    BackendError, BatchClient, JobEvent, JobManifest, JobStatus, LabelSelector,
};

use crate::{
    error::{ExecError, ExecResult},
    util::{cmd_program, kill_graceful},
};

#[derive(Clone, Debug)]
pub struct ProcConfig {
    /// Working directory of every child; the current one when `None`.
    pub cwd: Option<PathBuf>,
    /// Start children with the parent's environment before applying the job's own.
    pub inherit_env: bool,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            cwd: None,
            inherit_env: true,
        }
    }
}

struct ProcJob {
    labels: BTreeMap<String, String>,
    events: Mutex<Vec<JobEvent>>,
    output: Mutex<String>,
    cancel: CancellationToken,
}

impl ProcJob {
    fn push_event(&self, reason: &str, message: impl Into<String>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(JobEvent::new(reason, message));
    }

    fn append_output(&self, line: &str) {
        let mut out = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        out.push_str(line);
        out.push('\n');
    }
}

/// Local process pool behind the batch client seam.
#[derive(Clone, Default)]
pub struct ProcBackend {
    jobs: Arc<Mutex<HashMap<String, Arc<ProcJob>>>>,
    config: ProcConfig,
}

impl ProcBackend {
    pub fn new(config: ProcConfig) -> Self {
        Self {
            jobs: Arc::default(),
            config,
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<String, Arc<ProcJob>>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn job(&self, namespace: &str, name: &str) -> Result<Arc<ProcJob>, BackendError> {
        self.jobs()
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    fn spawn(&self, manifest: &JobManifest) -> ExecResult<Child> {
        let container = manifest.containers().first().ok_or(ExecError::MissingProgram)?;
        let mut cmd = cmd_program(&container.command)?;
        if !self.config.inherit_env {
            cmd.env_clear();
        }
        for var in &container.env {
            cmd.env(&var.name, &var.value);
        }
        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        trace!(target: "dhc.exec.proc", command = ?container.command, "spawn");
        cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

#[async_trait]
impl BatchClient for ProcBackend {
    async fn create_job(&self, manifest: &JobManifest) -> Result<(), BackendError> {
        let key = key(manifest.namespace(), manifest.name());
        if manifest.containers().is_empty() {
            return Err(BackendError::Rejected(format!("{key}: no container")));
        }

        let job = Arc::new(ProcJob {
            labels: manifest.metadata.labels.clone(),
            events: Mutex::new(Vec::new()),
            output: Mutex::new(String::new()),
            cancel: CancellationToken::new(),
        });
        {
            let mut jobs = self.jobs();
            if jobs.contains_key(&key) {
                return Err(BackendError::AlreadyExists(manifest.name().to_string()));
            }
            jobs.insert(key.clone(), Arc::clone(&job));
        }

        match self.spawn(manifest) {
            Ok(child) => {
                job.push_event("SuccessfulCreate", format!("Created process for {key}"));
                tokio::spawn(supervise(job, child, key));
            }
            Err(ExecError::MissingProgram) => {
                self.jobs().remove(&key);
                return Err(ExecError::MissingProgram.into());
            }
            Err(err) => {
                warn!(target: "dhc.exec.proc", job = %key, error = %err, "process did not start");
                job.push_event("Failed", err.to_string());
            }
        }
        Ok(())
    }

    async fn job_status(&self, namespace: &str, name: &str) -> Result<JobStatus, BackendError> {
        let job = self.job(namespace, name)?;
        let events = job
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(JobStatus::new(events))
    }

    async fn job_logs(&self, namespace: &str, name: &str) -> Result<String, BackendError> {
        let job = self.job(namespace, name)?;
        let output = job
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(output)
    }

    async fn list_jobs(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<String>, BackendError> {
        let prefix = format!("{namespace}/");
        let mut names: Vec<String> = self
            .jobs()
            .iter()
            .filter(|(k, job)| k.starts_with(&prefix) && selector.matches(&job.labels))
            .map(|(k, _)| k[prefix.len()..].to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), BackendError> {
        let job = self
            .jobs()
            .remove(&key(namespace, name))
            .ok_or_else(|| BackendError::NotFound(name.to_string()))?;
        job.cancel.cancel();
        debug!(target: "dhc.exec.proc", job = name, "deleted");
        Ok(())
    }
}

async fn supervise(job: Arc<ProcJob>, mut child: Child, key: String) {
    let stdout = tokio::spawn(drain(child.stdout.take(), Arc::clone(&job)));
    let stderr = tokio::spawn(drain(child.stderr.take(), Arc::clone(&job)));

    tokio::select! {
        status = child.wait() => {
            // pick up the tail of the output before reporting the exit
            for (stream, task) in [("stdout", stdout), ("stderr", stderr)] {
                if let Err(e) = task.await {
                    debug!(target: "dhc.exec.proc", job = %key, stream, error = %e, "output drain aborted");
                }
            }
            match classify(status) {
                Ok(()) => {
                    debug!(target: "dhc.exec.proc", job = %key, "exit success");
                    job.push_event("Completed", "Job completed");
                }
                Err(err @ (ExecError::NonZeroExit { .. } | ExecError::KilledBySignal)) => {
                    debug!(target: "dhc.exec.proc", job = %key, error = %err, "exit failure");
                    job.push_event("BackoffLimitExceeded", err.to_string());
                }
                Err(err) => job.push_event("Failed", err.to_string()),
            }
        }
        _ = job.cancel.cancelled() => {
            debug!(target: "dhc.exec.proc", job = %key, "cancelled; killing child");
            if let Err(e) = kill_graceful(&mut child).await {
                warn!(target: "dhc.exec.proc", job = %key, error = %e, "kill failed");
            }
            stdout.abort();
            stderr.abort();
            job.push_event("Failed", ExecError::Cancelled.to_string());
        }
    }
}

fn classify(status: std::io::Result<ExitStatus>) -> ExecResult<()> {
    let status = status?;
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(ExecError::NonZeroExit { code }),
        None => Err(ExecError::KilledBySignal),
    }
}

async fn drain<R>(reader: Option<R>, job: Arc<ProcJob>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    // Output need not be UTF-8. Keep reading to EOF so the child never writes
    // into a closed pipe.
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => return,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                job.append_output(line.trim_end_matches(['\n', '\r']));
            }
            Err(e) => {
                debug!(target: "dhc.exec.proc", error = %e, "output stream closed with error");
                return;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use dhc_core::backend::{Container, PullPolicy};

    use super::*;

    fn manifest(name: &str, command: &[&str]) -> JobManifest {
        JobManifest::single_container(
            name,
            "default",
            BTreeMap::from([("app".to_string(), "test".to_string())]),
            Container {
                name: format!("c-{name}"),
                image: "ignored".into(),
                command: command.iter().map(|s| s.to_string()).collect(),
                image_pull_policy: PullPolicy::IfNotPresent,
                env: vec![dhc_core::backend::EnvVar {
                    name: "GREETING".into(),
                    value: "hello".into(),
                }],
            },
        )
    }

    async fn wait_for_reason(backend: &ProcBackend, name: &str, reasons: &[&str]) -> JobEvent {
        for _ in 0..500 {
            let status = backend.job_status("default", name).await.unwrap();
            if let Some(e) = status.events.iter().find(|e| reasons.contains(&e.reason.as_str())) {
                return e.clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{name} never reported {reasons:?}");
    }

    #[tokio::test]
    async fn successful_process_reports_completed_with_output() {
        let backend = ProcBackend::default();
        backend
            .create_job(&manifest("ok", &["sh", "-c", "echo $GREETING; echo warn 1>&2"]))
            .await
            .unwrap();

        wait_for_reason(&backend, "ok", &["Completed"]).await;
        let status = backend.job_status("default", "ok").await.unwrap();
        assert_eq!(status.events[0].reason, "SuccessfulCreate");

        let logs = backend.job_logs("default", "ok").await.unwrap();
        assert!(logs.contains("hello\n"));
        assert!(logs.contains("warn\n"));
    }

    #[tokio::test]
    async fn invalid_utf8_output_is_kept_and_process_completes() {
        let backend = ProcBackend::default();
        let script = "printf 'before\\n\\377\\nafter\\n'; \
                      i=0; while [ $i -lt 2000 ]; do echo line $i; i=$((i+1)); done; \
                      echo END";
        backend
            .create_job(&manifest("bytes", &["sh", "-c", script]))
            .await
            .unwrap();

        let event = wait_for_reason(
            &backend,
            "bytes",
            &["Completed", "BackoffLimitExceeded", "Failed"],
        )
        .await;
        assert_eq!(event.reason, "Completed", "{}", event.message);

        let logs = backend.job_logs("default", "bytes").await.unwrap();
        assert!(logs.contains("before\n"));
        assert!(logs.contains("\u{FFFD}\n"));
        assert!(logs.contains("after\n"));
        assert!(logs.contains("line 1999\n"));
        assert!(logs.ends_with("END\n"));
    }

    #[tokio::test]
    async fn non_zero_exit_reports_backoff_limit() {
        let backend = ProcBackend::default();
        backend
            .create_job(&manifest("bad", &["sh", "-c", "exit 3"]))
            .await
            .unwrap();

        let event = wait_for_reason(&backend, "bad", &["BackoffLimitExceeded", "Completed"]).await;
        assert_eq!(event.reason, "BackoffLimitExceeded");
        assert!(event.message.contains("3"));
    }

    #[tokio::test]
    async fn unknown_program_reports_failed() {
        let backend = ProcBackend::default();
        backend
            .create_job(&manifest("missing", &["/definitely/not/a/program"]))
            .await
            .unwrap();

        let status = backend.job_status("default", "missing").await.unwrap();
        assert_eq!(status.events.len(), 1);
        assert_eq!(status.events[0].reason, "Failed");
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let backend = ProcBackend::default();
        let err = backend.create_job(&manifest("empty", &[])).await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected(_)));
        assert!(matches!(
            backend.job_status("default", "empty").await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_name_already_exists() {
        let backend = ProcBackend::default();
        let m = manifest("dup", &["sh", "-c", "sleep 5"]);
        backend.create_job(&m).await.unwrap();
        assert!(matches!(
            backend.create_job(&m).await,
            Err(BackendError::AlreadyExists(ref n)) if n == "dup"
        ));
        backend.delete_job("default", "dup").await.unwrap();
    }

    #[tokio::test]
    async fn delete_kills_and_forgets_the_job() {
        let backend = ProcBackend::default();
        backend
            .create_job(&manifest("long", &["sh", "-c", "sleep 30"]))
            .await
            .unwrap();

        let selector = LabelSelector::new().with("app", "test");
        assert_eq!(backend.list_jobs("default", &selector).await.unwrap(), vec!["long"]);
        assert!(backend.list_jobs("other", &selector).await.unwrap().is_empty());

        backend.delete_job("default", "long").await.unwrap();
        assert!(matches!(
            backend.job_status("default", "long").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            backend.delete_job("default", "long").await,
            Err(BackendError::NotFound(_))
        ));
    }
}
