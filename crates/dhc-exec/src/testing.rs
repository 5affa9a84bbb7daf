//! Scripted [`BatchClient`] for framework tests.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use dhc_core::backend::{
    BackendError, BatchClient, JobEvent, JobManifest, JobStatus, LabelSelector,
};

#[derive(Default)]
struct FakeJob {
    labels: BTreeMap<String, String>,
    events: Vec<JobEvent>,
    logs: String,
}

#[derive(Default)]
struct State {
    jobs: BTreeMap<String, FakeJob>,
    created: Vec<JobManifest>,
    reject_next: Option<BackendError>,
    status_error: Option<BackendError>,
    logs_error: Option<BackendError>,
}

#[derive(Default)]
pub struct FakeBatch {
    state: Mutex<State>,
}

impl FakeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn reject_next(&self, err: BackendError) {
        self.state().reject_next = Some(err);
    }

    /// Every status query fails with `err` until cleared with `None`.
    pub fn fail_status(&self, err: Option<BackendError>) {
        self.state().status_error = err;
    }

    /// Every log fetch fails with `err` until cleared with `None`.
    pub fn fail_logs(&self, err: Option<BackendError>) {
        self.state().logs_error = err;
    }

    pub fn push_event(&self, job: &str, reason: &str) {
        if let Some(j) = self.state().jobs.get_mut(job) {
            j.events.push(JobEvent::new(reason, format!("{reason} for {job}")));
        }
    }

    pub fn set_logs(&self, job: &str, logs: &str) {
        if let Some(j) = self.state().jobs.get_mut(job) {
            j.logs = logs.to_string();
        }
    }

    pub fn has_job(&self, job: &str) -> bool {
        self.state().jobs.contains_key(job)
    }

    pub fn created(&self) -> Vec<JobManifest> {
        self.state().created.clone()
    }
}

#[async_trait]
impl BatchClient for FakeBatch {
    async fn create_job(&self, manifest: &JobManifest) -> Result<(), BackendError> {
        let mut state = self.state();
        if let Some(err) = state.reject_next.take() {
            return Err(err);
        }
        if state.jobs.contains_key(manifest.name()) {
            return Err(BackendError::AlreadyExists(manifest.name().to_string()));
        }
        state.jobs.insert(
            manifest.name().to_string(),
            FakeJob {
                labels: manifest.metadata.labels.clone(),
                ..Default::default()
            },
        );
        state.created.push(manifest.clone());
        Ok(())
    }

    async fn job_status(&self, _namespace: &str, name: &str) -> Result<JobStatus, BackendError> {
        let state = self.state();
        if let Some(err) = &state.status_error {
            return Err(err.clone());
        }
        state
            .jobs
            .get(name)
            .map(|j| JobStatus::new(j.events.clone()))
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    async fn job_logs(&self, _namespace: &str, name: &str) -> Result<String, BackendError> {
        let state = self.state();
        if let Some(err) = &state.logs_error {
            return Err(err.clone());
        }
        state
            .jobs
            .get(name)
            .map(|j| j.logs.clone())
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    async fn list_jobs(
        &self,
        _namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<String>, BackendError> {
        Ok(self
            .state()
            .jobs
            .iter()
            .filter(|(_, j)| selector.matches(&j.labels))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn delete_job(&self, _namespace: &str, name: &str) -> Result<(), BackendError> {
        self.state()
            .jobs
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }
}
