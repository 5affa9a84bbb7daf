//! Seam between frameworks and the execution environment they submit to.

mod manifest;
pub use manifest::{
    Container, EnvVar, JobManifest, JobSpec, LabelSelector, ObjectMeta, PodSpec, PodTemplateSpec,
    PullPolicy, RestartPolicy,
};

mod status;
pub use status::{JobEvent, JobStatus};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("workload already exists: {0}")]
    AlreadyExists(String),

    #[error("workload not found: {0}")]
    NotFound(String),

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    /// Failures worth retrying on the next poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_))
    }
}

/// Client of a batch execution backend (a Kubernetes cluster, a local process pool...).
#[async_trait]
pub trait BatchClient: Send + Sync {
    /// Create the job described by `manifest` in its namespace.
    ///
    /// A job with the same name must be reported as [`BackendError::AlreadyExists`].
    async fn create_job(&self, manifest: &JobManifest) -> Result<(), BackendError>;

    /// Events observed so far for the job.
    async fn job_status(&self, namespace: &str, name: &str) -> Result<JobStatus, BackendError>;

    /// Collected output of the job's containers.
    async fn job_logs(&self, namespace: &str, name: &str) -> Result<String, BackendError>;

    /// Names of jobs carrying every label of `selector`.
    async fn list_jobs(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<String>, BackendError>;

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), BackendError>;
}
