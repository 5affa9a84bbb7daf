//! Cluster job framework: submits one job per run and tracks it to a terminal state.

mod config;
pub use config::{ENV_ENDPOINT, ENV_PROJECT, ENV_RUN_ID, JobFrameworkConfig};

mod naming;
pub use naming::{container_name, job_labels, job_name, managed_selector};

mod job;
pub use job::JobFramework;

mod step;
pub use step::{FAILURE_REASONS, JobStatusStep};
