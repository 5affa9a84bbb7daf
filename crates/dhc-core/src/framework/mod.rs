use async_trait::async_trait;
use dhc_model::Runnable;

use crate::error::CoreError;

/// Pluggable backend executor.
#[async_trait]
pub trait Framework: Send + Sync {
    /// Backend identifier used as the registry key.
    fn name(&self) -> &'static str;

    /// Submit the workload and start tracking it.
    ///
    /// Returns once the workload is accepted and its tracker is running; it never waits for
    /// the workload to finish.
    async fn execute(&self, runnable: &Runnable) -> Result<(), CoreError>;

    /// Stop tracking the workload, remove it from the backend and mark the run stopped.
    async fn stop(&self, runnable: &Runnable) -> Result<(), CoreError>;
}
