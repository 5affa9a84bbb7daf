use dhc_model::{BuildRequest, Runnable};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Turns the abstract function/task/run specs of one `(runtime, task)` pair into a [`Runnable`].
///
/// Each implementation declares its own registration key through [`Builder::runtime`] and
/// [`Builder::task`].
pub trait Builder: Send + Sync {
    fn runtime(&self) -> &'static str;

    fn task(&self) -> &'static str;

    fn build(&self, request: &BuildRequest) -> Result<Runnable, BuildError>;
}
