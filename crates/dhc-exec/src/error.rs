use thiserror::Error;

use dhc_core::backend::BackendError;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("non-zero exit code: {code}")]
    NonZeroExit { code: i32 },
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("killed by signal")]
    KilledBySignal,
    #[error("missing program")]
    MissingProgram,
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for BackendError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::MissingProgram => BackendError::Rejected(e.to_string()),
            other => BackendError::Unavailable(other.to_string()),
        }
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
