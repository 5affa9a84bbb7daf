use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown run state: {0}")]
    UnknownState(String),
}
