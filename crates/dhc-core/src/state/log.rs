use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use dhc_model::{LogRecord, RunId};

use super::StoreError;

/// Append-only sink for run logs.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, record: LogRecord) -> Result<(), StoreError>;

    /// Records of one run in append order.
    async fn list_by_run(&self, run: &RunId) -> Result<Vec<LogRecord>, StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryLogStore {
    records: Arc<RwLock<Vec<LogRecord>>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn append(&self, record: LogRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }

    async fn list_by_run(&self, run: &RunId) -> Result<Vec<LogRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| &r.run == run)
            .cloned()
            .collect())
    }
}
