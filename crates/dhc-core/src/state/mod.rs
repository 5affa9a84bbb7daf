//! Run and log persistence seams, with in-memory implementations.

mod log;
pub use log::{InMemoryLogStore, LogStore};

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::SystemTime,
};

use async_trait::async_trait;
use dhc_model::{Run, RunId, RunPage, RunQuery, RunState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run not found: {0}")]
    NotFound(RunId),

    #[error("run already exists: {0}")]
    Duplicate(RunId),

    #[error("run {id} is terminal ({state}); refusing update to {requested}")]
    Terminal {
        id: RunId,
        state: RunState,
        requested: RunState,
    },

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Persistence of run records.
///
/// Records are immutable once terminal: an update to another state fails with
/// [`StoreError::Terminal`], re-writing the same terminal state is a no-op.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create(&self, run: Run) -> Result<(), StoreError>;

    async fn get(&self, id: &RunId) -> Result<Option<Run>, StoreError>;

    async fn update_state(
        &self,
        id: &RunId,
        state: RunState,
        error: Option<String>,
    ) -> Result<Run, StoreError>;

    async fn query(&self, query: &RunQuery) -> Result<RunPage<Run>, StoreError>;

    /// Runs that have not reached a terminal state.
    async fn list_active(&self) -> Result<Vec<Run>, StoreError>;
}

/// In-memory run storage.
#[derive(Clone)]
pub struct InMemoryRunStore {
    inner: Arc<RwLock<RunStoreInner>>,
}

struct RunStoreInner {
    /// Runs indexed by id.
    runs: HashMap<RunId, Run>,
    /// Index: project -> run ids in submission order.
    by_project: HashMap<String, Vec<RunId>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RunStoreInner {
                runs: HashMap::new(),
                by_project: HashMap::new(),
            })),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RunStoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RunStoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for InMemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self, run: Run) -> Result<(), StoreError> {
        let mut inner = self.write();
        if inner.runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate(run.id));
        }
        inner
            .by_project
            .entry(run.project.clone())
            .or_default()
            .push(run.id.clone());
        inner.runs.insert(run.id.clone(), run);
        Ok(())
    }

    async fn get(&self, id: &RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.read().runs.get(id).cloned())
    }

    async fn update_state(
        &self,
        id: &RunId,
        state: RunState,
        error: Option<String>,
    ) -> Result<Run, StoreError> {
        let mut inner = self.write();
        let run = inner
            .runs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if run.state.is_terminal() {
            if run.state == state {
                return Ok(run.clone());
            }
            return Err(StoreError::Terminal {
                id: id.clone(),
                state: run.state,
                requested: state,
            });
        }

        run.state = state;
        run.updated_at = SystemTime::now();
        if let Some(err) = error {
            run.error = Some(err);
        }
        Ok(run.clone())
    }

    /// Filters are applied inside a single read lock.
    /// When `project` is specified, the `by_project` index narrows the scan.
    /// `total` reflects the count after filtering, before pagination.
    async fn query(&self, q: &RunQuery) -> Result<RunPage<Run>, StoreError> {
        let inner = self.read();

        let iter: Box<dyn Iterator<Item = &Run>> = match &q.project {
            Some(project) => match inner.by_project.get(project.as_str()) {
                Some(ids) => Box::new(ids.iter().filter_map(|id| inner.runs.get(id))),
                None => {
                    return Ok(RunPage {
                        items: vec![],
                        total: 0,
                    });
                }
            },
            None => Box::new(inner.runs.values()),
        };

        let iter: Box<dyn Iterator<Item = &Run>> = match q.state {
            Some(state) => Box::new(iter.filter(move |run| run.state == state)),
            None => iter,
        };

        let filtered: Vec<&Run> = iter.collect();
        let total = filtered.len();

        let items = filtered
            .into_iter()
            .skip(q.offset)
            .take(q.limit)
            .cloned()
            .collect();

        Ok(RunPage { items, total })
    }

    async fn list_active(&self) -> Result<Vec<Run>, StoreError> {
        Ok(self
            .read()
            .runs
            .values()
            .filter(|run| !run.state.is_terminal())
            .cloned()
            .collect())
    }
}
