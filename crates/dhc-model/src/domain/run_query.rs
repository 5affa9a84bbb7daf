use super::RunState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for listing runs with filtering and pagination.
#[derive(Debug, Clone)]
pub struct RunQuery {
    pub project: Option<String>,
    pub state: Option<RunState>,
    pub limit: usize,
    pub offset: usize,
}

/// Result of a paginated run query.
#[derive(Debug, Clone)]
pub struct RunPage<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl RunQuery {
    pub fn new() -> Self {
        Self {
            project: None,
            state: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_state(mut self, state: RunState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for RunQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped() {
        let q = RunQuery::new().with_limit(10_000);
        assert_eq!(q.limit, MAX_LIMIT);
        assert_eq!(RunQuery::default().limit, DEFAULT_LIMIT);
    }
}
