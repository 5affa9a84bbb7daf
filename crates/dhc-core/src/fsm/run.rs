use std::sync::Arc;

use dhc_model::{RunEvent, RunId, RunState};

use super::{Definition, Lifecycle, StateMachine, Trigger};

impl Lifecycle for RunState {
    fn is_terminal(&self) -> bool {
        RunState::is_terminal(self)
    }
}

impl Trigger for RunEvent {}

/// Per-run data threaded through the machine.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub project: String,
    /// Backend observations already acted upon (event reasons, in arrival order).
    pub accumulator: Vec<String>,
}

impl RunContext {
    pub fn new(run_id: RunId, project: impl Into<String>) -> Self {
        Self {
            run_id,
            project: project.into(),
            accumulator: Vec::new(),
        }
    }
}

pub type RunStateMachine = StateMachine<RunState, RunEvent, RunContext>;

/// Run lifecycle definition:
///
/// ```text
/// CREATED --BUILD--> READY --RUN--> RUNNING --COMPLETE--> COMPLETED
/// CREATED|READY|RUNNING --STOP--> STOPPED
/// any non-terminal --FAIL--> ERROR
/// ```
#[derive(Clone)]
pub struct RunLifecycle {
    definition: Arc<Definition<RunState, RunEvent>>,
}

impl RunLifecycle {
    pub fn new() -> Self {
        let definition = Definition::builder()
            .edge(RunState::Created, RunEvent::Build, RunState::Ready)
            .edge(RunState::Ready, RunEvent::Run, RunState::Running)
            .edge(RunState::Running, RunEvent::Complete, RunState::Completed)
            .edge(RunState::Created, RunEvent::Stop, RunState::Stopped)
            .edge(RunState::Ready, RunEvent::Stop, RunState::Stopped)
            .edge(RunState::Running, RunEvent::Stop, RunState::Stopped)
            .from_any_non_terminal(RunEvent::Fail, RunState::Error)
            .build();
        Self {
            definition: Arc::new(definition),
        }
    }

    /// New machine for one run, seeded with its declared state.
    pub fn create(&self, initial: RunState, context: RunContext) -> RunStateMachine {
        StateMachine::new(Arc::clone(&self.definition), initial, context)
    }
}

impl Default for RunLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
