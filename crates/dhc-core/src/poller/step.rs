use async_trait::async_trait;

/// What the poller does after a step returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Keep ticking.
    Continue,
    /// Terminal observation; the poller stops after this tick.
    Stop,
}

/// One check-and-react unit run on every tick.
///
/// Steps are owned by their poller task and invoked serially, so `&mut self` state needs no
/// synchronization.
#[async_trait]
pub trait WorkflowStep: Send {
    fn name(&self) -> &str;

    async fn run(&mut self) -> StepOutcome;
}

pub type Steps = Vec<Box<dyn WorkflowStep>>;
