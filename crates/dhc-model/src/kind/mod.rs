mod runnable;
pub use runnable::Runnable;

mod spec;
pub use spec::{BuildRequest, FunctionSpec, RunSpec, TaskSpec};
