pub mod backend;
pub mod builder;
pub mod dispatch;
pub mod error;
pub mod framework;
pub mod fsm;
pub mod metrics;
pub mod poller;
pub mod registry;
pub mod state;

pub use builder::{BuildError, Builder};
pub use dispatch::Dispatcher;
pub use error::{CoreError, ErrorKind};
pub use framework::Framework;
pub use poller::PollingService;
pub use registry::{BuilderKey, BuilderRegistry, FrameworkRegistry};
