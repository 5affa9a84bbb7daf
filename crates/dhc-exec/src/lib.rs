mod error;
pub use error::{ExecError, ExecResult};

mod util;

pub mod backend;
pub mod builder;
pub mod framework;

pub use builder::default_builders;
pub use framework::{JobFramework, JobFrameworkConfig};

#[cfg(test)]
mod testing;

pub mod prelude {
    pub use crate::builder::{ContainerJobBuilder, PythonBuildBuilder, PythonJobBuilder};
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::framework::{JobFramework, JobFrameworkConfig};

    #[cfg(feature = "proc")]
    pub use crate::backend::{ProcBackend, ProcConfig};
}
