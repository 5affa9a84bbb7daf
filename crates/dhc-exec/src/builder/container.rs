use dhc_core::{BuildError, Builder};
use dhc_model::{BuildRequest, RunEnv, Runnable};

use super::{Draft, assemble, non_empty};

/// `container+job`: runs a user supplied image with an explicit command.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerJobBuilder;

impl Builder for ContainerJobBuilder {
    fn runtime(&self) -> &'static str {
        "container"
    }

    fn task(&self) -> &'static str {
        "job"
    }

    fn build(&self, request: &BuildRequest) -> Result<Runnable, BuildError> {
        let function = &request.function;
        let image = non_empty(function.image.as_ref()).ok_or(BuildError::MissingField("image"))?;
        let command =
            non_empty(function.command.as_ref()).ok_or(BuildError::MissingField("command"))?;

        Ok(assemble(
            self,
            request,
            Draft {
                image,
                command,
                args: function.args.clone(),
                env: RunEnv::new(),
            },
        ))
    }
}
