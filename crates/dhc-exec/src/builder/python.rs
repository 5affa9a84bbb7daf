use dhc_core::{BuildError, Builder};
use dhc_model::{BuildRequest, RunEnv, Runnable};

use super::{Draft, assemble, non_empty};

pub const DEFAULT_PYTHON_IMAGE: &str = "python:3.11-slim";

fn python_env() -> RunEnv {
    RunEnv::single("PYTHONUNBUFFERED", "1")
}

/// `python+job`: `python <source> [args...]` in a Python image.
#[derive(Debug, Clone)]
pub struct PythonJobBuilder {
    default_image: String,
}

impl PythonJobBuilder {
    pub fn new(default_image: impl Into<String>) -> Self {
        Self {
            default_image: default_image.into(),
        }
    }
}

impl Default for PythonJobBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON_IMAGE)
    }
}

impl Builder for PythonJobBuilder {
    fn runtime(&self) -> &'static str {
        "python"
    }

    fn task(&self) -> &'static str {
        "job"
    }

    fn build(&self, request: &BuildRequest) -> Result<Runnable, BuildError> {
        let function = &request.function;
        let source =
            non_empty(function.source.as_ref()).ok_or(BuildError::MissingField("source"))?;
        let image = non_empty(function.image.as_ref()).unwrap_or_else(|| self.default_image.clone());

        let mut args = vec![source];
        args.extend(function.args.iter().cloned());

        Ok(assemble(
            self,
            request,
            Draft {
                image,
                command: "python".into(),
                args,
                env: python_env(),
            },
        ))
    }
}

/// `python+build`: installs the function's requirements into the image.
#[derive(Debug, Clone)]
pub struct PythonBuildBuilder {
    default_image: String,
}

impl PythonBuildBuilder {
    pub fn new(default_image: impl Into<String>) -> Self {
        Self {
            default_image: default_image.into(),
        }
    }
}

impl Default for PythonBuildBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON_IMAGE)
    }
}

impl Builder for PythonBuildBuilder {
    fn runtime(&self) -> &'static str {
        "python"
    }

    fn task(&self) -> &'static str {
        "build"
    }

    fn build(&self, request: &BuildRequest) -> Result<Runnable, BuildError> {
        let function = &request.function;
        let requirements = non_empty(function.source.as_ref())
            .unwrap_or_else(|| "requirements.txt".to_string());
        if !requirements.ends_with(".txt") {
            return Err(BuildError::InvalidSpec(format!(
                "build source must be a requirements file, got {requirements}"
            )));
        }
        let image = non_empty(function.image.as_ref()).unwrap_or_else(|| self.default_image.clone());

        Ok(assemble(
            self,
            request,
            Draft {
                image,
                command: "pip".into(),
                args: vec![
                    "install".into(),
                    "--no-cache-dir".into(),
                    "-r".into(),
                    requirements,
                ],
                env: python_env(),
            },
        ))
    }
}
