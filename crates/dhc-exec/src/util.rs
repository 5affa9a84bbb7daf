use tokio::process::{Child, Command};

use crate::error::{ExecError, ExecResult};

/// Command for `argv[0]` with the remaining tokens as arguments.
pub fn cmd_program(argv: &[String]) -> ExecResult<Command> {
    let (program, args) = argv.split_first().ok_or(ExecError::MissingProgram)?;
    if program.trim().is_empty() {
        return Err(ExecError::MissingProgram);
    }
    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(|s| s.as_str()));
    Ok(cmd)
}

/// Kill the child unless it already exited, then reap it.
pub async fn kill_graceful(child: &mut Child) -> std::io::Result<()> {
    if child.try_wait()?.is_some() {
        return Ok(());
    }
    child.kill().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_is_missing_program() {
        assert!(matches!(cmd_program(&[]), Err(ExecError::MissingProgram)));
        assert!(matches!(
            cmd_program(&["  ".to_string()]),
            Err(ExecError::MissingProgram)
        ));
    }

    #[test]
    fn program_and_args_are_split() {
        let cmd = cmd_program(&["echo".to_string(), "a".to_string(), "b".to_string()]).unwrap();
        let std_cmd = cmd.as_std();
        assert_eq!(std_cmd.get_program(), "echo");
        let args: Vec<_> = std_cmd.get_args().collect();
        assert_eq!(args, vec!["a", "b"]);
    }
}
