use crate::command::ExitCode;
use crate::env::Environment;
use anyhow::{Context, Result};
use std::process::{Command, ExitStatus, Stdio};

/// What an external command left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything the command wrote to standard output.
    pub stdout: String,
    pub status: ExitCode,
}

/// Runs command lines the interpreter has no built-in for.
pub trait ProcessRunner {
    /// Execute `command_line` synchronously and capture its standard output.
    ///
    /// `Err` means the command could not be started at all; a command that ran
    /// and failed is an `Ok` with a non-zero status.
    fn run(&self, command_line: &str, env: &Environment) -> Result<CommandOutput>;
}

/// Hands the whole line to the host shell (`sh -c` on Unix, `cmd /C` elsewhere).
///
/// The child runs in the session directory and inherits the process environment;
/// session variables stay inside the interpreter. Standard error is inherited so
/// diagnostics reach the terminal.
#[derive(Debug, Default)]
pub struct HostShell;

impl ProcessRunner for HostShell {
    fn run(&self, command_line: &str, env: &Environment) -> Result<CommandOutput> {
        let output = shell_command(command_line)
            .current_dir(&env.current_dir)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Command failed to start: {}", command_line))?;
        let status = match output.status.code() {
            Some(x) => x,
            None => terminated_by_signal(output.status),
        };
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            status,
        })
    }
}

#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

#[cfg(not(unix))]
fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command_line);
    cmd
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}
