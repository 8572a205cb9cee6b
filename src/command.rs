use crate::env::Environment;
use crate::error::ShellResult;
use std::io::{Read, Write};

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Outcome of evaluating a command that did not fail.
///
/// Failures travel as [`crate::ShellError`]; a request to leave the shell
/// travels as [`Status::Exit`] so that sequences can finish their remaining
/// steps before honouring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The command ran to completion.
    Success,
    /// The `exit` built-in asked the shell to terminate with this code.
    Exit(ExitCode),
}

impl Status {
    pub fn is_exit(self) -> bool {
        matches!(self, Status::Exit(_))
    }
}

/// Object-safe trait for any command that can be dispatched by the shell.
///
/// Implemented for every built-in via a blanket impl.
pub trait ExecutableCommand {
    /// Executes the command against the wired streams.
    fn execute(
        self: Box<Self>,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> ShellResult<Status>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
