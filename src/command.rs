use crate::env::Environment;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// A command implemented inside the interpreter.
///
/// One value is registered in the dispatch table under each of its [`names`](Self::names).
/// Handlers check their own arity and report every failure through the returned
/// `Result`; the driver prints and journals it, then moves on to the next line.
pub trait BuiltinCommand {
    /// Keywords this command answers to, e.g. `["rm", "del"]`.
    fn names(&self) -> &'static [&'static str];

    /// One-line synopsis, printed in usage errors.
    fn usage(&self) -> &'static str;

    /// Executes the command.
    ///
    /// `tokens[0]` is the keyword that selected the handler; the arguments follow.
    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}
