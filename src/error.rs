use crate::command::ExitCode;
use thiserror::Error;

/// Failures a command line can end with.
///
/// These are the typed part of the error taxonomy; I/O failures travel as
/// [`anyhow::Error`] with context attached and are reported the same way.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Wrong number of arguments. Holds the command synopsis.
    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The external command ran but did not succeed.
    #[error("Command exited with status {status}: {command}")]
    ExternalStatus { status: ExitCode, command: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Unknown operator: {0}")]
    UnknownOperator(char),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Invalid sleep time: {0}")]
    InvalidSleepTime(String),

    /// The script is already being executed further up the inclusion stack.
    #[error("Script is already running: {0}")]
    ScriptCycle(String),

    #[error("Script nesting exceeds {0} levels")]
    ScriptDepth(usize),

    #[error("Groq API key not set. Use 'set GROQ_API_KEY your_api_key' to enable AI features.")]
    MissingCredential,
}
