//! A small line-oriented command interpreter.
//!
//! Each input line goes through the same pipeline: `$name` references are expanded
//! against the session's variables, the expanded text is split into tokens (double
//! quotes group, backslashes escape), and the first token selects a handler from the
//! dispatch table. Anything the table does not know is handed to the host shell.
//!
//! The main entry point is [`Interpreter`], which owns the session [`env::Environment`],
//! the dispatch table and the collaborators (process runner, journal, AI client).
//! Lines can come from an interactive terminal ([`Interpreter::repl`]) or from a
//! script file ([`Interpreter::run_script`]).
//!
//! Every failure of a single line is reported and then forgotten: the session only
//! ends on `exit`, `quit` or end of input.

pub mod ai;
mod builtin;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod expand;
pub mod external;
mod interpreter;
pub mod journal;
pub mod lexer;

/// Just a convenient re-export of the command interpreter.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::{Flow, Interpreter};
