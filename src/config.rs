use crate::env::AI_KEY_VAR;
use crate::journal::DEFAULT_LOG_FILE;
use argh::FromArgs;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Environment variable overriding the journal location.
pub const LOG_FILE_VAR: &str = "MYSHELL_LOG";

#[derive(FromArgs, Debug, PartialEq)]
/// Line-oriented command shell. Runs SCRIPT and exits when given, otherwise starts an interactive session.
pub struct Args {
    #[argh(positional)]
    /// script file to execute, one command per line
    pub script: Option<PathBuf>,

    #[argh(option)]
    /// file that receives the session journal (default: myshell.log, or $MYSHELL_LOG)
    pub log_file: Option<PathBuf>,

    #[argh(option)]
    /// file to load and save interactive line history
    pub history_file: Option<PathBuf>,

    #[argh(switch, short = 'q')]
    /// do not print the welcome banner
    pub quiet: bool,
}

/// Settings resolved from the command line and the process environment.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub script: Option<PathBuf>,
    /// Absolute, so that `cd` does not move the journal.
    pub log_file: PathBuf,
    pub history_file: Option<PathBuf>,
    pub banner: bool,
    /// Credential found in the process environment, if any.
    pub ai_key: Option<String>,
}

impl Config {
    /// Combine `args` with the process environment, resolving relative paths
    /// against `startup_dir`.
    pub fn resolve(args: Args, startup_dir: &Path) -> Self {
        Self::resolve_with(args, startup_dir, |key| stdenv::var(key).ok())
    }

    fn resolve_with(
        args: Args,
        startup_dir: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let log_file = args
            .log_file
            .or_else(|| lookup(LOG_FILE_VAR).filter(|v| !v.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        Self {
            script: args.script,
            log_file: startup_dir.join(log_file),
            history_file: args.history_file.map(|p| startup_dir.join(p)),
            banner: !args.quiet,
            ai_key: lookup(AI_KEY_VAR).filter(|v| !v.is_empty()),
        }
    }
}
