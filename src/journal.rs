//! Append-only session journal.

use chrono::Local;
use log::warn;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default journal file name, relative to the startup directory.
pub const DEFAULT_LOG_FILE: &str = "myshell.log";

/// Receiver of session events. Fire-and-forget: recording never fails from the
/// caller's point of view.
pub trait Journal {
    fn record(&self, message: &str);
}

/// Appends `[YYYY-MM-DD HH:MM:SS] message` lines to a file.
pub struct FileJournal {
    path: PathBuf,
}

impl FileJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, message: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(
            file,
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )
    }
}

impl Journal for FileJournal {
    fn record(&self, message: &str) {
        if let Err(e) = self.append(message) {
            warn!("journal {}: {}", self.path.display(), e);
        }
    }
}

/// Journal that drops everything.
pub struct NullJournal;

impl Journal for NullJournal {
    fn record(&self, _message: &str) {}
}
