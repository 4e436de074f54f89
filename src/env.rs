use std::collections::HashMap;
use std::env as stdenv;
use std::path::{Path, PathBuf};

/// Name of the variable holding the AI service credential.
pub const AI_KEY_VAR: &str = "GROQ_API_KEY";

/// Name of the variable selecting the AI model.
pub const AI_MODEL_VAR: &str = "AI_MODEL";

/// Model used when `AI_MODEL` is not set.
pub const DEFAULT_AI_MODEL: &str = "llama3-70b-8192";

/// Per-session state shared by every command of one interpreter.
///
/// The environment contains:
/// - `vars`: the variable store read by expansion and written by `set`, `let` and `read`.
/// - `current_dir`: the directory relative paths are resolved against.
/// - `should_exit`: set once `exit` or `quit` has been seen.
/// - `ai_key`: the credential handed to the AI collaborator.
///
/// Fields are public to keep handlers short; there is no process-wide copy of any of this.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Variable name to value. Names are case-sensitive.
    pub vars: HashMap<String, String>,
    /// The working directory of the session.
    pub current_dir: PathBuf,
    /// When set to true, the driver stops reading lines.
    pub should_exit: bool,
    /// Cached copy of the last value assigned to [`AI_KEY_VAR`].
    pub ai_key: Option<String>,
}

impl Environment {
    /// Create a session seeded from the process state.
    ///
    /// Only a fixed set of entries is copied: `PATH`, `USER`, `HOME`, plus
    /// `SHELL` and the default `AI_MODEL`.
    pub fn new() -> Self {
        let mut env = Self::empty(stdenv::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let user = stdenv::var("USER")
            .or_else(|_| stdenv::var("USERNAME"))
            .unwrap_or_else(|_| "user".to_string());
        let home = stdenv::var("HOME")
            .or_else(|_| stdenv::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        env.set_var("PATH", stdenv::var("PATH").unwrap_or_default());
        env.set_var("USER", user);
        env.set_var("HOME", home);
        env.set_var("SHELL", "MyShell");
        env.set_var(AI_MODEL_VAR, DEFAULT_AI_MODEL);
        env
    }

    /// A session with no variables at all, rooted at `current_dir`.
    pub fn empty(current_dir: PathBuf) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir,
            should_exit: false,
            ai_key: None,
        }
    }

    /// Get the value of a variable.
    ///
    /// `None` means the name was never assigned, which is different from `Some("")`.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Model name for AI requests.
    pub fn ai_model(&self) -> &str {
        match self.get_var(AI_MODEL_VAR) {
            Some(model) if !model.is_empty() => model,
            _ => DEFAULT_AI_MODEL,
        }
    }

    /// Resolve a user supplied path against the session directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::{AI_MODEL_VAR, DEFAULT_AI_MODEL, Environment};
    use std::path::PathBuf;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::empty(PathBuf::from("/tmp"));

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE"));
    }

    #[test]
    fn test_undefined_differs_from_empty() {
        let mut env = Environment::empty(PathBuf::from("/tmp"));
        env.set_var("blank", "");

        assert_eq!(env.get_var("blank"), Some(""));
        assert_eq!(env.get_var("missing"), None);
        assert_eq!(env.vars.len(), 1);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut env = Environment::empty(PathBuf::from("/tmp"));
        env.set_var("name", "lower");

        assert_eq!(env.get_var("NAME"), None);
    }

    #[test]
    fn test_new_seeds_fixed_entries() {
        let env = Environment::new();
        assert_eq!(env.get_var("SHELL"), Some("MyShell"));
        assert_eq!(env.get_var(AI_MODEL_VAR), Some(DEFAULT_AI_MODEL));
        assert!(env.get_var("USER").is_some());
        assert!(env.get_var("HOME").is_some());
        assert!(env.ai_key.is_none());
    }

    #[test]
    fn test_ai_model_falls_back_when_blank() {
        let mut env = Environment::empty(PathBuf::from("/tmp"));
        assert_eq!(env.ai_model(), DEFAULT_AI_MODEL);
        env.set_var(AI_MODEL_VAR, "mixtral-8x7b-32768");
        assert_eq!(env.ai_model(), "mixtral-8x7b-32768");
        env.set_var(AI_MODEL_VAR, "");
        assert_eq!(env.ai_model(), DEFAULT_AI_MODEL);
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_relative_and_absolute() {
        let env = Environment::empty(PathBuf::from("/srv/work"));
        assert_eq!(env.resolve("notes.txt"), PathBuf::from("/srv/work/notes.txt"));
        assert_eq!(env.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
