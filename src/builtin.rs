use crate::command::{BuiltinCommand, ExitCode};
use crate::env::{AI_KEY_VAR, Environment};
use crate::error::ShellError;
use crate::lexer::resolve_escapes;
use anyhow::{Context, Result};
use regex::Regex;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;
use walkdir::WalkDir;

/// Print the arguments separated by spaces.
///
/// An argument that still starts with `$` when it reaches the handler is looked up
/// again; unknown names print as `[Undefined: $name]` instead of disappearing. Such
/// arguments only arrive through substituted values, since expansion does not rescan.
pub struct Echo;

impl Echo {
    fn resolve_word(word: &str, env: &Environment) -> String {
        match word.strip_prefix('$') {
            Some(name) if !name.is_empty() => match env.get_var(name) {
                Some(value) => value.to_string(),
                None => format!("[Undefined: ${}]", name),
            },
            _ => word.to_string(),
        }
    }
}

impl BuiltinCommand for Echo {
    fn names(&self) -> &'static [&'static str] {
        &["echo"]
    }

    fn usage(&self) -> &'static str {
        "echo <text>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let words: Vec<String> = tokens
            .iter()
            .skip(1)
            .map(|word| Self::resolve_word(word, env))
            .collect();
        writeln!(stdout, "{}", resolve_escapes(&words.join(" ")))?;
        Ok(0)
    }
}

/// Assign a variable: `set <name> <value...>`.
pub struct Set;

impl BuiltinCommand for Set {
    fn names(&self) -> &'static [&'static str] {
        &["set", "let"]
    }

    fn usage(&self) -> &'static str {
        "set <variable> <value>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, name, _, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let value = tokens[2..].join(" ");
        env.set_var(name.as_str(), value.as_str());

        if name == AI_KEY_VAR {
            env.ai_key = Some(value);
            writeln!(stdout, "Groq AI API key set. AI features are now enabled.")?;
        } else {
            writeln!(stdout, "Variable {} set to: {}", name, value)?;
        }
        Ok(0)
    }
}

static CALC_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    let number = r"[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";
    Regex::new(&format!(r"^\s*({number})\s*([^\s\d.])\s*({number})\s*$"))
        .expect("calc expression pattern")
});

/// Evaluate `<number> <operator> <number>` with one of `+ - * /`.
pub fn calculate(expr: &str) -> Result<f64, ShellError> {
    let invalid = || ShellError::InvalidExpression(expr.to_string());
    let caps = CALC_EXPR.captures(expr).ok_or_else(invalid)?;
    let left: f64 = caps[1].parse().map_err(|_| invalid())?;
    let right: f64 = caps[3].parse().map_err(|_| invalid())?;
    let op = caps[2].chars().next().ok_or_else(invalid)?;

    match op {
        '+' => Ok(left + right),
        '-' => Ok(left - right),
        '*' => Ok(left * right),
        '/' if right == 0.0 => Err(ShellError::DivisionByZero),
        '/' => Ok(left / right),
        other => Err(ShellError::UnknownOperator(other)),
    }
}

/// Render a result with six significant digits, in the style of C's `%g`.
fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    let trim = |digits: String| -> String {
        if digits.contains('.') {
            digits.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            digits
        }
    };
    let scientific = format!("{:.5e}", value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if (-4..6).contains(&exponent) {
        let decimals = (5 - exponent) as usize;
        trim(format!("{:.*}", decimals, value))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", trim(mantissa.to_string()), sign, exponent.abs())
    }
}

/// Single binary arithmetic operation: `calc 5 + 3`.
///
/// A failed calculation still prints a result line, with 0 as the value.
pub struct Calc;

impl BuiltinCommand for Calc {
    fn names(&self) -> &'static [&'static str] {
        &["calc"]
    }

    fn usage(&self) -> &'static str {
        "calc <expression>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        if tokens.len() < 2 {
            return Err(ShellError::Usage(self.usage()).into());
        }
        let expr = tokens[1..].join(" ");
        match calculate(&expr) {
            Ok(result) => {
                writeln!(stdout, "{} = {}", expr, format_number(result))?;
                Ok(0)
            }
            Err(e) => {
                writeln!(stdout, "{} = 0", expr)?;
                Err(e.into())
            }
        }
    }
}

/// Load a whole file into a variable: `read <variable> <file>`.
pub struct Read;

impl BuiltinCommand for Read {
    fn names(&self) -> &'static [&'static str] {
        &["read"]
    }

    fn usage(&self) -> &'static str {
        "read <variable> <file>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, name, file, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let content = match fs::read(env.resolve(file)) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ShellError::NotFound(file.clone()).into());
            }
            Err(e) => return Err(e).with_context(|| format!("Cannot read file: {}", file)),
        };
        env.set_var(name.as_str(), content);
        writeln!(stdout, "Read file content into variable {}", name)?;
        Ok(0)
    }
}

/// Overwrite a file with the remaining arguments: `write <file> <content...>`.
pub struct WriteFile;

impl BuiltinCommand for WriteFile {
    fn names(&self) -> &'static [&'static str] {
        &["write"]
    }

    fn usage(&self) -> &'static str {
        "write <file> <content>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, file, _, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let content = resolve_escapes(&tokens[2..].join(" "));
        fs::write(env.resolve(file), content)
            .with_context(|| format!("Cannot write to file: {}", file))?;
        writeln!(stdout, "Content written to {}", file)?;
        Ok(0)
    }
}

/// Add a line to the end of a file: `append <file> <content...>`.
pub struct Append;

impl BuiltinCommand for Append {
    fn names(&self) -> &'static [&'static str] {
        &["append"]
    }

    fn usage(&self) -> &'static str {
        "append <file> <content>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, file, _, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let content = resolve_escapes(&tokens[2..].join(" "));
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(env.resolve(file))
            .with_context(|| format!("Cannot append to file: {}", file))?;
        writeln!(f, "{}", content).with_context(|| format!("Cannot append to file: {}", file))?;
        writeln!(stdout, "Content appended to {}", file)?;
        Ok(0)
    }
}

/// Change the current working directory.
pub struct Cd;

impl BuiltinCommand for Cd {
    fn names(&self) -> &'static [&'static str] {
        &["cd"]
    }

    fn usage(&self) -> &'static str {
        "cd <directory>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, target, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let new_dir = env.resolve(target);
        if !new_dir.is_dir() {
            return Err(ShellError::NotFound(target.clone()).into());
        }

        let canonical = fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: can't canonicalize {}", new_dir.display()))?;

        env::set_current_dir(&canonical)
            .with_context(|| format!("cd: can't chdir to {}", canonical.display()))?;
        writeln!(stdout, "Changed directory to: {}", canonical.display())?;
        env.current_dir = canonical;
        Ok(0)
    }
}

/// List a directory: name, size (`-` for directories) and type of each entry.
pub struct Ls;

const NAME_WIDTH: usize = 30;
const SIZE_WIDTH: usize = 10;
const TYPE_WIDTH: usize = 10;

impl BuiltinCommand for Ls {
    fn names(&self) -> &'static [&'static str] {
        &["ls", "dir"]
    }

    fn usage(&self) -> &'static str {
        "ls [directory]"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let dir = match tokens.get(1) {
            Some(path) => env.resolve(path),
            None => env.current_dir.clone(),
        };
        let unreadable = || format!("Cannot list directory: {}", dir.display());

        // Everything is collected first so a failure prints no rows at all.
        let mut rows = Vec::new();
        for entry in fs::read_dir(&dir).with_context(unreadable)? {
            let entry = entry.with_context(unreadable)?;
            let meta = entry.metadata().with_context(unreadable)?;
            let (size, kind) = if meta.is_dir() {
                ("-".to_string(), "Dir")
            } else {
                (format!("{}B", meta.len()), "File")
            };
            rows.push((entry.file_name().to_string_lossy().into_owned(), size, kind));
        }
        rows.sort();

        writeln!(stdout, "Contents of {}:", dir.display())?;
        writeln!(
            stdout,
            "{:<NAME_WIDTH$}{:<SIZE_WIDTH$}{:<TYPE_WIDTH$}",
            "Name", "Size", "Type"
        )?;
        writeln!(stdout, "{}", "-".repeat(NAME_WIDTH + SIZE_WIDTH + TYPE_WIDTH))?;
        for (name, size, kind) in rows {
            writeln!(
                stdout,
                "{:<NAME_WIDTH$}{:<SIZE_WIDTH$}{:<TYPE_WIDTH$}",
                name, size, kind
            )?;
        }
        Ok(0)
    }
}

/// Create one directory.
pub struct Mkdir;

impl BuiltinCommand for Mkdir {
    fn names(&self) -> &'static [&'static str] {
        &["mkdir"]
    }

    fn usage(&self) -> &'static str {
        "mkdir <directory>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, target, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let path = env.resolve(target);
        if path.exists() {
            return Err(ShellError::AlreadyExists(target.clone()).into());
        }
        fs::create_dir(&path)
            .with_context(|| format!("Failed to create directory: {}", target))?;
        writeln!(stdout, "Directory created: {}", target)?;
        Ok(0)
    }
}

/// Remove a file, or a directory with everything below it.
pub struct Rm;

impl BuiltinCommand for Rm {
    fn names(&self) -> &'static [&'static str] {
        &["rm", "del"]
    }

    fn usage(&self) -> &'static str {
        "rm <file_or_directory>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, target, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let path = env.resolve(target);
        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ShellError::NotFound(target.clone()).into());
            }
            Err(e) => return Err(e).with_context(|| format!("Cannot remove: {}", target)),
        };

        if meta.is_dir() {
            let removed = WalkDir::new(&path)
                .into_iter()
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("Cannot remove directory: {}", target))?
                .len();
            writeln!(stdout, "Removing directory: {}", target)?;
            fs::remove_dir_all(&path)
                .with_context(|| format!("Cannot remove directory: {}", target))?;
            writeln!(stdout, "Removed {} files/directories", removed)?;
        } else {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove file: {}", target))?;
            writeln!(stdout, "File removed: {}", target)?;
        }
        Ok(0)
    }
}

/// Block the interpreter for a number of milliseconds.
pub struct Sleep;

impl BuiltinCommand for Sleep {
    fn names(&self) -> &'static [&'static str] {
        &["sleep"]
    }

    fn usage(&self) -> &'static str {
        "sleep <milliseconds>"
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let [_, ms, ..] = tokens else {
            return Err(ShellError::Usage(self.usage()).into());
        };
        let millis: u64 = ms
            .parse()
            .map_err(|_| ShellError::InvalidSleepTime(ms.clone()))?;
        writeln!(stdout, "Sleeping for {}ms...", millis)?;
        stdout.flush()?;
        thread::sleep(Duration::from_millis(millis));
        Ok(0)
    }
}

/// Command reference.
pub struct Help;

impl BuiltinCommand for Help {
    fn names(&self) -> &'static [&'static str] {
        &["help"]
    }

    fn usage(&self) -> &'static str {
        "help"
    }

    fn execute(
        &self,
        _tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "\nMyShell Commands:")?;
        writeln!(stdout, "----------------")?;
        writeln!(stdout, "echo <text>              - Print text to console")?;
        writeln!(stdout, "set/let <var> <value>    - Set variable value")?;
        writeln!(stdout, "calc <expression>        - Calculate simple expression")?;
        writeln!(stdout, "cd <directory>           - Change directory")?;
        writeln!(stdout, "ls/dir [directory]       - List directory contents")?;
        writeln!(stdout, "mkdir <directory>        - Create directory")?;
        writeln!(stdout, "rm/del <path>            - Remove file or directory")?;
        writeln!(stdout, "read <var> <file>        - Read file into variable")?;
        writeln!(stdout, "write <file> <content>   - Write content to file")?;
        writeln!(stdout, "append <file> <content>  - Append content to file")?;
        writeln!(stdout, "run <script>             - Run a script file")?;
        writeln!(stdout, "import <script>          - Same as run")?;
        writeln!(stdout, "sleep <ms>               - Sleep for milliseconds")?;
        writeln!(stdout, "exit/quit                - Exit the shell")?;
        writeln!(stdout, "help                     - Show this help")?;
        writeln!(stdout, "Anything else is passed to the system shell.")?;

        if env.ai_key.is_some() {
            writeln!(stdout, "\nAI Commands:")?;
            writeln!(stdout, "------------")?;
            writeln!(stdout, "ai <prompt>                   - Ask AI a question")?;
            writeln!(stdout, "aicode <lang> <description>   - Generate code in specified language")?;
            writeln!(stdout, "aiexplain <file>              - Explain code in a file")?;
            writeln!(stdout, "aifix <file>                  - Fix and improve code in a file")?;
            writeln!(stdout, "aicomplete <lang> <code>      - Complete partial code")?;
            writeln!(stdout, "aimodels                      - List available AI models")?;
        } else {
            writeln!(stdout, "\nTo enable AI features, use: set {} your_api_key", AI_KEY_VAR)?;
        }
        Ok(0)
    }
}
