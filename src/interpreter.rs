use crate::ai::{AiCommand, AiModels, ChatClient, GroqClient};
use crate::command::BuiltinCommand;
use crate::config::Config;
use crate::env::{AI_KEY_VAR, Environment};
use crate::error::ShellError;
use crate::expand::expand_variables;
use crate::external::{HostShell, ProcessRunner};
use crate::journal::{FileJournal, Journal};
use crate::lexer::split_into_tokens;
use anyhow::{Context, Result};
use log::{debug, warn};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// How deep `run` may nest scripts inside each other.
pub const MAX_SCRIPT_DEPTH: usize = 16;

/// Whether the session goes on after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// `exit` or `quit` was executed.
    Exit,
}

/// A line-oriented interpreter for built-in and external commands.
///
/// The interpreter owns the session [`Environment`], a dispatch table mapping
/// keywords to [`BuiltinCommand`] handlers, the [`ProcessRunner`] used for every
/// keyword the table does not know, and the [`Journal`] that receives reported
/// errors.
///
/// Example
/// ```
/// use myshell::Interpreter;
/// use myshell::env::Environment;
/// use myshell::external::HostShell;
/// use myshell::journal::NullJournal;
///
/// let mut sh = Interpreter::new(Environment::new(), Box::new(HostShell), Box::new(NullJournal));
/// let (mut out, mut err) = (Vec::<u8>::new(), Vec::<u8>::new());
/// let flow = sh.execute_line("# comments are skipped", &mut out, &mut err);
/// assert_eq!(flow, myshell::Flow::Continue);
/// assert!(out.is_empty() && err.is_empty());
/// ```
pub struct Interpreter {
    env: Environment,
    commands: HashMap<&'static str, Rc<dyn BuiltinCommand>>,
    external: Box<dyn ProcessRunner>,
    journal: Box<dyn Journal>,
    /// Canonical paths of the scripts currently executing, outermost first.
    includes: Vec<PathBuf>,
}

impl Interpreter {
    /// Create an interpreter with an empty dispatch table.
    pub fn new(
        env: Environment,
        external: Box<dyn ProcessRunner>,
        journal: Box<dyn Journal>,
    ) -> Self {
        Self {
            env,
            commands: HashMap::new(),
            external,
            journal,
            includes: Vec::new(),
        }
    }

    /// Create an interpreter with every built-in command registered.
    ///
    /// - file and directory commands: `read`, `write`, `append`, `cd`, `ls`/`dir`,
    ///   `mkdir`, `rm`/`del`
    /// - `echo`, `set`/`let`, `calc`, `sleep`, `help`
    /// - AI commands backed by `chat`
    pub fn with_builtins(
        env: Environment,
        external: Box<dyn ProcessRunner>,
        journal: Box<dyn Journal>,
        chat: Rc<dyn ChatClient>,
    ) -> Self {
        use crate::builtin::*;
        let mut sh = Self::new(env, external, journal);
        sh.register(Echo);
        sh.register(Set);
        sh.register(Calc);
        sh.register(Read);
        sh.register(WriteFile);
        sh.register(Append);
        sh.register(Cd);
        sh.register(Ls);
        sh.register(Mkdir);
        sh.register(Rm);
        sh.register(Sleep);
        sh.register(Help);
        for ai in AiCommand::all(chat) {
            sh.register(ai);
        }
        sh.register(AiModels);
        sh
    }

    /// Build the production interpreter: host shell, file journal and Groq client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut env = Environment::new();
        if let Some(key) = &config.ai_key {
            env.set_var(AI_KEY_VAR, key.as_str());
            env.ai_key = Some(key.clone());
        }
        let chat: Rc<dyn ChatClient> = Rc::new(GroqClient::new()?);
        Ok(Self::with_builtins(
            env,
            Box::new(HostShell),
            Box::new(FileJournal::new(&config.log_file)),
            chat,
        ))
    }

    /// Add `command` to the dispatch table under each of its names, replacing
    /// any earlier handler for the same keyword.
    pub fn register(&mut self, command: impl BuiltinCommand + 'static) {
        let command: Rc<dyn BuiltinCommand> = Rc::new(command);
        for &name in command.names() {
            self.commands.insert(name, Rc::clone(&command));
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn journal(&self) -> &dyn Journal {
        self.journal.as_ref()
    }

    /// Run one line through expansion, tokenization and dispatch.
    ///
    /// Blank lines and `#` comments are skipped. Any failure is reported on
    /// `stderr` and in the journal; it never stops the session.
    pub fn execute_line(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Flow {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return Flow::Continue;
        }
        match self.dispatch(line, stdout, stderr) {
            Ok(flow) => flow,
            Err(err) => {
                self.report(&err, stderr);
                Flow::Continue
            }
        }
    }

    /// Run `lines` in order, stopping early only on `exit`/`quit`.
    pub fn execute_lines(
        &mut self,
        lines: &[&str],
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Flow {
        for line in lines {
            if self.execute_line(line, stdout, stderr) == Flow::Exit {
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Load a script file and execute it line by line.
    ///
    /// The file is read completely before its first line runs. A script that is
    /// already executing further up the `run` chain is rejected, as is nesting
    /// beyond [`MAX_SCRIPT_DEPTH`]. Lines already executed are never undone.
    pub fn run_script(
        &mut self,
        path: &Path,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Flow> {
        let resolved = self.env.resolve(path);
        let text = fs::read_to_string(&resolved)
            .with_context(|| format!("Unable to open script file: {}", path.display()))?;
        let canonical = fs::canonicalize(&resolved).unwrap_or(resolved);
        if self.includes.contains(&canonical) {
            return Err(ShellError::ScriptCycle(path.display().to_string()).into());
        }
        if self.includes.len() >= MAX_SCRIPT_DEPTH {
            return Err(ShellError::ScriptDepth(MAX_SCRIPT_DEPTH).into());
        }

        let lines: Vec<&str> = text.lines().collect();
        writeln!(
            stdout,
            "Running script {} ({} commands)",
            path.display(),
            lines.len()
        )?;
        self.journal
            .record(&format!("Running script {}", canonical.display()));

        self.includes.push(canonical);
        let flow = self.execute_lines(&lines, stdout, stderr);
        self.includes.pop();

        self.journal
            .record(&format!("Finished script {}", path.display()));
        if flow == Flow::Continue {
            writeln!(stdout, "Script execution completed")?;
        }
        Ok(flow)
    }

    /// Interactive loop on the terminal, until `exit`, `quit` or end of input.
    pub fn repl(&mut self, history_file: Option<&Path>) -> rustyline::Result<()> {
        let mut rl = DefaultEditor::new()?;
        if let Some(path) = history_file {
            if let Err(e) = rl.load_history(path) {
                debug!("no history loaded from {}: {}", path.display(), e);
            }
        }
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();

        while !self.env.should_exit {
            let readline = rl.readline(&self.prompt());
            match readline {
                Ok(line) => {
                    remember_line(&line, |l| rl.add_history_entry(l));
                    self.journal.record(&format!("Command executed: {}", line));
                    self.execute_line(&line, &mut stdout, &mut stderr);
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl-C drops the current line only.
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("[Error] {}", err);
                    break;
                }
            }
        }

        if let Some(path) = history_file {
            if let Err(e) = rl.save_history(path) {
                warn!("cannot save history to {}: {}", path.display(), e);
            }
        }
        Ok(())
    }

    /// Print a failure and record it in the journal.
    pub fn report(&self, err: &anyhow::Error, stderr: &mut dyn Write) {
        let message = format!("{:#}", err);
        if let Err(e) = writeln!(stderr, "[Error] {}", message) {
            warn!("cannot print error: {}", e);
        }
        self.journal.record(&format!("ERROR: {}", message));
    }

    fn prompt(&self) -> String {
        format!(
            "{}@MyShell:{}$ ",
            self.env.get_var("USER").unwrap_or("user"),
            self.env.current_dir.display()
        )
    }

    fn dispatch(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> Result<Flow> {
        let expanded = expand_variables(line, &self.env);
        let tokens = split_into_tokens(&expanded);
        debug!("expanded = {:?}, tokens = {:?}", expanded, tokens);

        let Some(keyword) = tokens.first() else {
            return Ok(Flow::Continue);
        };
        match keyword.as_str() {
            "exit" | "quit" => {
                writeln!(stdout, "Exiting MyShell. Goodbye!")?;
                self.env.should_exit = true;
                Ok(Flow::Exit)
            }
            "run" | "import" => {
                let [_, script, ..] = tokens.as_slice() else {
                    return Err(ShellError::Usage("run <script>").into());
                };
                self.run_script(Path::new(script), stdout, stderr)
            }
            name => {
                match self.commands.get(name) {
                    Some(command) => {
                        command.execute(&tokens, stdout, &mut self.env)?;
                    }
                    None => self.run_external(&expanded, stdout)?,
                }
                Ok(Flow::Continue)
            }
        }
    }

    /// Hand the expanded line to the process runner and print what it captured.
    fn run_external(&self, command_line: &str, stdout: &mut dyn Write) -> Result<()> {
        let output = self.external.run(command_line, &self.env)?;
        stdout.write_all(output.stdout.as_bytes())?;
        if !output.stdout.is_empty() && !output.stdout.ends_with('\n') {
            writeln!(stdout)?;
        }
        if output.status != 0 {
            return Err(ShellError::ExternalStatus {
                status: output.status,
                command: command_line.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Add a non-blank line to the editor history. A failure is only logged.
fn remember_line(line: &str, add: impl FnOnce(&str) -> rustyline::Result<bool>) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    match add(line) {
        Ok(added) => added,
        Err(e) => {
            warn!("cannot add history entry: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::command::ExitCode;
    use crate::external::CommandOutput;
    use anyhow::anyhow;
    use std::cell::RefCell;
    use tempfile::TempDir;

    type Log = Rc<RefCell<Vec<String>>>;

    struct FakeRunner {
        calls: Log,
        reply: Option<CommandOutput>,
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, command_line: &str, _env: &Environment) -> Result<CommandOutput> {
            self.calls.borrow_mut().push(command_line.to_string());
            self.reply
                .clone()
                .ok_or_else(|| anyhow!("Command failed to start: {}", command_line))
        }
    }

    struct MemoryJournal(Log);

    impl Journal for MemoryJournal {
        fn record(&self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    struct EchoChat;

    impl ChatClient for EchoChat {
        fn complete(&self, _credential: &str, model: &str, prompt: &str) -> Result<String> {
            Ok(format!("{} says: {}", model, prompt))
        }
    }

    struct Harness {
        shell: Interpreter,
        calls: Log,
        journal: Log,
        dir: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_reply(Some(CommandOutput {
                stdout: "external output".to_string(),
                status: 0,
            }))
        }

        fn with_reply(reply: Option<CommandOutput>) -> Self {
            let dir = TempDir::new().unwrap();
            let calls = Log::default();
            let journal = Log::default();
            let mut env = Environment::empty(dir.path().to_path_buf());
            env.set_var("SHELL", "MyShell");
            let shell = Interpreter::with_builtins(
                env,
                Box::new(FakeRunner {
                    calls: calls.clone(),
                    reply,
                }),
                Box::new(MemoryJournal(journal.clone())),
                Rc::new(EchoChat),
            );
            Self {
                shell,
                calls,
                journal,
                dir,
            }
        }

        /// Run lines as if typed, returning (stdout, stderr).
        fn lines(&mut self, lines: &[&str]) -> (String, String) {
            let (mut out, mut err) = (Vec::<u8>::new(), Vec::<u8>::new());
            self.shell.execute_lines(lines, &mut out, &mut err);
            (
                String::from_utf8(out).unwrap(),
                String::from_utf8(err).unwrap(),
            )
        }

        fn script(&self, name: &str, body: &str) {
            fs::write(self.dir.path().join(name), body).unwrap();
        }
    }

    #[test]
    fn test_set_then_calc_with_expansion() {
        let mut h = Harness::new();
        let (out, err) = h.lines(&["set x 5", "calc $x + 3"]);
        assert!(out.contains("5 + 3 = 8\n"), "{}", out);
        assert!(err.is_empty());
    }

    #[test]
    fn test_division_by_zero_does_not_stop_session() {
        let mut h = Harness::new();
        let (out, err) = h.lines(&["calc 10 / 0", "echo still here"]);
        assert_eq!(out, "10 / 0 = 0\nstill here\n");
        assert_eq!(err, "[Error] Division by zero\n");
        assert_eq!(h.journal.borrow().as_slice(), ["ERROR: Division by zero"]);
    }

    #[test]
    fn test_undefined_variable_expands_to_empty() {
        let mut h = Harness::new();
        let (out, _) = h.lines(&["echo [$ghost]"]);
        assert_eq!(out, "[]\n");
        assert_eq!(h.shell.env().get_var("ghost"), None);
    }

    #[test]
    fn test_quoted_value_survives_round_trip() {
        let mut h = Harness::new();
        let (out, _) = h.lines(&[r#"set greeting "hello   world""#, r#"echo "<$greeting>""#]);
        assert!(out.ends_with("<hello   world>\n"), "{}", out);
    }

    #[test]
    fn test_write_then_read_through_pipeline() {
        let mut h = Harness::new();
        let (_, err) = h.lines(&["write f.txt hello", "read v f.txt"]);
        assert!(err.is_empty(), "{}", err);
        assert_eq!(h.shell.env().get_var("v"), Some("hello"));
    }

    #[test]
    fn test_rm_missing_path_reports_and_continues() {
        let mut h = Harness::new();
        h.script("keep.txt", "k");
        let (out, err) = h.lines(&["rm nothing_here", "echo after"]);
        assert_eq!(err, "[Error] No such file or directory: nothing_here\n");
        assert_eq!(out, "after\n");
        assert!(h.dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_unknown_keyword_goes_to_runner_expanded() {
        let mut h = Harness::new();
        let (out, err) = h.lines(&["set lvl 5", "frobnicate --level $lvl"]);
        assert_eq!(h.calls.borrow().as_slice(), ["frobnicate --level 5"]);
        assert!(out.ends_with("external output\n"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        let mut h = Harness::new();
        h.lines(&["ECHO hi"]);
        assert_eq!(h.calls.borrow().as_slice(), ["ECHO hi"]);
    }

    #[test]
    fn test_external_failure_shows_output_then_error() {
        let mut h = Harness::with_reply(Some(CommandOutput {
            stdout: "partial\n".to_string(),
            status: 2,
        }));
        let (out, err) = h.lines(&["make all", "echo next"]);
        assert_eq!(out, "partial\nnext\n");
        assert_eq!(err, "[Error] Command exited with status 2: make all\n");
    }

    #[test]
    fn test_external_spawn_failure_is_reported() {
        let mut h = Harness::with_reply(None);
        let (out, err) = h.lines(&["missing-tool", "echo ok"]);
        assert_eq!(out, "ok\n");
        assert_eq!(err, "[Error] Command failed to start: missing-tool\n");
    }

    #[test]
    fn test_usage_error_is_reported() {
        let mut h = Harness::new();
        let (out, err) = h.lines(&["set onlyname"]);
        assert!(out.is_empty());
        assert_eq!(err, "[Error] Usage: set <variable> <value>\n");
        assert!(h.calls.borrow().is_empty());
    }

    #[test]
    fn test_script_skips_blank_and_comment_lines() {
        let mut h = Harness::new();
        h.script(
            "setup.mys",
            "set a 1\n\n   \n# a comment\n   # indented comment\necho first $a\necho second\n",
        );
        let (out, err) = h.lines(&["run setup.mys"]);
        assert!(err.is_empty(), "{}", err);
        assert_eq!(
            out,
            "Running script setup.mys (7 commands)\n\
             Variable a set to: 1\n\
             first 1\n\
             second\n\
             Script execution completed\n"
        );
        assert!(h.calls.borrow().is_empty());
    }

    #[test]
    fn test_import_is_run() {
        let mut h = Harness::new();
        h.script("lib.mys", "set from_lib yes\n");
        h.lines(&["import lib.mys"]);
        assert_eq!(h.shell.env().get_var("from_lib"), Some("yes"));
    }

    #[test]
    fn test_missing_script_is_reported() {
        let mut h = Harness::new();
        let (out, err) = h.lines(&["run nope.mys", "echo alive"]);
        assert_eq!(out, "alive\n");
        assert!(err.starts_with("[Error] Unable to open script file: nope.mys"));
    }

    #[test]
    fn test_run_requires_script_name() {
        let mut h = Harness::new();
        let (_, err) = h.lines(&["run"]);
        assert_eq!(err, "[Error] Usage: run <script>\n");
    }

    #[test]
    fn test_script_cycle_is_rejected() {
        let mut h = Harness::new();
        h.script("a.mys", "echo in a\nrun b.mys\necho back in a\n");
        h.script("b.mys", "run a.mys\necho in b\n");
        let (out, err) = h.lines(&["run a.mys", "echo done"]);
        assert_eq!(err, "[Error] Script is already running: a.mys\n");
        let printed: Vec<&str> = out
            .lines()
            .filter(|l| !l.starts_with("Running") && !l.starts_with("Script"))
            .collect();
        assert_eq!(printed, vec!["in a", "in b", "back in a", "done"]);
    }

    #[test]
    fn test_self_inclusion_is_rejected() {
        let mut h = Harness::new();
        h.script("self.mys", "run self.mys\n");
        let (_, err) = h.lines(&["run self.mys"]);
        assert_eq!(err, "[Error] Script is already running: self.mys\n");
    }

    #[test]
    fn test_script_depth_is_capped() {
        let mut h = Harness::new();
        for i in 0..20 {
            h.script(&format!("s{}.mys", i), &format!("run s{}.mys\n", i + 1));
        }
        h.script("s20.mys", "echo bottom\n");
        let (out, err) = h.lines(&["run s0.mys"]);
        assert_eq!(
            err,
            format!("[Error] Script nesting exceeds {} levels\n", MAX_SCRIPT_DEPTH)
        );
        assert!(!out.contains("bottom"));
        assert_eq!(
            out.matches("Script execution completed").count(),
            MAX_SCRIPT_DEPTH
        );
    }

    #[test]
    fn test_same_script_may_run_twice_in_sequence() {
        let mut h = Harness::new();
        h.script("once.mys", "echo tick\n");
        let (out, err) = h.lines(&["run once.mys", "run once.mys"]);
        assert!(err.is_empty());
        assert_eq!(out.matches("tick").count(), 2);
    }

    #[test]
    fn test_exit_and_quit_end_session() {
        for word in ["exit", "quit"] {
            let mut h = Harness::new();
            let (mut out, mut err) = (Vec::<u8>::new(), Vec::<u8>::new());
            let flow = h.shell.execute_line(word, &mut out, &mut err);
            assert_eq!(flow, Flow::Exit);
            assert!(h.shell.env().should_exit);
            assert_eq!(String::from_utf8(out).unwrap(), "Exiting MyShell. Goodbye!\n");
        }
    }

    #[test]
    fn test_exit_inside_script_stops_everything() {
        let mut h = Harness::new();
        h.script("stop.mys", "echo one\nexit\necho two\n");
        let (mut out, mut err) = (Vec::<u8>::new(), Vec::<u8>::new());
        let flow = h
            .shell
            .execute_lines(&["run stop.mys", "echo three"], &mut out, &mut err);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(flow, Flow::Exit);
        assert!(out.contains("one"));
        assert!(!out.contains("two"));
        assert!(!out.contains("three"));
        assert!(!out.contains("Script execution completed"));
    }

    #[test]
    fn test_blank_and_comment_lines_do_nothing_interactively() {
        let mut h = Harness::new();
        let (out, err) = h.lines(&["", "    ", "# note"]);
        assert!(out.is_empty() && err.is_empty());
        assert!(h.calls.borrow().is_empty());
        assert!(h.journal.borrow().is_empty());
    }

    #[test]
    fn test_custom_command_can_be_registered() {
        struct Shout;

        impl BuiltinCommand for Shout {
            fn names(&self) -> &'static [&'static str] {
                &["shout", "yell"]
            }

            fn usage(&self) -> &'static str {
                "shout <text>"
            }

            fn execute(
                &self,
                tokens: &[String],
                stdout: &mut dyn Write,
                _env: &mut Environment,
            ) -> Result<ExitCode> {
                writeln!(stdout, "{}", tokens[1..].join(" ").to_uppercase())?;
                Ok(0)
            }
        }

        let mut h = Harness::new();
        h.shell.register(Shout);
        let (out, _) = h.lines(&["shout hey", "yell you"]);
        assert_eq!(out, "HEY\nYOU\n");
        assert!(h.calls.borrow().is_empty());
    }

    #[test]
    fn test_ai_uses_credential_set_in_session() {
        let mut h = Harness::new();
        let (out, err) = h.lines(&["ai hi", "set GROQ_API_KEY k", "set AI_MODEL tiny", "ai hi there"]);
        assert_eq!(
            err,
            "[Error] Groq API key not set. Use 'set GROQ_API_KEY your_api_key' to enable AI features.\n"
        );
        assert!(out.contains("tiny says: hi there"));
    }

    #[test]
    fn test_script_start_and_finish_are_journaled() {
        let mut h = Harness::new();
        h.script("j.mys", "calc 1 / 0\n");
        h.lines(&["run j.mys"]);
        let journal = h.journal.borrow();
        assert_eq!(journal.len(), 3);
        assert!(journal[0].starts_with("Running script "));
        assert_eq!(journal[1], "ERROR: Division by zero");
        assert_eq!(journal[2], "Finished script j.mys");
    }

    #[test]
    fn test_history_failure_is_not_fatal() {
        let failed = remember_line("ls", |_| {
            Err(ReadlineError::Io(io::Error::other("history is full")))
        });
        assert!(!failed);
        assert!(remember_line("ls", |l| Ok(l == "ls")));
        assert!(!remember_line("   ", |_| panic!("blank lines are not remembered")));
    }

    #[test]
    fn test_echo_marks_undefined_names_that_survive_expansion() {
        let mut h = Harness::new();
        h.script("ref.txt", "$ghost");
        let (out, err) = h.lines(&[
            "read v ref.txt",
            "echo $v",
            r"echo \$ghost",
            r#"echo "$ghost""#,
            "echo $ghost",
        ]);
        assert!(err.is_empty(), "{}", err);
        assert_eq!(
            out,
            "Read file content into variable v\n[Undefined: $ghost]\n\\\n\n\n"
        );
    }
}
