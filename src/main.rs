use myshell::Interpreter;
use myshell::config::{Args, Config};
use myshell::journal::Journal;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

fn print_banner(shell: &Interpreter) {
    println!("==========================================================");
    println!("                 MyShell v{}", env!("CARGO_PKG_VERSION"));
    println!("==========================================================");
    println!("Type 'help' for available commands");
    if shell.env().ai_key.is_some() {
        println!("Groq AI API enabled");
    } else {
        println!(
            "Groq AI API not configured. Use 'set GROQ_API_KEY your_api_key' to enable AI features."
        );
    }
    println!();
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Args = argh::from_env();
    let startup_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config = Config::resolve(args, &startup_dir);
    log::debug!("config = {:?}", config);

    let mut shell = match Interpreter::from_config(&config) {
        Ok(shell) => shell,
        Err(e) => {
            eprintln!("[Error] {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    shell.journal().record("MyShell started");

    match &config.script {
        Some(script) => {
            println!("Running script file: {}", script.display());
            match shell.run_script(script, &mut io::stdout(), &mut io::stderr()) {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    shell.report(&e, &mut io::stderr());
                    ExitCode::FAILURE
                }
            }
        }
        None => {
            if config.banner {
                print_banner(&shell);
            }
            if let Err(e) = shell.repl(config.history_file.as_deref()) {
                eprintln!("[Error] {}", e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
    }
}
