//! AI assistant: the chat-completion collaborator and the commands built on it.
//!
//! The interpreter only ever exchanges text with the collaborator: a prompt and a
//! model name go in, one response string comes out. HTTP, authentication and the
//! JSON shape are confined to [`GroqClient`].

use crate::command::{BuiltinCommand, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Something that can answer a prompt.
pub trait ChatClient {
    fn complete(&self, credential: &str, model: &str, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

/// Extract the answer from a chat-completions response body.
pub fn parse_chat_response(body: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Failed to parse Groq API response")?;
    if let Some(choice) = response.choices.into_iter().next() {
        return Ok(choice.message.content);
    }
    match response.error {
        Some(error) => Err(anyhow!("API Error: {}", error.message)),
        None => Err(anyhow!("Error parsing response from Groq API")),
    }
}

/// Client for the Groq OpenAI-compatible chat endpoint.
pub struct GroqClient {
    http: reqwest::blocking::Client,
    url: String,
}

impl GroqClient {
    pub fn new() -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            url: GROQ_CHAT_URL.to_string(),
        })
    }
}

impl ChatClient for GroqClient {
    fn complete(&self, credential: &str, model: &str, prompt: &str) -> Result<String> {
        if credential.is_empty() {
            return Err(ShellError::MissingCredential.into());
        }
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.7,
            max_tokens: 1024,
        };
        debug!("chat request to {} with model {}", self.url, model);
        // Error bodies carry the message we want to show, so the status is not checked.
        let body = self
            .http
            .post(&self.url)
            .bearer_auth(credential)
            .json(&request)
            .send()
            .context("Groq API request failed")?
            .text()
            .context("Groq API request failed")?;
        parse_chat_response(&body)
    }
}

/// Models known to work with the Groq endpoint.
const KNOWN_MODELS: &[(&str, &str)] = &[
    ("llama3-70b-8192", "Llama 3 70B (default)"),
    ("llama3-8b-8192", "Llama 3 8B (faster)"),
    ("mixtral-8x7b-32768", "Mixtral 8x7B"),
    ("gemma-7b-it", "Google Gemma 7B"),
];

/// How a particular AI command turns its tokens into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiTask {
    /// `ai <prompt...>`
    Ask,
    /// `aicode <language> <description...>`
    Code,
    /// `aiexplain <file>`
    Explain,
    /// `aifix <file>`
    Fix,
    /// `aicomplete <language> <code...>`
    Complete,
}

impl AiTask {
    fn usage(self) -> &'static str {
        match self {
            AiTask::Ask => "ai <prompt>",
            AiTask::Code => "aicode <language> <description>",
            AiTask::Explain => "aiexplain <file>",
            AiTask::Fix => "aifix <file>",
            AiTask::Complete => "aicomplete <language> \"<partial code>\"",
        }
    }

    /// Build the prompt text, reading the named file for the file-based tasks.
    fn prompt(self, tokens: &[String], env: &Environment) -> Result<String> {
        let usage = || ShellError::Usage(self.usage());
        match self {
            AiTask::Ask => match tokens {
                [_, _, ..] => Ok(tokens[1..].join(" ")),
                _ => Err(usage().into()),
            },
            AiTask::Code => match tokens {
                [_, language, _, ..] => Ok(format!(
                    "Write a {} program that {}. Provide only the code without explanations.",
                    language,
                    tokens[2..].join(" ")
                )),
                _ => Err(usage().into()),
            },
            AiTask::Complete => match tokens {
                [_, language, _, ..] => Ok(format!(
                    "Complete the following {} code:\n\n{}\n\nProvide only the completed code.",
                    language,
                    tokens[2..].join(" ")
                )),
                _ => Err(usage().into()),
            },
            AiTask::Explain | AiTask::Fix => {
                let [_, file, ..] = tokens else {
                    return Err(usage().into());
                };
                let code = fs::read_to_string(env.resolve(file))
                    .with_context(|| format!("Could not read file: {}", file))?;
                Ok(if self == AiTask::Explain {
                    format!("Explain the following code in detail:\n\n{}", code)
                } else {
                    format!(
                        "Fix errors and improve the following code:\n\n{}\n\nPlease provide only the corrected code without explanations.",
                        code
                    )
                })
            }
        }
    }
}

/// One of the prompt-sending AI commands.
pub struct AiCommand {
    task: AiTask,
    client: Rc<dyn ChatClient>,
}

impl AiCommand {
    pub fn new(task: AiTask, client: Rc<dyn ChatClient>) -> Self {
        Self { task, client }
    }

    /// Every AI command, all sharing `client`.
    pub fn all(client: Rc<dyn ChatClient>) -> Vec<Self> {
        [
            AiTask::Ask,
            AiTask::Code,
            AiTask::Explain,
            AiTask::Fix,
            AiTask::Complete,
        ]
        .into_iter()
        .map(|task| Self::new(task, Rc::clone(&client)))
        .collect()
    }
}

impl BuiltinCommand for AiCommand {
    fn names(&self) -> &'static [&'static str] {
        match self.task {
            AiTask::Ask => &["ai"],
            AiTask::Code => &["aicode"],
            AiTask::Explain => &["aiexplain"],
            AiTask::Fix => &["aifix"],
            AiTask::Complete => &["aicomplete"],
        }
    }

    fn usage(&self) -> &'static str {
        self.task.usage()
    }

    fn execute(
        &self,
        tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let prompt = self.task.prompt(tokens, env)?;
        let credential = env.ai_key.as_deref().ok_or(ShellError::MissingCredential)?;
        debug!("{}: sending {} byte prompt", tokens[0], prompt.len());

        writeln!(stdout, "Asking AI...")?;
        let answer = self.client.complete(credential, env.ai_model(), &prompt)?;
        writeln!(stdout, "\n{}\n", answer)?;
        Ok(0)
    }
}

/// List the known model names.
pub struct AiModels;

impl BuiltinCommand for AiModels {
    fn names(&self) -> &'static [&'static str] {
        &["aimodels"]
    }

    fn usage(&self) -> &'static str {
        "aimodels"
    }

    fn execute(
        &self,
        _tokens: &[String],
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "\nAvailable Groq AI Models:")?;
        writeln!(stdout, "---------------------")?;
        for (name, description) in KNOWN_MODELS {
            writeln!(stdout, "{:<20}- {}", name, description)?;
        }
        writeln!(stdout, "\nCurrent model: {}", env.ai_model())?;
        writeln!(stdout, "To change model: set AI_MODEL model_name")?;
        Ok(0)
    }
}
