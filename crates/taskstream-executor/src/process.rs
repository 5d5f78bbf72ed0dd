//! Agent loop running as a child process speaking JSON lines over stdio.
//!
//! The child receives one request line on stdin:
//! `{"messages": [...], "config": {...}}`, with the API key in
//! `ANTHROPIC_API_KEY`. It then writes events to stdout, one per line,
//! tagged by `type`: `agent_output`, `tool_result`, `api_response`,
//! and finally `result` or `error`.

use std::{path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskstream_core::{
    AgentCallbacks, AgentLoop, AgentLoopError, ContentBlock, ConversationMessage, ModelConfig,
    ToolResult,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, Command},
};

use crate::command::CommandBuilder;

/// Environment variable carrying the API key to the child.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// How long to wait for the child to exit after its final event.
const EXIT_GRACE: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct RunRequest<'a> {
    messages: &'a [ConversationMessage],
    config: &'a ModelConfig,
}

/// Event written by the child on stdout.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AgentEvent {
    AgentOutput {
        content: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_id: String,
        #[serde(default)]
        result: Value,
    },
    ApiResponse,
    Result {
        messages: Vec<ConversationMessage>,
    },
    Error {
        message: String,
    },
}

/// How the child ended its event stream.
enum Outcome {
    Finished(Vec<ConversationMessage>),
    Failed(String),
    Eof,
}

/// Agent loop backed by an external process.
#[derive(Debug, Clone)]
pub struct ProcessAgentLoop {
    command: CommandBuilder,
    working_dir: Option<PathBuf>,
}

impl ProcessAgentLoop {
    /// Create a loop that runs `command` for every task.
    #[must_use]
    pub const fn new(command: CommandBuilder) -> Self {
        Self {
            command,
            working_dir: None,
        }
    }

    /// Run the child in `dir`.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    async fn spawn(&self, config: &ModelConfig) -> Result<Child, AgentLoopError> {
        let (program, args) = self
            .command
            .build()
            .map_err(|e| AgentLoopError::Spawn(e.to_string()))?
            .into_resolved()
            .await
            .map_err(|e| AgentLoopError::Spawn(e.to_string()))?;

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        if let Some(key) = &config.api_key {
            cmd.env(API_KEY_ENV, key);
        }

        tracing::debug!(program = %program.display(), ?args, "Spawning agent process");
        cmd.spawn()
            .map_err(|e| AgentLoopError::Spawn(format!("{}: {e}", program.display())))
    }
}

#[async_trait]
impl AgentLoop for ProcessAgentLoop {
    async fn run(
        &self,
        conversation: Vec<ConversationMessage>,
        config: &ModelConfig,
        callbacks: Arc<dyn AgentCallbacks>,
    ) -> Result<Vec<ConversationMessage>, AgentLoopError> {
        let mut child = self.spawn(config).await?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentLoopError::Protocol("stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentLoopError::Protocol("stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_stderr(stderr));
        }

        let request = RunRequest {
            messages: &conversation,
            config,
        };
        let mut line =
            serde_json::to_string(&request).map_err(|e| AgentLoopError::Protocol(e.to_string()))?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        drop(stdin);

        let outcome = read_events(stdout, callbacks.as_ref()).await?;

        match outcome {
            Outcome::Finished(messages) => {
                reap(&mut child).await;
                Ok(messages)
            }
            Outcome::Failed(message) => {
                reap(&mut child).await;
                Err(AgentLoopError::Agent(message))
            }
            Outcome::Eof => {
                if let Ok(status) = tokio::time::timeout(EXIT_GRACE, child.wait()).await {
                    return Err(AgentLoopError::NoResult(status?.to_string()));
                }
                tracing::warn!("Agent process closed stdout but kept running, killing it");
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill agent process: {e}");
                }
                Err(AgentLoopError::NoResult(
                    "stdout closed while the process kept running".into(),
                ))
            }
        }
    }
}

async fn read_events<R>(
    stdout: R,
    callbacks: &dyn AgentCallbacks,
) -> Result<Outcome, AgentLoopError>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stdout);
    let mut buffer = Vec::new();

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            return Ok(Outcome::Eof);
        }
        let line = match std::str::from_utf8(&buffer) {
            Ok(line) => line.trim(),
            Err(e) => {
                tracing::warn!("Ignoring agent line that is not UTF-8: {e}");
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<AgentEvent>(line) {
            Ok(AgentEvent::AgentOutput { content }) => {
                match serde_json::from_value::<ContentBlock>(content) {
                    Ok(block) => callbacks.on_agent_output(block),
                    Err(e) => tracing::warn!("Skipping unrecognised content block: {e}"),
                }
            }
            Ok(AgentEvent::ToolResult { tool_id, result }) => {
                callbacks.on_tool_result(ToolResult::from_value(&result), &tool_id);
            }
            Ok(AgentEvent::ApiResponse) => tracing::trace!("Agent API response"),
            Ok(AgentEvent::Result { messages }) => return Ok(Outcome::Finished(messages)),
            Ok(AgentEvent::Error { message }) => return Ok(Outcome::Failed(message)),
            Err(e) => tracing::warn!("Ignoring malformed agent line: {e}"),
        }
    }
}

async fn forward_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::debug!(target: "taskstream::agent", "{line}");
    }
}

async fn reap(child: &mut Child) {
    match tokio::time::timeout(EXIT_GRACE, child.wait()).await {
        Ok(Ok(status)) if !status.success() => {
            tracing::warn!(%status, "Agent process exited with failure after final event");
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::warn!("Failed to wait for agent process: {e}"),
        Err(_) => {
            tracing::warn!("Agent process did not exit, killing it");
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill agent process: {e}");
            }
        }
    }
}
