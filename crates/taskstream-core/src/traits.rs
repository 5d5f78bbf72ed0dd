//! Agent loop contract and task identifiers.

use std::{borrow::Borrow, fmt, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    ModelConfig,
    message::{ContentBlock, ConversationMessage, ToolResult},
};

/// Prefix of every generated task identifier.
pub const TASK_ID_PREFIX: &str = "task_";

/// Task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Generate a fresh, unique identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("{TASK_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for TaskId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Sink for events raised while the agent loop runs.
///
/// Both methods are called inline from the loop's own execution context.
/// Implementations must return promptly: no blocking, no awaiting.
pub trait AgentCallbacks: Send + Sync {
    /// A tool finished executing.
    fn on_tool_result(&self, result: ToolResult, tool_id: &str);

    /// The model produced a content block (text, tool use, thinking).
    fn on_agent_output(&self, block: ContentBlock);
}

/// Agent loop error.
#[derive(Debug, Error)]
pub enum AgentLoopError {
    /// Failure reported by the agent itself.
    #[error("{0}")]
    Agent(String),
    #[error("Spawn failed: {0}")]
    Spawn(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Agent exited without a result ({0})")]
    NoResult(String),
}

/// An external multi-step reasoning and tool-execution loop.
///
/// Resolves with the updated conversation history. May be cancelled at any
/// await point by dropping the returned future.
#[async_trait]
pub trait AgentLoop: Send + Sync {
    /// Run the loop to completion over `conversation`.
    async fn run(
        &self,
        conversation: Vec<ConversationMessage>,
        config: &ModelConfig,
        callbacks: Arc<dyn AgentCallbacks>,
    ) -> Result<Vec<ConversationMessage>, AgentLoopError>;
}
