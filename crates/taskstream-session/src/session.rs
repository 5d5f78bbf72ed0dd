//! Task session: conversation state plus the callback-to-queue bridge.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use taskstream_core::{
    AgentCallbacks, AgentLoop, ContentBlock, ConversationMessage, MessageQueue, ModelConfig,
    ProtocolMessage, TaskId, ToolResult,
};
use tracing::{debug, info, warn};

/// State for one task, from creation until its stream terminates.
pub struct TaskSession {
    task_id: TaskId,
    prompt: String,
    conversation: Mutex<Vec<ConversationMessage>>,
    queue: MessageQueue,
    agent: Arc<dyn AgentLoop>,
    config: Arc<ModelConfig>,
}

impl TaskSession {
    /// Create a session for `prompt` with a fresh task id.
    ///
    /// The conversation is seeded with the prompt as a user message.
    /// Nothing runs until [`TaskSession::run`] is called.
    #[must_use]
    pub fn create(
        prompt: impl Into<String>,
        agent: Arc<dyn AgentLoop>,
        config: Arc<ModelConfig>,
    ) -> Arc<Self> {
        Self::with_id(TaskId::generate(), prompt, agent, config)
    }

    /// Like [`TaskSession::create`] with a caller-chosen id.
    #[must_use]
    pub fn with_id(
        task_id: TaskId,
        prompt: impl Into<String>,
        agent: Arc<dyn AgentLoop>,
        config: Arc<ModelConfig>,
    ) -> Arc<Self> {
        let prompt = prompt.into();
        Arc::new(Self {
            task_id,
            conversation: Mutex::new(vec![ConversationMessage::user_text(&prompt)]),
            prompt,
            queue: MessageQueue::new(),
            agent,
            config,
        })
    }

    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub const fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// Snapshot of the conversation history.
    #[must_use]
    pub fn conversation(&self) -> Vec<ConversationMessage> {
        self.lock_conversation().clone()
    }

    fn lock_conversation(&self) -> MutexGuard<'_, Vec<ConversationMessage>> {
        self.conversation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the agent loop once, streaming its events into the queue.
    ///
    /// Never fails: an agent error becomes a system message. The terminal
    /// message is always the last thing enqueued, including when this
    /// future is dropped mid-run.
    pub async fn run(self: Arc<Self>) {
        let _finish = self.queue.finish_guard();
        self.queue.push_started();
        info!(task_id = %self.task_id, "Agent run started");

        let callbacks: Arc<dyn AgentCallbacks> = self.clone();
        match self
            .agent
            .run(self.conversation(), &self.config, callbacks)
            .await
        {
            Ok(history) => {
                *self.lock_conversation() = history;
                info!(task_id = %self.task_id, "Agent run completed");
            }
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "Agent run failed");
                self.queue.push(ProtocolMessage::agent_error(&e));
            }
        }
    }
}

impl AgentCallbacks for TaskSession {
    fn on_tool_result(&self, result: ToolResult, tool_id: &str) {
        if result.base64_image.is_some() && result.decode_image().is_none() {
            warn!(task_id = %self.task_id, tool_id, "Tool result image is not valid base64");
        }
        debug!(
            task_id = %self.task_id,
            tool_id,
            failed = result.error.is_some(),
            "Tool result"
        );
        self.queue.push(ProtocolMessage::tool(result, tool_id));
    }

    fn on_agent_output(&self, block: ContentBlock) {
        debug!(task_id = %self.task_id, "Agent output");
        self.queue.push(ProtocolMessage::assistant(block));
    }
}
