//! Deterministic agent loop replaying a fixed script.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;
use taskstream_core::{
    AgentCallbacks, AgentLoop, AgentLoopError, ContentBlock, ConversationMessage,
    ConversationRole, ModelConfig, ToolResult,
};
use tokio::sync::Notify;

/// One step of a script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit a content block through `on_agent_output`.
    Output(ContentBlock),
    /// Emit a tool result through `on_tool_result`.
    Tool { tool_id: String, result: ToolResult },
    /// Sleep before the next step.
    Sleep(Duration),
    /// Fail the run with this message.
    Fail(String),
    /// Never complete. The run ends only when cancelled.
    Hang,
}

#[derive(Default)]
struct RunSignals {
    cancelled: AtomicBool,
    cancel_notify: Notify,
}

/// Marks the run cancelled unless disarmed before drop.
struct CancelWatch<'a> {
    signals: &'a RunSignals,
    armed: bool,
}

impl Drop for CancelWatch<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.signals.cancelled.store(true, Ordering::SeqCst);
            self.signals.cancel_notify.notify_one();
        }
    }
}

/// Agent loop that replays a script of steps for every run.
///
/// On success the returned history is the input plus one assistant message
/// holding every emitted content block.
#[derive(Clone, Default)]
pub struct ScriptedAgentLoop {
    steps: Vec<ScriptStep>,
    runs: Arc<AtomicUsize>,
    signals: Arc<RunSignals>,
}

impl ScriptedAgentLoop {
    /// Empty script: the run succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    #[must_use]
    pub fn step(mut self, step: ScriptStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Append an agent output step.
    #[must_use]
    pub fn output(self, block: ContentBlock) -> Self {
        self.step(ScriptStep::Output(block))
    }

    /// Append a tool result step.
    #[must_use]
    pub fn tool(self, tool_id: impl Into<String>, result: ToolResult) -> Self {
        self.step(ScriptStep::Tool {
            tool_id: tool_id.into(),
            result,
        })
    }

    /// Append a sleep.
    #[must_use]
    pub fn sleep(self, duration: Duration) -> Self {
        self.step(ScriptStep::Sleep(duration))
    }

    /// Append a failure.
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.step(ScriptStep::Fail(message.into()))
    }

    /// Append a step that never completes.
    #[must_use]
    pub fn hang(self) -> Self {
        self.step(ScriptStep::Hang)
    }

    /// A short computer-use session, paced for watching in a browser.
    #[must_use]
    pub fn demo() -> Self {
        let pause = Duration::from_millis(400);
        Self::new()
            .output(ContentBlock::Thinking {
                thinking: "I should look at the directory first.".into(),
                signature: None,
            })
            .sleep(pause)
            .output(ContentBlock::ToolUse {
                id: "toolu_demo_1".into(),
                name: "bash".into(),
                input: json!({ "command": "ls /tmp" }),
            })
            .sleep(pause)
            .tool("toolu_demo_1", ToolResult::output("demo.txt\nnotes.md"))
            .sleep(pause)
            .output(ContentBlock::text("There are two files in /tmp."))
    }

    /// Number of runs started so far.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Whether a run was dropped before it completed.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.signals.cancelled.load(Ordering::SeqCst)
    }

    /// Wait until a run is dropped before completing.
    pub async fn cancelled(&self) {
        if self.was_cancelled() {
            return;
        }
        self.signals.cancel_notify.notified().await;
    }
}

#[async_trait]
impl AgentLoop for ScriptedAgentLoop {
    async fn run(
        &self,
        mut conversation: Vec<ConversationMessage>,
        _config: &ModelConfig,
        callbacks: Arc<dyn AgentCallbacks>,
    ) -> Result<Vec<ConversationMessage>, AgentLoopError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let mut watch = CancelWatch {
            signals: &self.signals,
            armed: true,
        };

        let mut emitted = Vec::new();
        let result = async {
            for step in &self.steps {
                match step {
                    ScriptStep::Output(block) => {
                        emitted.push(serde_json::to_value(block).unwrap_or_default());
                        callbacks.on_agent_output(block.clone());
                    }
                    ScriptStep::Tool { tool_id, result } => {
                        callbacks.on_tool_result(result.clone(), tool_id);
                    }
                    ScriptStep::Sleep(duration) => tokio::time::sleep(*duration).await,
                    ScriptStep::Fail(message) => return Err(AgentLoopError::Agent(message.clone())),
                    ScriptStep::Hang => std::future::pending::<()>().await,
                }
            }
            Ok(())
        }
        .await;
        watch.armed = false;

        result?;
        if !emitted.is_empty() {
            conversation.push(ConversationMessage {
                role: ConversationRole::Assistant,
                content: emitted,
            });
        }
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl AgentCallbacks for Collect {
        fn on_tool_result(&self, _result: ToolResult, tool_id: &str) {
            self.0.lock().unwrap().push(format!("tool:{tool_id}"));
        }

        fn on_agent_output(&self, _block: ContentBlock) {
            self.0.lock().unwrap().push("agent".into());
        }
    }

    #[tokio::test]
    async fn test_replays_steps_and_extends_history() {
        let agent = ScriptedAgentLoop::new()
            .tool("t1", ToolResult::output("a"))
            .output(ContentBlock::text("b"))
            .tool("t2", ToolResult::output("c"));
        let callbacks = Arc::new(Collect::default());

        let history = assert_ok!(
            agent
                .run(
                    vec![ConversationMessage::user_text("go")],
                    &ModelConfig::default(),
                    callbacks.clone(),
                )
                .await
        );

        assert_eq!(history.len(), 2);
        assert_eq!(history[1].role, ConversationRole::Assistant);
        assert_eq!(*callbacks.0.lock().unwrap(), vec!["tool:t1", "agent", "tool:t2"]);
        assert_eq!(agent.runs(), 1);
        assert!(!agent.was_cancelled());
    }

    #[tokio::test]
    async fn test_failure_stops_script() {
        let agent = ScriptedAgentLoop::new()
            .fail("boom")
            .output(ContentBlock::text("never"));
        let callbacks = Arc::new(Collect::default());

        let err = assert_err!(
            agent
                .run(Vec::new(), &ModelConfig::default(), callbacks.clone())
                .await
        );

        assert_eq!(err.to_string(), "boom");
        assert!(callbacks.0.lock().unwrap().is_empty());
        assert!(!agent.was_cancelled());
    }

    #[tokio::test]
    async fn test_dropping_hung_run_is_observed() {
        let agent = ScriptedAgentLoop::new().hang();
        let handle = {
            let agent = agent.clone();
            tokio::spawn(async move {
                agent
                    .run(Vec::new(), &ModelConfig::default(), Arc::new(Collect::default()))
                    .await
            })
        };

        while agent.runs() == 0 {
            tokio::task::yield_now().await;
        }
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        tokio::time::timeout(Duration::from_secs(1), agent.cancelled())
            .await
            .unwrap();
        assert!(agent.was_cancelled());
    }
}
