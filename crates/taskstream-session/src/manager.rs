//! Task manager: creates sessions and registers them.

use std::sync::Arc;

use taskstream_core::{AgentLoop, ModelConfig};
use tracing::info;

use crate::{RegistryError, SessionRegistry, TaskSession};

/// Creates task sessions bound to one agent loop and model configuration.
pub struct TaskManager {
    registry: Arc<SessionRegistry>,
    agent: Arc<dyn AgentLoop>,
    config: Arc<ModelConfig>,
}

impl TaskManager {
    /// Create a manager with its own, empty registry.
    #[must_use]
    pub fn new(agent: Arc<dyn AgentLoop>, config: ModelConfig) -> Self {
        Self::with_registry(Arc::new(SessionRegistry::new()), agent, config)
    }

    /// Create a manager over an existing registry.
    #[must_use]
    pub fn with_registry(
        registry: Arc<SessionRegistry>,
        agent: Arc<dyn AgentLoop>,
        config: ModelConfig,
    ) -> Self {
        Self {
            registry,
            agent,
            config: Arc::new(config),
        }
    }

    /// Registry shared with the streaming gateway.
    #[must_use]
    pub const fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Create and register a session for `prompt`. Does not start it.
    ///
    /// # Errors
    /// Returns `DuplicateTask` on an id collision.
    pub fn create_task(
        &self,
        prompt: impl Into<String>,
    ) -> Result<Arc<TaskSession>, RegistryError> {
        let session = TaskSession::create(
            prompt,
            Arc::clone(&self.agent),
            Arc::clone(&self.config),
        );
        self.registry.register(Arc::clone(&session))?;

        info!(task_id = %session.task_id(), "Task created, awaiting stream connection");
        Ok(session)
    }
}
