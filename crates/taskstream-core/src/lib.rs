//! Core abstractions for streaming agent task sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `ProtocolMessage` - Role-tagged message streamed to clients
//! - `MessageQueue` - Non-blocking FIFO from agent callbacks to a stream
//! - `ModelConfig` - Sampling settings for each run
//! - `AgentLoop` and `AgentCallbacks` traits

pub mod context;
pub mod message;
pub mod queue;
pub mod traits;

pub use context::{ApiProvider, ModelConfig};
pub use message::{
    ContentBlock, ConversationMessage, ConversationRole, ProtocolMessage, ToolResult,
};
pub use queue::{MessageQueue, MessageStream};
pub use traits::{AgentCallbacks, AgentLoop, AgentLoopError, TaskId};
