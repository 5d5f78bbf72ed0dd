//! Task sessions and their registry.
//!
//! Provides:
//! - `TaskSession` - Conversation state and callback-to-queue bridge
//! - `SessionRegistry` - Live sessions by task id
//! - `TaskManager` - Create and register sessions

pub mod manager;
pub mod registry;
pub mod session;

pub use manager::TaskManager;
pub use registry::{RegistryError, SessionRegistry};
pub use session::TaskSession;
