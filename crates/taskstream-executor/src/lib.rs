//! Agent loop adapters.
//!
//! Provides:
//! - `ProcessAgentLoop` - external sampling loop over JSON-lines stdio
//! - `ScriptedAgentLoop` - deterministic replay for demos and tests
//! - Command building utilities

pub mod command;
pub mod process;
pub mod scripted;

pub use command::{CommandBuildError, CommandBuilder, CommandParts};
pub use process::ProcessAgentLoop;
pub use scripted::{ScriptStep, ScriptedAgentLoop};
