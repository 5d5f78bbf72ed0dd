//! HTTP API and streaming gateway for agent tasks.
//!
//! Provides:
//! - Wire types and close codes
//! - Router with task creation and health check (feature: websocket)
//! - WebSocket gateway that drives a task per connection (feature: websocket)

pub mod protocol;

#[cfg(feature = "websocket")]
pub mod router;
#[cfg(feature = "websocket")]
pub mod websocket;

pub use protocol::{CreateTaskRequest, ErrorResponse, HealthResponse, TaskResponse};
#[cfg(feature = "websocket")]
pub use router::{ApiError, AppState, create_router};
#[cfg(feature = "websocket")]
pub use websocket::{StreamOutcome, stream_task};
