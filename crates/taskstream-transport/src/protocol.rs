//! Wire types for the HTTP API and stream close codes.
//!
//! Stream frames themselves are JSON-encoded
//! [`ProtocolMessage`](taskstream_core::ProtocolMessage)s.

use serde::{Deserialize, Serialize};
use taskstream_core::TaskId;

/// Close code sent when the requested task does not exist.
pub const CLOSE_TASK_NOT_FOUND: u16 = 4004;

/// Close code sent when another connection is already streaming the task.
pub const CLOSE_ALREADY_STREAMING: u16 = 4009;

/// Close reason paired with [`CLOSE_TASK_NOT_FOUND`].
pub const REASON_TASK_NOT_FOUND: &str = "Task not found";

/// Close reason paired with [`CLOSE_ALREADY_STREAMING`].
pub const REASON_ALREADY_STREAMING: &str = "Task already streaming";

/// Body of `POST /api/v1/tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub prompt: String,
}

/// Response to task creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_id: TaskId,
    pub prompt: String,
}

/// Liveness payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: "Welcome to the Agent API!".to_string(),
        }
    }
}

/// Error body for failed API requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
