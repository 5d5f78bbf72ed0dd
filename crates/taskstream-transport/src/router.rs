//! HTTP API: health check, task creation and the stream endpoint.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use taskstream_session::{RegistryError, TaskManager};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    protocol::{CreateTaskRequest, ErrorResponse, HealthResponse, TaskResponse},
    websocket::ws_handler,
};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TaskManager>,
}

impl AppState {
    #[must_use]
    pub const fn new(manager: Arc<TaskManager>) -> Self {
        Self { manager }
    }
}

/// API error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Registry(RegistryError::TaskNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Registry(RegistryError::DuplicateTask(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the application router.
///
/// # Example
/// ```ignore
/// let app = create_router(AppState::new(manager));
/// axum::serve(listener, app).await?;
/// ```
pub fn create_router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/tasks", post(create_task))
        .route("/ws/{task_id}", get(ws_handler));

    Router::new()
        .route("/", get(health_check))
        .nest("/api/v1", api_v1)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// POST /api/v1/tasks
///
/// Registers the task without starting it; the run begins when a stream
/// connects.
async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let session = state.manager.create_task(req.prompt)?;
    Ok(Json(TaskResponse {
        task_id: session.task_id().clone(),
        prompt: session.prompt().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use taskstream_core::{ModelConfig, TaskId};
    use taskstream_executor::ScriptedAgentLoop;
    use tower::ServiceExt;

    use super::*;

    fn test_state() -> AppState {
        let manager = TaskManager::new(Arc::new(ScriptedAgentLoop::new()), ModelConfig::default());
        AppState::new(Arc::new(manager))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"status": "ok", "message": "Welcome to the Agent API!"})
        );
    }

    #[tokio::test]
    async fn test_create_task_registers_session() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::post("/api/v1/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"prompt": "list files in /tmp"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["prompt"], "list files in /tmp");
        let task_id = json["task_id"].as_str().unwrap();
        assert!(task_id.starts_with("task_"));
        assert!(state.manager.registry().contains(task_id));
    }

    #[tokio::test]
    async fn test_create_task_rejects_missing_prompt() {
        let state = test_state();
        let app = create_router(state.clone());

        let response = app
            .oneshot(
                Request::post("/api/v1/tasks")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(state.manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::get("/")
                    .header("origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }

    #[test]
    fn test_api_error_status() {
        let response =
            ApiError::from(RegistryError::DuplicateTask(TaskId::from("task_1"))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response =
            ApiError::from(RegistryError::TaskNotFound(TaskId::from("task_1"))).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
