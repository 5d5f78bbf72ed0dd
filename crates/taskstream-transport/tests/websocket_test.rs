//! End-to-end tests: real listener, real WebSocket client.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{body::Body, http::Request};
use futures::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use taskstream_core::{ContentBlock, ModelConfig, ToolResult};
use taskstream_executor::ScriptedAgentLoop;
use taskstream_session::TaskManager;
use taskstream_transport::{AppState, create_router};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, protocol::frame::coding::CloseCode},
};
use tower::ServiceExt;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_server(agent: ScriptedAgentLoop) -> (SocketAddr, AppState) {
    let manager = TaskManager::new(Arc::new(agent), ModelConfig::default());
    let state = AppState::new(Arc::new(manager));
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(addr: SocketAddr, task_id: &str) -> Client {
    let url = format!("ws://{addr}/api/v1/ws/{task_id}");
    let (socket, _) = connect_async(url).await.unwrap();
    socket
}

async fn next_json(client: &mut Client) -> Value {
    match client.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(&text).unwrap(),
        other => panic!("expected a text frame, got {other:?}"),
    }
}

async fn next_close(client: &mut Client) -> (u16, String) {
    match client.next().await {
        Some(Ok(Message::Close(Some(frame)))) => {
            (u16::from(frame.code), frame.reason.as_str().to_owned())
        }
        other => panic!("expected a close frame, got {other:?}"),
    }
}

async fn wait_until_removed(state: &AppState, task_id: &str) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.manager.registry().contains(task_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task was never removed from the registry");
}

#[tokio::test]
async fn test_create_then_stream_to_completion() {
    let agent = ScriptedAgentLoop::new()
        .output(ContentBlock::text("Looking at /tmp"))
        .tool("toolu_1", ToolResult::output("a.txt"));
    let (addr, state) = spawn_server(agent).await;

    let response = create_router(state.clone())
        .oneshot(
            Request::post("/api/v1/tasks")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"prompt": "list files in /tmp"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let created: Value = serde_json::from_slice(&body).unwrap();
    let task_id = created["task_id"].as_str().unwrap().to_string();

    let mut client = connect(addr, &task_id).await;

    assert_eq!(
        next_json(&mut client).await,
        json!({"role": "system", "content": "Agent process started.", "terminal": false})
    );
    assert_eq!(
        next_json(&mut client).await,
        json!({"role": "assistant", "content": {"type": "text", "text": "Looking at /tmp"}})
    );
    let tool = next_json(&mut client).await;
    assert_eq!(tool["role"], "tool");
    assert_eq!(tool["tool_id"], "toolu_1");
    assert_eq!(tool["content"]["output"], "a.txt");
    assert_eq!(
        next_json(&mut client).await,
        json!({"role": "system", "content": "Agent process finished.", "terminal": true})
    );

    let (code, _) = next_close(&mut client).await;
    assert_eq!(code, u16::from(CloseCode::Normal));
    wait_until_removed(&state, &task_id).await;
}

#[tokio::test]
async fn test_unknown_task_is_rejected() {
    let (addr, _state) = spawn_server(ScriptedAgentLoop::new()).await;

    let mut client = connect(addr, "task_does_not_exist").await;

    assert_eq!(
        next_close(&mut client).await,
        (4004, "Task not found".to_string())
    );
}

#[tokio::test]
async fn test_disconnect_cancels_run() {
    let agent = ScriptedAgentLoop::new()
        .output(ContentBlock::text("working"))
        .hang();
    let (addr, state) = spawn_server(agent.clone()).await;
    let task_id = state
        .manager
        .create_task("open the browser")
        .unwrap()
        .task_id()
        .to_string();

    let mut client = connect(addr, &task_id).await;
    assert_eq!(next_json(&mut client).await["content"], "Agent process started.");
    assert_eq!(next_json(&mut client).await["role"], "assistant");

    client.close(None).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), agent.cancelled())
        .await
        .expect("run was not cancelled");
    wait_until_removed(&state, &task_id).await;

    // The task is gone; reconnecting is treated as an unknown id.
    let mut again = connect(addr, &task_id).await;
    assert_eq!(next_close(&mut again).await.0, 4004);
}
