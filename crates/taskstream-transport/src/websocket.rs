//! Streaming gateway: binds one WebSocket to one task session.
//!
//! Lifecycle of a connection:
//! 1. Connecting - look the task up; unknown ids are closed with 4004.
//! 2. Streaming - spawn the session's run and forward its queue to the
//!    client until the terminal message or a disconnect.
//! 3. Closed - cancel the run if it is still going and drop the task from
//!    the registry.

use std::fmt::Display;

use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code},
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use taskstream_core::MessageStream;
use taskstream_session::SessionRegistry;
use tracing::{debug, error, info, warn};

use crate::{
    protocol::{
        CLOSE_ALREADY_STREAMING, CLOSE_TASK_NOT_FOUND, REASON_ALREADY_STREAMING,
        REASON_TASK_NOT_FOUND,
    },
    router::AppState,
};

/// How a stream connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The terminal message was delivered.
    Completed,
    /// The client went away first.
    Disconnected,
    /// The task id was not registered.
    NotFound,
    /// Another connection owns the task's stream.
    AlreadyStreaming,
    /// The pump failed for another reason.
    Failed,
}

/// WebSocket upgrade handler for `/ws/{task_id}`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, task_id, state))
}

async fn handle_socket(socket: WebSocket, task_id: String, state: AppState) {
    let (sender, receiver) = socket.split();
    stream_task(state.manager.registry(), &task_id, sender, receiver).await;
}

/// Drive one connection for `task_id` to completion.
///
/// Generic over the socket halves so it can run against any sink/stream of
/// WebSocket messages. A registered session is always removed from the
/// registry before this returns, unless another connection owns it.
pub async fn stream_task<Tx, Rx, E>(
    registry: &SessionRegistry,
    task_id: &str,
    mut sink: Tx,
    mut incoming: Rx,
) -> StreamOutcome
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let session = match registry.lookup(task_id) {
        Ok(session) => session,
        Err(e) => {
            info!(task_id, "Rejecting stream: {e}");
            close(&mut sink, CLOSE_TASK_NOT_FOUND, REASON_TASK_NOT_FOUND).await;
            return StreamOutcome::NotFound;
        }
    };

    let Some(mut messages) = session.queue().take_stream() else {
        warn!(task_id, "Rejecting second stream for task");
        close(&mut sink, CLOSE_ALREADY_STREAMING, REASON_ALREADY_STREAMING).await;
        return StreamOutcome::AlreadyStreaming;
    };

    let run = tokio::spawn(session.run());
    let outcome = pump(task_id, &mut messages, &mut sink, &mut incoming).await;

    if outcome != StreamOutcome::Completed && !run.is_finished() {
        run.abort();
        info!(task_id, "Agent run cancelled");
    }
    registry.remove(task_id);

    if outcome == StreamOutcome::Completed {
        close(&mut sink, close_code::NORMAL, "").await;
    }
    info!(task_id, ?outcome, "Stream closed, task cleaned up");
    outcome
}

async fn pump<Tx, Rx, E>(
    task_id: &str,
    messages: &mut MessageStream,
    sink: &mut Tx,
    incoming: &mut Rx,
) -> StreamOutcome
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        tokio::select! {
            next = messages.next() => {
                let Some(msg) = next else {
                    error!(task_id, "Message queue closed before the terminal message");
                    return StreamOutcome::Failed;
                };
                let json = match serde_json::to_string(&msg) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(task_id, "Failed to serialize message: {e}");
                        return StreamOutcome::Failed;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    info!(task_id, "Client went away: {e}");
                    return StreamOutcome::Disconnected;
                }
                if msg.is_terminal() {
                    return StreamOutcome::Completed;
                }
            }
            frame = incoming.next() => match frame {
                None | Some(Ok(Message::Close(_))) => {
                    info!(task_id, "Client disconnected");
                    return StreamOutcome::Disconnected;
                }
                Some(Err(e)) => {
                    info!(task_id, "Client connection error: {e}");
                    return StreamOutcome::Disconnected;
                }
                // Client frames carry nothing for an agent stream.
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn close<Tx>(sink: &mut Tx, code: u16, reason: &'static str)
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
{
    let frame = CloseFrame {
        code,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!("Failed to send close frame: {e}");
    }
}
