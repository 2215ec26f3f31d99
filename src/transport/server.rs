//! HTTP and websocket front end for a session
//!
//! `/ws` carries the duplex game stream; `/state`, `/history` and `/stats`
//! are read-only JSON views.

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use tokio::sync::broadcast;

use crate::actions::ChangeRecord;
use crate::board::GameState;
use crate::core::error::Result;
use crate::session::{SessionHandle, TurnStats};
use crate::transport::messages::{ClientMessage, ServerMessage};

#[derive(Clone)]
struct AppState {
    session: SessionHandle,
}

pub fn router(session: SessionHandle) -> Router {
    Router::new()
        .route("/ws", get(live))
        .route("/state", get(state))
        .route("/history", get(history))
        .route("/stats", get(stats))
        .with_state(AppState { session })
}

pub async fn serve(addr: SocketAddr, session: SessionHandle) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(session)).await?;
    Ok(())
}

async fn state(State(app): State<AppState>) -> std::result::Result<Json<GameState>, StatusCode> {
    app.session
        .state()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn history(
    State(app): State<AppState>,
) -> std::result::Result<Json<Vec<ChangeRecord>>, StatusCode> {
    app.session
        .history()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn stats(State(app): State<AppState>) -> std::result::Result<Json<TurnStats>, StatusCode> {
    app.session
        .stats()
        .await
        .map(Json)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

async fn live(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    let rx = app.session.subscribe();
    ws.on_upgrade(move |socket| live_socket(socket, app.session, rx))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode server message");
            None
        }
    }
}

async fn live_socket<S, E>(
    mut socket: S,
    session: SessionHandle,
    mut rx: broadcast::Receiver<ServerMessage>,
) where
    S: futures_util::Sink<Message, Error = E>
        + futures_util::Stream<Item = std::result::Result<Message, E>>
        + Unpin,
{
    use futures_util::{SinkExt, StreamExt};

    // Subscribed before the snapshot was taken, so nothing falls in between
    if let Ok(snapshot) = session.snapshot().await {
        if let Some(frame) = encode(&snapshot) {
            if socket.send(frame).await.is_err() {
                return;
            }
        }
    }

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let outgoing = match msg {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "client lagging, resending snapshot");
                        match session.snapshot().await {
                            Ok(snapshot) => snapshot,
                            Err(_) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(frame) = encode(&outgoing) else {
                    continue;
                };
                if socket.send(frame).await.is_err() {
                    break;
                }
            }
            incoming = socket.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                };
                if let Some(reply) = handle_frame(&session, &text).await {
                    let Some(frame) = encode(&reply) else {
                        continue;
                    };
                    if socket.send(frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

/// Handle one inbound frame. Anything returned goes to the sending client
/// only.
pub async fn handle_frame(session: &SessionHandle, text: &str) -> Option<ServerMessage> {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "malformed client message");
            return Some(ServerMessage::error(format!("malformed message: {}", e)));
        }
    };

    match message {
        ClientMessage::Privileged { action } => match session.privileged(action).await {
            Ok(record) => record
                .rejection()
                .map(|reason| ServerMessage::error(format!("privileged act rejected: {}", reason))),
            Err(e) => Some(ServerMessage::error(e.to_string())),
        },
        ClientMessage::AnimationComplete { seq } => session
            .acknowledge(seq)
            .await
            .err()
            .map(|e| ServerMessage::error(e.to_string())),
        ClientMessage::ClientReloaded => Some(
            session
                .client_reloaded()
                .await
                .unwrap_or_else(|e| ServerMessage::error(e.to_string())),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{ScriptedProvider, Step};
    use crate::core::config::GameConfig;
    use crate::session::{RunningSession, SessionBuilder, TurnPhase};
    use std::sync::Arc;

    fn start() -> RunningSession {
        SessionBuilder::new(GameConfig::default())
            .participant("Red", "stern", Arc::new(ScriptedProvider::new([Step::Hang])))
            .participant("Blue", "sly", Arc::new(ScriptedProvider::new([Step::Hang])))
            .start()
            .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_frame_answers_sender_only() {
        let running = start();
        let mut others = running.handle.subscribe();
        let reply = handle_frame(&running.handle, "{not json").await;
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
        // Nothing was broadcast
        assert!(others.try_recv().is_err());
        running.handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_privileged_act_reports_error() {
        let running = start();
        let reply = handle_frame(
            &running.handle,
            r#"{"type": "privileged", "action": {"type": "sanctify", "target": {"x": 12, "y": 0}}}"#,
        )
        .await;
        match reply {
            Some(ServerMessage::Error { message }) => assert!(message.contains("rejected")),
            other => panic!("expected error, got {:?}", other),
        }
        running.handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_returns_snapshot() {
        let running = start();
        let reply = handle_frame(&running.handle, r#"{"type": "client_reloaded"}"#).await;
        assert!(matches!(reply, Some(ServerMessage::Snapshot { .. })));
        running.handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_reload_and_stale_ack_keep_the_wait() {
        let running = start();
        let smite = r#"{"type": "privileged", "action": {"type": "smite", "center": {"x": 5, "y": 5}}}"#;
        assert!(handle_frame(&running.handle, smite).await.is_none());

        let pending = match handle_frame(&running.handle, r#"{"type": "client_reloaded"}"#).await {
            Some(ServerMessage::Snapshot {
                awaiting_ack: Some(seq),
                ..
            }) => seq,
            other => panic!("expected snapshot with a pending batch, got {:?}", other),
        };
        let waiting = TurnPhase::AwaitingAnimationAck { batches: 1 };
        assert_eq!(running.handle.phase().await.unwrap(), waiting);

        let stale = format!(r#"{{"type": "animation_complete", "seq": {}}}"#, pending - 1);
        assert!(handle_frame(&running.handle, &stale).await.is_none());
        assert_eq!(running.handle.phase().await.unwrap(), waiting);

        let current = format!(r#"{{"type": "animation_complete", "seq": {}}}"#, pending);
        assert!(handle_frame(&running.handle, &current).await.is_none());
        assert_ne!(running.handle.phase().await.unwrap(), waiting);
        running.handle.shutdown().await;
    }
}
