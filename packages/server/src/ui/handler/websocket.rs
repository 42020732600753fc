//! WebSocket connection handlers.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code},
    },
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use serde::Deserialize;
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, interval_at, timeout},
};

use crate::{
    domain::{ConnectionId, ConnectionState, HandshakeContext, Identity, SessionToken},
    infrastructure::{
        ConnectionHandle,
        dto::websocket::{ErrorCode, ErrorFrame},
    },
    ui::state::AppState,
    usecase::ConnectError,
};

/// Header carrying the session token for clients that cannot set cookies
pub const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// How long the writer gets to flush a close frame
const CLOSE_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeQuery {
    pub session: Option<String>,
}

/// Why a connection left the `Open` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    StreamEnded,
    SocketError,
    KeepaliveTimeout,
    Evicted,
    Shutdown,
    WriterStopped,
}

impl CloseReason {
    /// Close frame to send before hanging up, if the peer may still be listening
    fn close_frame(self) -> Option<CloseFrame> {
        let (code, reason) = match self {
            Self::KeepaliveTimeout => (close_code::AWAY, "keepalive timeout"),
            Self::Evicted => (close_code::AGAIN, "connection evicted"),
            Self::Shutdown => (close_code::AWAY, "server shutting down"),
            Self::ClientClosed | Self::StreamEnded | Self::SocketError | Self::WriterStopped => {
                return None;
            }
        };
        Some(CloseFrame {
            code,
            reason: reason.into(),
        })
    }
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<HandshakeQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let context = handshake_context(query, &headers, &state.session_cookie);

    let identity = match state.resolve_identity.execute(&context).await {
        Ok(identity) => identity,
        Err(ConnectError::OriginNotAllowed(origin)) => {
            tracing::warn!(origin = %origin, "rejecting upgrade: origin not allowed");
            return Err(StatusCode::FORBIDDEN);
        }
        Err(ConnectError::Unauthenticated) => {
            tracing::warn!("rejecting upgrade: no logged-in session");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

/// Collect the session token and origin from the upgrade request.
///
/// The token is looked up in the `session` query parameter, then the
/// `X-Session-Token` header, then the session cookie. A malformed token is
/// treated as absent.
fn handshake_context(
    query: HandshakeQuery,
    headers: &HeaderMap,
    cookie_name: &str,
) -> HandshakeContext {
    let raw_token = query
        .session
        .or_else(|| {
            headers
                .get(SESSION_TOKEN_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .or_else(|| session_cookie(headers, cookie_name));

    let session_token = raw_token.and_then(|token| match SessionToken::new(token) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::debug!("ignoring malformed session token: {}", e);
            None
        }
    });
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    HandshakeContext::new(session_token, origin)
}

fn session_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == cookie_name)
        .map(|(_, value)| value.trim_matches('"').to_string())
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: Identity) {
    let connection_state = ConnectionState::Connecting;
    let (tx, rx) = mpsc::channel(state.outbound_queue_capacity);

    let handle = match state.admit_connection.execute(identity, tx).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!("failed to admit connection: {}", e);
            return;
        }
    };
    let connection_id = handle.id();

    let connection_state = match connection_state.open() {
        Ok(next) => next,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, "{}", e);
            state.evict_connection.execute(connection_id).await;
            return;
        }
    };
    tracing::debug!(connection_id = %connection_id, state = ?connection_state, "connection open");

    let (sink, mut stream) = socket.split();
    let (stop_tx, stop_rx) = oneshot::channel();
    let mut writer = tokio::spawn(write_loop(
        sink,
        rx,
        stop_rx,
        state.keepalive.interval,
        connection_id,
    ));

    let reason = tokio::select! {
        reason = read_loop(&mut stream, &state, &handle) => reason,
        _ = &mut writer => CloseReason::WriterStopped,
        _ = handle.closed() => CloseReason::Evicted,
        _ = state.shutting_down() => CloseReason::Shutdown,
    };

    match reason.close_frame() {
        Some(frame) if !writer.is_finished() => {
            let _ = stop_tx.send(frame);
            if timeout(CLOSE_FLUSH_TIMEOUT, &mut writer).await.is_err() {
                writer.abort();
            }
        }
        _ => writer.abort(),
    }

    if let Some(closed) = connection_state.close() {
        tracing::debug!(
            connection_id = %connection_id,
            state = ?closed,
            reason = ?reason,
            "connection closed"
        );
    }
    state.evict_connection.execute(connection_id).await;
}

/// Feed inbound frames to the broadcaster until the connection should close.
async fn read_loop(
    stream: &mut SplitStream<WebSocket>,
    state: &AppState,
    handle: &ConnectionHandle,
) -> CloseReason {
    let idle_deadline = state.keepalive.deadline();

    loop {
        let next = match timeout(idle_deadline, stream.next()).await {
            Ok(next) => next,
            Err(_) => {
                tracing::info!(connection_id = %handle.id(), "no frame within {:?}", idle_deadline);
                return CloseReason::KeepaliveTimeout;
            }
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::warn!(connection_id = %handle.id(), "websocket error: {}", e);
                return CloseReason::SocketError;
            }
            None => return CloseReason::StreamEnded,
        };

        match message {
            Message::Text(text) => {
                tracing::debug!(connection_id = %handle.id(), "received text: {}", text.as_str());
                if let Ok(report) = state
                    .broadcast_message
                    .handle_inbound(text.as_str(), handle)
                    .await
                {
                    tracing::debug!(
                        connection_id = %handle.id(),
                        attempted = report.attempted(),
                        "inbound message handled"
                    );
                }
            }
            Message::Binary(_) => {
                tracing::warn!(connection_id = %handle.id(), "binary frame rejected");
                send_error(
                    handle,
                    ErrorCode::UnsupportedFrame,
                    "binary frames are not supported",
                );
            }
            Message::Ping(_) | Message::Pong(_) => {
                tracing::trace!(connection_id = %handle.id(), "keepalive frame");
            }
            Message::Close(frame) => {
                tracing::info!(connection_id = %handle.id(), ?frame, "client requested close");
                return CloseReason::ClientClosed;
            }
        }
    }
}

/// Drain the outbound queue into the socket and ping on every heartbeat.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    mut stop: oneshot::Receiver<CloseFrame>,
    heartbeat_interval: Duration,
    connection_id: ConnectionId,
) {
    let mut heartbeat = interval_at(Instant::now() + heartbeat_interval, heartbeat_interval);

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    tracing::debug!(connection_id = %connection_id, "send failed: {}", e);
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    tracing::debug!(connection_id = %connection_id, "ping failed: {}", e);
                    break;
                }
            }
            close = &mut stop => {
                if let Ok(frame) = close {
                    let _ = sink.send(Message::Close(Some(frame))).await;
                }
                break;
            }
        }
    }
}

fn send_error(handle: &ConnectionHandle, code: ErrorCode, reason: &str) {
    match serde_json::to_string(&ErrorFrame::new(code, reason)) {
        Ok(json) => {
            if let Err(e) = handle.try_send(json) {
                tracing::debug!(connection_id = %handle.id(), "error frame dropped: {}", e);
            }
        }
        Err(e) => tracing::error!("failed to encode error frame: {}", e),
    }
}
