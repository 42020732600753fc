//! Shared helpers for the integration tests.
//!
//! Each test starts its own server in-process on an ephemeral port.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use chatting_server::{
    ServerConfig,
    domain::MessageStore,
    infrastructure::repository::{InMemoryMessageStore, InMemorySessionStore},
    ui::{serve, state::AppState},
};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message, client::IntoClientRequest, http::HeaderValue},
};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Sessions seeded into every test server: token `token-N` is user N.
pub const SEEDED_SESSIONS: [&str; 6] = [
    "--session",
    "token-1=1",
    "--session",
    "token-2=2",
    "--session",
    "token-3=3",
];

pub struct TestServer {
    addr: SocketAddr,
    pub state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with the in-memory message store and the given extra flags.
    pub async fn start(extra_args: &[&str]) -> Self {
        Self::start_with_store(extra_args, Arc::new(InMemoryMessageStore::new())).await
    }

    pub async fn start_with_store(extra_args: &[&str], store: Arc<dyn MessageStore>) -> Self {
        let args = ["chatting-server", "--port", "0"]
            .into_iter()
            .chain(SEEDED_SESSIONS)
            .chain(extra_args.iter().copied());
        let config = ServerConfig::parse_from(args);

        let sessions = InMemorySessionStore::with_sessions(
            config
                .sessions
                .iter()
                .map(|seed| (seed.token.clone(), seed.user_id)),
        );
        let state = Arc::new(AppState::new(&config, Arc::new(sessions), store));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn({
            let state = state.clone();
            async move {
                serve(listener, state, async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("Server failed");
            }
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown),
            task,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/chat", self.addr)
    }

    /// Connect as the seeded user `user_id` via the `session` query parameter.
    pub async fn connect_as(&self, user_id: i64) -> WsStream {
        let url = format!("{}?session=token-{}", self.ws_url(), user_id);
        let (ws, _) = connect_async(url).await.expect("Failed to connect");
        ws
    }

    /// Connect with arbitrary extra handshake headers.
    pub async fn connect_with_headers(
        &self,
        headers: &[(&'static str, &str)],
    ) -> Result<WsStream, tungstenite::Error> {
        let mut request = self.ws_url().into_client_request()?;
        for (name, value) in headers {
            request.headers_mut().insert(
                *name,
                HeaderValue::from_str(value).expect("Invalid header value"),
            );
        }
        connect_async(request).await.map(|(ws, _)| ws)
    }

    /// Wait until the registry holds exactly `expected` connections.
    pub async fn wait_for_connections(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let count = self.state.registry.len().await;
            if count == expected {
                return;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {expected} connections, found {count}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Trigger graceful shutdown and wait for the server task to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let task = std::mem::replace(&mut self.task, tokio::spawn(async {}));
        tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .expect("Server did not stop in time")
            .expect("Server task panicked");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// A chat frame as a client would send it.
pub fn chat_frame(sender: i64, addressee: i64, room: i64, content: &str) -> String {
    serde_json::json!({
        "senderId": sender,
        "addresseeId": addressee,
        "roomId": room,
        "content": content,
    })
    .to_string()
}

pub async fn send_text(ws: &mut WsStream, text: String) {
    ws.send(Message::Text(text.into()))
        .await
        .expect("Failed to send text frame");
}

/// Next JSON text frame, skipping keepalive frames. `None` on timeout or close.
pub async fn recv_json(ws: &mut WsStream, wait: Duration) -> Option<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                return Some(serde_json::from_str(text.as_str()).expect("Invalid JSON frame"));
            }
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            _ => return None,
        }
    }
}

pub async fn expect_frame(ws: &mut WsStream) -> serde_json::Value {
    recv_json(ws, Duration::from_secs(2))
        .await
        .expect("Expected a frame but none arrived")
}

pub async fn expect_silence(ws: &mut WsStream) {
    let frame = recv_json(ws, Duration::from_millis(300)).await;
    assert!(frame.is_none(), "Expected no frame, got {frame:?}");
}
