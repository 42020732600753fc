//! Server state shared by every handler.

use std::{sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{
    domain::{MessageStore, SessionLookup},
    infrastructure::ConnectionRegistry,
    ui::config::ServerConfig,
    usecase::{
        AdmitConnectionUseCase, BroadcastMessageUseCase, EvictConnectionUseCase,
        ResolveIdentityUseCase,
    },
};

/// Keepalive settings of each connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    /// Interval between pings sent by the server
    pub interval: Duration,
    /// How long past `interval` a silent peer is tolerated
    pub pong_timeout: Duration,
}

impl Keepalive {
    /// Idle time after which the connection is considered dead
    pub fn deadline(&self) -> Duration {
        self.interval + self.pong_timeout
    }
}

/// Shared application state
pub struct AppState {
    /// Registry of admitted connections
    pub registry: Arc<ConnectionRegistry>,
    pub resolve_identity: ResolveIdentityUseCase,
    pub admit_connection: AdmitConnectionUseCase,
    pub evict_connection: EvictConnectionUseCase,
    pub broadcast_message: BroadcastMessageUseCase,
    /// Cookie name holding the web session token
    pub session_cookie: String,
    /// Capacity of each connection's outbound queue
    pub outbound_queue_capacity: usize,
    pub keepalive: Keepalive,
    /// Flipped to `true` once the server starts shutting down
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(
        config: &ServerConfig,
        session_lookup: Arc<dyn SessionLookup>,
        message_store: Arc<dyn MessageStore>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let (shutdown, _) = watch::channel(false);

        Self {
            resolve_identity: ResolveIdentityUseCase::new(
                session_lookup,
                config.anonymous_policy,
                config.allowed_origins.clone(),
            ),
            admit_connection: AdmitConnectionUseCase::new(registry.clone()),
            evict_connection: EvictConnectionUseCase::new(registry.clone()),
            broadcast_message: BroadcastMessageUseCase::new(registry.clone(), message_store),
            registry,
            session_cookie: config.session_cookie.clone(),
            outbound_queue_capacity: config.outbound_queue_capacity.get(),
            keepalive: Keepalive {
                interval: config.heartbeat_interval(),
                pong_timeout: config.pong_timeout(),
            },
            shutdown,
        }
    }

    /// Tell every open connection to close.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once [`AppState::begin_shutdown`] has been called.
    pub async fn shutting_down(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|stopping| *stopping).await;
    }
}
