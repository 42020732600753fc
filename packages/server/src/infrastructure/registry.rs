//! Connection registry.
//!
//! The set of admitted connections, each tagged with the identity resolved at
//! handshake. It is the only shared mutable state of the hub. The lock is held
//! to insert, remove, or copy entries, never while delivering: fan-out works on
//! a snapshot and only `try_send`s onto each connection's bounded queue, so a
//! slow peer cannot stall delivery to others.

use std::{collections::HashMap, sync::Arc};

use thiserror::Error;
use tokio::sync::{Notify, RwLock, mpsc};

use crate::domain::{Connection, ConnectionId, Identity};

/// Why a frame could not be handed to a connection
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The connection's outbound queue is full (slow consumer)
    #[error("outbound queue is full")]
    QueueFull,

    /// The connection's writer has gone away
    #[error("connection is closed")]
    Disconnected,
}

/// Registry entry: the domain connection plus its send capability.
///
/// Cloning is cheap; all clones share the same queue and close signal.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    connection: Connection,
    sender: mpsc::Sender<String>,
    closed: Arc<Notify>,
}

impl ConnectionHandle {
    pub fn new(connection: Connection, sender: mpsc::Sender<String>) -> Self {
        Self {
            connection,
            sender,
            closed: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id
    }

    pub fn identity(&self) -> Identity {
        self.connection.identity
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Enqueue an encoded frame without waiting.
    pub fn try_send(&self, frame: String) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::Disconnected,
        })
    }

    /// Resolves once the registry evicted this connection.
    pub async fn closed(&self) {
        self.closed.notified().await;
    }

    fn notify_closed(&self) {
        // notify_one keeps a permit if the handler is not waiting yet
        self.closed.notify_one();
    }
}

/// A delivery attempt that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub connection_id: ConnectionId,
    pub error: SendError,
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections the frame was enqueued on
    pub delivered: Vec<ConnectionId>,
    /// Connections that failed and were evicted
    pub failed: Vec<DeliveryFailure>,
}

impl DeliveryReport {
    /// Number of matched connections, successful or not.
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Concurrency-safe set of admitted connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly established connection.
    ///
    /// Returns `false` and leaves the registry unchanged if a connection with
    /// the same id is already admitted.
    pub async fn admit(&self, handle: ConnectionHandle) -> bool {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&handle.id()) {
            return false;
        }
        tracing::debug!(
            connection_id = %handle.id(),
            identity = ?handle.identity(),
            "admitted connection"
        );
        connections.insert(handle.id(), handle);
        true
    }

    /// Remove a connection and signal its handler to close.
    ///
    /// Idempotent: returns `true` only for the call that actually removed it.
    pub async fn evict(&self, connection_id: ConnectionId) -> bool {
        let removed = self.connections.write().await.remove(&connection_id);
        match removed {
            Some(handle) => {
                handle.notify_closed();
                tracing::debug!(connection_id = %connection_id, "evicted connection");
                true
            }
            None => false,
        }
    }

    /// Apply `action` to every admitted connection matching `predicate`.
    ///
    /// Works on a snapshot taken under the read lock. A failing action does
    /// not stop the loop; each failed connection is evicted afterwards.
    pub async fn for_each_matching<P, A>(&self, predicate: P, mut action: A) -> DeliveryReport
    where
        P: Fn(&Connection) -> bool,
        A: FnMut(&ConnectionHandle) -> Result<(), SendError>,
    {
        let targets: Vec<ConnectionHandle> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|handle| predicate(handle.connection()))
                .cloned()
                .collect()
        };

        let mut report = DeliveryReport::default();
        for handle in &targets {
            match action(handle) {
                Ok(()) => report.delivered.push(handle.id()),
                Err(error) => {
                    tracing::warn!(
                        connection_id = %handle.id(),
                        error = %error,
                        "delivery failed, evicting connection"
                    );
                    report.failed.push(DeliveryFailure {
                        connection_id: handle.id(),
                        error,
                    });
                }
            }
        }

        for failure in &report.failed {
            self.evict(failure.connection_id).await;
        }

        report
    }

    /// Point-in-time copy of the admitted connections.
    pub async fn snapshot(&self) -> Vec<Connection> {
        let connections = self.connections.read().await;
        connections.values().map(|h| *h.connection()).collect()
    }

    pub async fn contains(&self, connection_id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&connection_id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
