//! HTTP API response DTOs for the chatting hub.

use chatting_shared::time::timestamp_to_jst_rfc3339;
use serde::{Deserialize, Serialize};

use crate::domain::Connection;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
}

/// Live connections for the debug endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionListDto {
    pub count: usize,
    pub connections: Vec<ConnectionSummaryDto>,
}

/// One admitted connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummaryDto {
    pub connection_id: String,
    /// `None` for anonymous connections
    pub user_id: Option<i64>,
    pub connected_at: String, // ISO 8601
}

impl From<&Connection> for ConnectionSummaryDto {
    fn from(connection: &Connection) -> Self {
        Self {
            connection_id: connection.id.to_string(),
            user_id: connection.identity.user_id().map(|id| id.value()),
            connected_at: timestamp_to_jst_rfc3339(connection.connected_at.value()),
        }
    }
}

impl From<Vec<Connection>> for ConnectionListDto {
    fn from(mut connections: Vec<Connection>) -> Self {
        // Oldest first
        connections.sort_by_key(|c| c.connected_at);
        Self {
            count: connections.len(),
            connections: connections.iter().map(ConnectionSummaryDto::from).collect(),
        }
    }
}
