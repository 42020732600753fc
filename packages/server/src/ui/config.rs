//! Command line / environment configuration for the server.

use std::{num::NonZeroUsize, str::FromStr, time::Duration};

use clap::Parser;
use serde::Serialize;

use crate::{
    domain::{SessionToken, UserId},
    infrastructure::repository::inmemory::DEFAULT_MESSAGE_CAPACITY,
    usecase::AnonymousPolicy,
};

/// Server configuration
#[derive(Debug, Clone, Parser, Serialize)]
#[command(name = "chatting-server", version, about = "Identity-aware WebSocket chat hub")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "CHATTING_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind (0 picks an ephemeral port)
    #[arg(long, env = "CHATTING_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Name of the cookie carrying the web session token
    #[arg(long, env = "CHATTING_SESSION_COOKIE", default_value = "SESSION")]
    pub session_cookie: String,

    /// What to do with a handshake whose session cannot be resolved
    #[arg(
        long,
        env = "CHATTING_ANONYMOUS_POLICY",
        value_enum,
        default_value_t = AnonymousPolicy::Reject
    )]
    pub anonymous_policy: AnonymousPolicy,

    /// Allowed `Origin` for the upgrade request (repeatable, `*` wildcard). Empty allows any.
    #[arg(long = "allowed-origin", env = "CHATTING_ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Frames buffered per connection before it is treated as unreachable
    #[arg(long, env = "CHATTING_OUTBOUND_QUEUE_CAPACITY", default_value = "64")]
    pub outbound_queue_capacity: NonZeroUsize,

    /// Seconds between keepalive pings
    #[arg(
        long,
        env = "CHATTING_HEARTBEAT_INTERVAL_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub heartbeat_interval_secs: u64,

    /// Extra seconds to wait for a pong before closing the connection
    #[arg(long, env = "CHATTING_PONG_TIMEOUT_SECS", default_value_t = 10)]
    pub pong_timeout_secs: u64,

    /// Maximum number of messages kept by the in-memory message store
    #[arg(long, env = "CHATTING_MESSAGE_CAPACITY", default_value_t = DEFAULT_MESSAGE_CAPACITY)]
    pub message_capacity: usize,

    /// Seed a logged-in session as TOKEN=USER_ID (repeatable)
    #[arg(long = "session", env = "CHATTING_SESSIONS", value_delimiter = ',')]
    #[serde(skip)]
    pub sessions: Vec<SessionSeed>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

/// A `TOKEN=USER_ID` pair given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSeed {
    pub token: SessionToken,
    pub user_id: UserId,
}

impl FromStr for SessionSeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (token, user_id) = s
            .split_once('=')
            .ok_or_else(|| format!("expected TOKEN=USER_ID, got '{s}'"))?;
        let user_id = user_id
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("invalid user id '{user_id}': {e}"))?;
        Ok(Self {
            token: SessionToken::new(token.trim().to_string()).map_err(|e| e.to_string())?,
            user_id: UserId::new(user_id).map_err(|e| e.to_string())?,
        })
    }
}
