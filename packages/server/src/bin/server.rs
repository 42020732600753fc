//! Identity-aware WebSocket chat hub server.
//!
//! Delivers each chat message to the connections of its sender and addressee.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin chatting-server -- --session abc=1 --session def=2
//! ```

use chatting_server::ServerConfig;
use chatting_shared::logger::setup_logger;
use clap::Parser;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    // Run the server
    if let Err(e) = chatting_server::run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
