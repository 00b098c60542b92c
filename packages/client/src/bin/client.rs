//! Interactive live sync client for one universe.
//!
//! Joins a universe room over WebSocket, keeps the collaborator and parameter
//! view in sync and publishes local edits.
//! Automatically reconnects on disconnection with exponential backoff.
//!
//! Run with:
//! ```not_rust
//! LIVESYNC_TOKEN=secret cargo run --bin livesync-client -- --universe-id 42
//! cargo run --bin livesync-client -- -u ws://127.0.0.1:8080/ws -t secret -i 42 --view /scenes/1
//! ```

use clap::Parser;

use livesync_client::{
    ClientConfig, ReconnectPolicy, config::DEFAULT_SERVER_URL, console::run_console,
    domain::UniverseId,
};
use livesync_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "livesync-client")]
#[command(about = "Live presence and parameter sync client for a shared universe", long_about = None)]
struct Args {
    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Bearer token used to authenticate the connection
    #[arg(short = 't', long, env = "LIVESYNC_TOKEN", hide_env_values = true)]
    token: String,

    /// Universe to join
    #[arg(short = 'i', long)]
    universe_id: i64,

    /// Initial view path announced when joining (empty = idle)
    #[arg(long, default_value = "")]
    view: String,

    /// Reconnection attempts before giving up
    #[arg(long, default_value_t = ReconnectPolicy::default().max_attempts)]
    max_reconnect_attempts: u32,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let config = ClientConfig::new(args.url).with_reconnect(ReconnectPolicy {
        max_attempts: args.max_reconnect_attempts,
        ..ReconnectPolicy::default()
    });

    if let Err(e) = run_console(
        config,
        UniverseId::new(args.universe_id),
        args.token,
        args.view,
    )
    .await
    {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
