use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use rendezvous::config::ServerConfig;
use rendezvous::logger::setup_logger;
use rendezvous::signaling::{DEFAULT_SIGNALING_PORT, SignalingServer};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "rendezvous")]
#[command(about = "Room rendezvous and WebRTC signaling relay", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "PORT", default_value_t = DEFAULT_SIGNALING_PORT)]
    port: u16,

    /// Seconds between keepalive pings
    #[arg(long, default_value_t = 30)]
    ping_interval_secs: u64,

    /// Seconds to wait for a pong before dropping the connection
    #[arg(long, default_value_t = 10)]
    pong_timeout_secs: u64,

    /// Seconds between relay stats log lines
    #[arg(long, default_value_t = 60)]
    stats_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let bind_addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let config = ServerConfig::with_addr(bind_addr)
        .ping_interval(Duration::from_secs(args.ping_interval_secs))
        .pong_timeout(Duration::from_secs(args.pong_timeout_secs))
        .stats_interval(Duration::from_secs(args.stats_interval_secs));

    println!("   Rendezvous Signaling Server");
    println!("   Binding to {}", bind_addr);
    println!("   Press Ctrl+C to stop\n");

    let server = SignalingServer::bind(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
