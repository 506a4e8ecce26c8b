use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RelayHandle;
use super::messages::{ClientMessage, ServerMessage};
use super::types::{ConnectionId, OutboundMessage};
use crate::config::ServerConfig;

pub const DEFAULT_SIGNALING_PORT: u16 = 3479;

pub struct SignalingServer {
    listener: TcpListener,
    handle: RelayHandle,
    config: ServerConfig,
}

impl SignalingServer {
    /// Validate the config, bind the listener and start the relay actor
    pub async fn bind(config: ServerConfig) -> std::io::Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr).await?;
        let handle = RelayHandle::spawn(config.command_buffer);

        info!("Signaling server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle,
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(self) -> std::io::Result<()> {
        tokio::spawn(log_stats(self.handle.clone(), self.config.stats_interval));

        let keepalive = Keepalive::from(&self.config);
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, keepalive).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

/// Periodic room/connection counts. Stops once the actor is gone.
async fn log_stats(handle: RelayHandle, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match handle.stats().await {
            Ok(stats) => info!(
                rooms = stats.rooms,
                connections = stats.connections,
                "relay stats"
            ),
            Err(e) => {
                debug!("Stats logging stopped: {}", e);
                break;
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Keepalive {
    ping_interval: Duration,
    pong_timeout: Duration,
}

impl From<&ServerConfig> for Keepalive {
    fn from(config: &ServerConfig) -> Self {
        Self {
            ping_interval: config.ping_interval,
            pong_timeout: config.pong_timeout,
        }
    }
}

/// Where a connection is in the ping/pong cycle.
#[derive(Debug, Clone, Copy)]
enum Liveness {
    /// Next ping goes out at this instant
    Idle(Instant),
    /// Ping sent; the connection is dead if no pong arrives by this instant
    AwaitingPong(Instant),
}

impl Liveness {
    fn deadline(self) -> Instant {
        match self {
            Liveness::Idle(at) | Liveness::AwaitingPong(at) => at,
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RelayHandle,
    keepalive: Keepalive,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (ws_sink, mut ws_rx) = ws_stream.split();

    let connection_id = ConnectionId::generate();
    info!("WebSocket connection {} from {}", connection_id, addr);

    // Relay traffic and keepalive pings share one writer task.
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ping_tx, mut ping_rx) = mpsc::unbounded_channel::<Message>();
    let relayed = stream::poll_fn(move |cx| rx.poll_recv(cx))
        .map(|msg: OutboundMessage| Message::Text(msg.into_inner()));
    let pings = stream::poll_fn(move |cx| ping_rx.poll_recv(cx));
    let writer = tokio::spawn(stream::select(relayed, pings).map(Ok).forward(ws_sink));

    let hello = ServerMessage::Connected {
        connection_id: connection_id.clone(),
    };
    let _ = tx.send(OutboundMessage::from(hello.to_json()?));
    handle.connect(connection_id.clone(), tx.clone()).await?;

    let mut liveness = Liveness::Idle(Instant::now() + keepalive.ping_interval);

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(liveness.deadline()) => match liveness {
                Liveness::Idle(_) => {
                    if ping_tx.send(Message::Ping(Bytes::new())).is_err() {
                        break;
                    }
                    liveness = Liveness::AwaitingPong(Instant::now() + keepalive.pong_timeout);
                    debug!("Ping sent to {}", connection_id);
                }
                Liveness::AwaitingPong(_) => {
                    warn!("Pong timeout, disconnecting {}", connection_id);
                    break;
                }
            },

            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Err(e) = handle_text_message(&text, &tx, &handle, &connection_id).await {
                        warn!("Message handling error: {}", e);
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    liveness = Liveness::Idle(Instant::now() + keepalive.ping_interval);
                    debug!("Pong received from {}", connection_id);
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Close received from {}", connection_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error on {}: {}", connection_id, e);
                    break;
                }
                None => break,
            },
        }
    }

    // exactly one disconnect per connection, whichever way the loop ended
    if let Err(e) = handle.disconnect(connection_id.clone()).await {
        warn!("Failed to report disconnect of {}: {}", connection_id, e);
    }

    writer.abort();
    info!("WebSocket disconnected: {} ({})", connection_id, addr);

    Ok(())
}

async fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    handle: &RelayHandle,
    connection_id: &ConnectionId,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            let err = ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
            let _ = tx.send(OutboundMessage::from(err.to_json()?));
            return Ok(());
        }
    };

    handle.inbound(connection_id.clone(), client_msg).await?;
    Ok(())
}
