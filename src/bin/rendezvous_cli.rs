//! Smoke-test client for the rendezvous server.
//!
//! Host a room:
//! ```not_rust
//! cargo run --bin rendezvous_cli -- host
//! ```
//! Listen in another terminal:
//! ```not_rust
//! cargo run --bin rendezvous_cli -- join AB12CD
//! ```
//! Both sides run the offer/answer/candidate exchange with placeholder
//! payloads and print every message they receive.

use std::error::Error;

use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use rendezvous::logger::setup_logger;
use rendezvous::signaling::{ClientMessage, DEFAULT_SIGNALING_PORT, RoomId, ServerMessage};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rendezvous_cli")]
#[command(about = "Host or join a rendezvous room", long_about = None)]
struct Args {
    /// Server WebSocket URL
    #[arg(short, long, default_value_t = format!("ws://127.0.0.1:{}", DEFAULT_SIGNALING_PORT))]
    url: String,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Create a room and answer every listener with an offer
    Host {
        /// Room id to use (random 6 characters if omitted)
        room_id: Option<String>,
    },
    /// Join an existing room
    Join { room_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_logger(env!("CARGO_BIN_NAME"), "info");
    let args = Args::parse();

    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    info!("Connected to {}", args.url);

    let first = match args.role {
        Role::Host { room_id } => ClientMessage::CreateRoom {
            room_id: room_id.map(RoomId::from).unwrap_or_else(RoomId::generate),
        },
        Role::Join { room_id } => ClientMessage::JoinRoom {
            room_id: RoomId::from(room_id.to_uppercase()),
        },
    };
    ws_tx
        .send(Message::Text(serde_json::to_string(&first)?.into()))
        .await?;

    while let Some(msg) = ws_rx.next().await {
        let text = match msg? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let server_msg: ServerMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                warn!("Unrecognized message {}: {}", text, e);
                continue;
            }
        };
        println!("< {}", text);

        let reply = match server_msg {
            ServerMessage::RequestOffer { participant_id } => Some(ClientMessage::Offer {
                offer: json!({"type": "offer", "sdp": "v=0"}),
                participant_id,
            }),
            ServerMessage::Offer { host_id, .. } => Some(ClientMessage::Answer {
                answer: json!({"type": "answer", "sdp": "v=0"}),
                host_id,
            }),
            ServerMessage::Answer { participant_id, .. } => Some(ClientMessage::IceCandidate {
                candidate: json!({"candidate": "", "sdpMid": "0", "sdpMLineIndex": 0}),
                target_id: participant_id,
            }),
            ServerMessage::HostLeft => {
                println!("Host left, room closed");
                break;
            }
            ServerMessage::Error { message } => {
                eprintln!("Server error: {}", message);
                break;
            }
            _ => None,
        };

        if let Some(reply) = reply {
            let json = serde_json::to_string(&reply)?;
            println!("> {}", json);
            ws_tx.send(Message::Text(json.into())).await?;
        }
    }

    Ok(())
}
