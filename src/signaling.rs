//! WebSocket rendezvous and signaling relay for host/listener P2P sessions

mod actor;
mod messages;
mod registry;
mod relay;
mod server;
mod types;

pub use actor::{RelayHandle, RelayStats};
pub use messages::{ClientMessage, NetworkCandidate, ServerMessage, SessionDescription};
pub use registry::{Joined, RemovalEvent, Room, RoomRegistry};
pub use relay::{Delivery, SignalingRelay};
pub use server::{DEFAULT_SIGNALING_PORT, SignalingServer};
pub use types::{ConnectionId, OutboundMessage, RoomId, SignalingError};
