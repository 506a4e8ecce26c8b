use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{ConnectionId, RoomId};

/// Opaque session description (SDP offer/answer). Forwarded untouched.
pub type SessionDescription = Value;

/// Opaque ICE candidate. Forwarded untouched.
pub type NetworkCandidate = Value;

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Create (or take over) a room and become its host
    CreateRoom { room_id: RoomId },

    /// Join an existing room as a listener
    JoinRoom { room_id: RoomId },

    /// Host -> listener
    Offer {
        offer: SessionDescription,
        participant_id: ConnectionId,
    },

    /// Listener -> host
    Answer {
        answer: SessionDescription,
        host_id: ConnectionId,
    },

    /// Either direction
    IceCandidate {
        candidate: NetworkCandidate,
        target_id: ConnectionId,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// First frame on every connection: the id other peers will address it by
    Connected { connection_id: ConnectionId },

    RoomCreated { room_id: RoomId },

    JoinedRoom { room_id: RoomId },

    /// To the host, after a listener joined
    ParticipantJoined {
        participant_id: ConnectionId,
        total_participants: usize,
    },

    /// To the host, after a listener disconnected
    ParticipantLeft {
        participant_id: ConnectionId,
        total_participants: usize,
    },

    /// To the host: start negotiating with this listener
    RequestOffer { participant_id: ConnectionId },

    Offer {
        offer: SessionDescription,
        host_id: ConnectionId,
    },

    Answer {
        answer: SessionDescription,
        participant_id: ConnectionId,
    },

    IceCandidate {
        candidate: NetworkCandidate,
        sender_id: ConnectionId,
    },

    /// Broadcast to listeners once the host is gone; the room no longer exists
    HostLeft,

    Error { message: String },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
