use tracing::{debug, info};

use super::messages::{ClientMessage, ServerMessage};
use super::registry::{Joined, RemovalEvent, RoomRegistry};
use super::types::ConnectionId;

/// One outbound message addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub message: ServerMessage,
}

impl Delivery {
    fn new(to: ConnectionId, message: ServerMessage) -> Self {
        Self { to, message }
    }
}

/// Routes protocol messages against the registry.
///
/// Negotiation messages (`offer`, `answer`, `ice-candidate`) are forwarded to
/// whatever id the sender names; membership of the sender is not checked.
#[derive(Debug, Default)]
pub struct SignalingRelay {
    registry: RoomRegistry,
}

impl SignalingRelay {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Apply one inbound message from `sender` and return what to send where.
    pub fn handle(&mut self, sender: &ConnectionId, msg: ClientMessage) -> Vec<Delivery> {
        match msg {
            ClientMessage::CreateRoom { room_id } => {
                self.registry.create(room_id.clone(), sender.clone());
                info!("Room created: {} by {}", room_id, sender);
                vec![Delivery::new(
                    sender.clone(),
                    ServerMessage::RoomCreated { room_id },
                )]
            }

            ClientMessage::JoinRoom { room_id } => {
                match self.registry.join(&room_id, sender.clone()) {
                    Ok(Joined { host_id, total }) => {
                        info!("{} joined room {} ({} listeners)", sender, room_id, total);
                        let mut deliveries = Vec::with_capacity(3);
                        if host_id != *sender {
                            deliveries.push(Delivery::new(
                                host_id.clone(),
                                ServerMessage::ParticipantJoined {
                                    participant_id: sender.clone(),
                                    total_participants: total,
                                },
                            ));
                            deliveries.push(Delivery::new(
                                host_id,
                                ServerMessage::RequestOffer {
                                    participant_id: sender.clone(),
                                },
                            ));
                        }
                        deliveries.push(Delivery::new(
                            sender.clone(),
                            ServerMessage::JoinedRoom { room_id },
                        ));
                        deliveries
                    }
                    Err(e) => {
                        debug!("{} failed to join {}: {}", sender, room_id, e);
                        vec![error_to(sender, &e)]
                    }
                }
            }

            ClientMessage::Offer {
                offer,
                participant_id,
            } => forward(
                sender,
                participant_id,
                ServerMessage::Offer {
                    offer,
                    host_id: sender.clone(),
                },
            ),

            ClientMessage::Answer { answer, host_id } => forward(
                sender,
                host_id,
                ServerMessage::Answer {
                    answer,
                    participant_id: sender.clone(),
                },
            ),

            ClientMessage::IceCandidate {
                candidate,
                target_id,
            } => forward(
                sender,
                target_id,
                ServerMessage::IceCandidate {
                    candidate,
                    sender_id: sender.clone(),
                },
            ),
        }
    }

    /// Tear down everything `sender` was part of.
    pub fn disconnect(&mut self, sender: &ConnectionId) -> Vec<Delivery> {
        let mut deliveries = Vec::new();

        for event in self.registry.remove_connection(sender) {
            match event {
                RemovalEvent::HostLeft {
                    room_id,
                    recipients,
                } => {
                    info!(
                        "Room {} closed: host {} left ({} connections notified)",
                        room_id,
                        sender,
                        recipients.len()
                    );
                    deliveries.extend(
                        recipients
                            .into_iter()
                            .map(|to| Delivery::new(to, ServerMessage::HostLeft)),
                    );
                }
                RemovalEvent::ParticipantLeft {
                    room_id,
                    host_id,
                    participant_id,
                    total,
                } => {
                    info!("{} left room {} ({} listeners)", participant_id, room_id, total);
                    deliveries.push(Delivery::new(
                        host_id,
                        ServerMessage::ParticipantLeft {
                            participant_id,
                            total_participants: total,
                        },
                    ));
                }
            }
        }

        deliveries
    }
}

/// Point-to-point negotiation message. Never echoed back to the sender.
fn forward(sender: &ConnectionId, to: ConnectionId, message: ServerMessage) -> Vec<Delivery> {
    if to == *sender {
        debug!("Dropped {:?} addressed to its own sender {}", message, sender);
        return Vec::new();
    }
    debug!("{} -> {}", sender, to);
    vec![Delivery::new(to, message)]
}

fn error_to(to: &ConnectionId, err: &impl std::fmt::Display) -> Delivery {
    Delivery::new(
        to.clone(),
        ServerMessage::Error {
            message: err.to_string(),
        },
    )
}
