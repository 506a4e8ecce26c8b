use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::messages::{ClientMessage, ServerMessage};
use super::registry::RoomRegistry;
use super::relay::{Delivery, SignalingRelay};
use super::types::{ConnectionId, OutboundMessage, SignalingError};

/// Commands sent to the relay actor
pub(crate) enum RelayCommand {
    Connect {
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    },
    Inbound {
        connection_id: ConnectionId,
        msg: ClientMessage,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Stats {
        reply: oneshot::Sender<RelayStats>,
    },
}

/// Snapshot of the actor's state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub rooms: usize,
    pub connections: usize,
}

/// Owns the relay and the live connection table. Every registry mutation
/// runs here, one command at a time.
pub(crate) async fn relay_actor(mut rx: mpsc::Receiver<RelayCommand>) {
    let mut relay = SignalingRelay::new(RoomRegistry::new());
    let mut connections: HashMap<ConnectionId, mpsc::UnboundedSender<OutboundMessage>> =
        HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RelayCommand::Connect { connection_id, tx } => {
                debug!("Connection {} registered", connection_id);
                connections.insert(connection_id, tx);
            }

            RelayCommand::Inbound { connection_id, msg } => {
                let deliveries = relay.handle(&connection_id, msg);
                deliver(&connections, deliveries);
            }

            RelayCommand::Disconnect { connection_id } => {
                if connections.remove(&connection_id).is_some() {
                    info!("Connection {} closed", connection_id);
                }
                let deliveries = relay.disconnect(&connection_id);
                deliver(&connections, deliveries);
            }

            RelayCommand::Stats { reply } => {
                let _ = reply.send(RelayStats {
                    rooms: relay.registry().room_count(),
                    connections: connections.len(),
                });
            }
        }
    }

    debug!("Relay actor stopped");
}

/// Fire-and-forget. Targets that are gone are dropped.
fn deliver(
    connections: &HashMap<ConnectionId, mpsc::UnboundedSender<OutboundMessage>>,
    deliveries: Vec<Delivery>,
) {
    for Delivery { to, message } in deliveries {
        if let Err(e) = send_to(connections, &to, &message) {
            debug!("Dropped {:?} delivery: {}", message, e);
        }
    }
}

fn send_to(
    connections: &HashMap<ConnectionId, mpsc::UnboundedSender<OutboundMessage>>,
    to: &ConnectionId,
    message: &ServerMessage,
) -> Result<(), SignalingError> {
    let tx = connections
        .get(to)
        .ok_or_else(|| SignalingError::StaleTarget(to.clone()))?;

    let json = message.to_json().map_err(|e| {
        error!("Failed to serialize outbound message: {}", e);
        SignalingError::Internal(e.to_string())
    })?;

    tx.send(OutboundMessage::from(json))
        .map_err(|_| SignalingError::StaleTarget(to.clone()))
}

/// Handle to communicate with the relay actor
#[derive(Clone)]
pub struct RelayHandle {
    pub(crate) tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Spawn a relay actor with a command queue of `buffer` entries (at least 1).
    pub fn spawn(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel::<RelayCommand>(buffer.max(1));
        tokio::spawn(relay_actor(rx));
        Self { tx }
    }

    /// Make a connection addressable by its id
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<(), SignalingError> {
        self.send(RelayCommand::Connect { connection_id, tx }).await
    }

    /// Route one inbound message
    pub async fn inbound(
        &self,
        connection_id: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), SignalingError> {
        self.send(RelayCommand::Inbound { connection_id, msg })
            .await
    }

    /// Transport-side close notification. Safe to call more than once.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> Result<(), SignalingError> {
        self.send(RelayCommand::Disconnect { connection_id }).await
    }

    pub async fn stats(&self) -> Result<RelayStats, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RelayCommand::Stats { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    async fn send(&self, cmd: RelayCommand) -> Result<(), SignalingError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::types::RoomId;
    use serde_json::json;

    struct Peer {
        id: ConnectionId,
        rx: mpsc::UnboundedReceiver<OutboundMessage>,
    }

    impl Peer {
        async fn connect(handle: &RelayHandle, id: &str) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let id = ConnectionId::from(id);
            handle.connect(id.clone(), tx).await.unwrap();
            Self { id, rx }
        }

        async fn recv(&mut self) -> ServerMessage {
            let msg = self.rx.recv().await.expect("channel closed");
            serde_json::from_str(msg.as_str()).unwrap()
        }

        fn assert_empty(&mut self) {
            assert!(self.rx.try_recv().is_err(), "unexpected message for {}", self.id);
        }
    }

    #[tokio::test]
    async fn create_and_join_through_actor() {
        let handle = RelayHandle::spawn(16);
        let mut host = Peer::connect(&handle, "host").await;
        let mut listener = Peer::connect(&handle, "listener").await;

        handle
            .inbound(
                host.id.clone(),
                ClientMessage::CreateRoom {
                    room_id: RoomId::from("AB12CD"),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            host.recv().await,
            ServerMessage::RoomCreated {
                room_id: RoomId::from("AB12CD")
            }
        );

        handle
            .inbound(
                listener.id.clone(),
                ClientMessage::JoinRoom {
                    room_id: RoomId::from("AB12CD"),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            host.recv().await,
            ServerMessage::ParticipantJoined {
                participant_id: listener.id.clone(),
                total_participants: 1,
            }
        );
        assert_eq!(
            host.recv().await,
            ServerMessage::RequestOffer {
                participant_id: listener.id.clone(),
            }
        );
        assert_eq!(
            listener.recv().await,
            ServerMessage::JoinedRoom {
                room_id: RoomId::from("AB12CD")
            }
        );

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats, RelayStats { rooms: 1, connections: 2 });
    }

    #[tokio::test]
    async fn stale_target_is_dropped() {
        let handle = RelayHandle::spawn(16);
        let mut host = Peer::connect(&handle, "host").await;

        handle
            .inbound(
                host.id.clone(),
                ClientMessage::Offer {
                    offer: json!({"sdp": "v=0"}),
                    participant_id: ConnectionId::from("gone"),
                },
            )
            .await
            .unwrap();

        // stats is answered after the offer was processed
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.connections, 1);
        host.assert_empty();
    }

    #[tokio::test]
    async fn host_disconnect_notifies_listeners() {
        let handle = RelayHandle::spawn(16);
        let host = Peer::connect(&handle, "host").await;
        let mut a = Peer::connect(&handle, "a").await;
        let mut b = Peer::connect(&handle, "b").await;

        let room_id = RoomId::from("R");
        handle
            .inbound(host.id.clone(), ClientMessage::CreateRoom { room_id: room_id.clone() })
            .await
            .unwrap();
        for peer in [&a, &b] {
            handle
                .inbound(peer.id.clone(), ClientMessage::JoinRoom { room_id: room_id.clone() })
                .await
                .unwrap();
        }
        assert!(matches!(a.recv().await, ServerMessage::JoinedRoom { .. }));
        assert!(matches!(b.recv().await, ServerMessage::JoinedRoom { .. }));

        handle.disconnect(host.id.clone()).await.unwrap();

        assert_eq!(a.recv().await, ServerMessage::HostLeft);
        assert_eq!(b.recv().await, ServerMessage::HostLeft);
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats, RelayStats { rooms: 0, connections: 2 });
    }

    #[tokio::test]
    async fn concurrent_joins_get_distinct_counts() {
        let handle = RelayHandle::spawn(64);
        let mut host = Peer::connect(&handle, "host").await;
        handle
            .inbound(
                host.id.clone(),
                ClientMessage::CreateRoom {
                    room_id: RoomId::from("R"),
                },
            )
            .await
            .unwrap();
        host.recv().await;

        let mut tasks = Vec::new();
        for n in 0..10 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                handle
                    .inbound(
                        ConnectionId::from(format!("p{}", n)),
                        ClientMessage::JoinRoom {
                            room_id: RoomId::from("R"),
                        },
                    )
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let mut totals = Vec::new();
        for _ in 0..20 {
            if let ServerMessage::ParticipantJoined {
                total_participants, ..
            } = host.recv().await
            {
                totals.push(total_participants);
            }
        }
        assert_eq!(totals, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn disconnect_twice_is_harmless() {
        let handle = RelayHandle::spawn(16);
        let peer = Peer::connect(&handle, "p").await;

        handle.disconnect(peer.id.clone()).await.unwrap();
        handle.disconnect(peer.id.clone()).await.unwrap();

        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.connections, 0);
    }
}
