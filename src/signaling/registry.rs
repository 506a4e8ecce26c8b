use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use super::types::{ConnectionId, RoomId, SignalingError};

/// A host and everyone who has joined its room, host included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub host_id: ConnectionId,
    pub participants: HashSet<ConnectionId>,
}

impl Room {
    fn new(host_id: ConnectionId) -> Self {
        Self {
            participants: HashSet::from([host_id.clone()]),
            host_id,
        }
    }

    /// Participants other than the host.
    pub fn listener_count(&self) -> usize {
        self.participants.len().saturating_sub(1)
    }
}

/// What a disconnect did to one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalEvent {
    /// The room's host left; the room is gone. `recipients` is every other
    /// connection still subscribed to the room id.
    HostLeft {
        room_id: RoomId,
        recipients: Vec<ConnectionId>,
    },
    /// A listener left; the room survives with `total` listeners.
    ParticipantLeft {
        room_id: RoomId,
        host_id: ConnectionId,
        participant_id: ConnectionId,
        total: usize,
    },
}

/// Outcome of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub host_id: ConnectionId,
    pub total: usize,
}

/// In-memory `room_id -> Room` map. Pure state, no I/O.
///
/// Two kinds of membership are tracked. `memberships` indexes which rooms a
/// connection currently hosts or participates in, so disconnect cleanup only
/// visits those rooms. `subscribers` records every connection that has ever
/// created or joined a room id until it disconnects; it outlives any single
/// `Room` under that id and addresses the `host-left` broadcast.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    memberships: HashMap<ConnectionId, BTreeSet<RoomId>>,
    subscribers: HashMap<RoomId, BTreeSet<ConnectionId>>,
    subscriptions: HashMap<ConnectionId, BTreeSet<RoomId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a room hosted by `host_id`, replacing any room already at `room_id`.
    pub fn create(&mut self, room_id: RoomId, host_id: ConnectionId) {
        if let Some(replaced) = self.rooms.remove(&room_id) {
            debug!(
                "Room {} replaced (previous host {})",
                room_id, replaced.host_id
            );
            for member in &replaced.participants {
                self.unindex(member, &room_id);
            }
        }

        self.memberships
            .entry(host_id.clone())
            .or_default()
            .insert(room_id.clone());
        self.subscribe(&room_id, &host_id);
        self.rooms.insert(room_id, Room::new(host_id));
    }

    pub fn get(&self, room_id: &RoomId) -> Result<&Room, SignalingError> {
        self.rooms
            .get(room_id)
            .ok_or_else(|| SignalingError::RoomNotFound(room_id.clone()))
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Rooms the connection currently hosts or has joined, in id order.
    pub fn rooms_of(&self, connection_id: &ConnectionId) -> Vec<RoomId> {
        self.memberships
            .get(connection_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Connections subscribed to `room_id`, whether or not a room exists there now.
    pub fn subscribers_of(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.subscribers
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Add a participant and return the new listener count. Re-joining is a no-op.
    pub fn add_participant(
        &mut self,
        room_id: &RoomId,
        participant_id: ConnectionId,
    ) -> Result<usize, SignalingError> {
        self.join(room_id, participant_id).map(|joined| joined.total)
    }

    /// Like [`add_participant`](Self::add_participant), also reporting the host.
    pub fn join(
        &mut self,
        room_id: &RoomId,
        participant_id: ConnectionId,
    ) -> Result<Joined, SignalingError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| SignalingError::RoomNotFound(room_id.clone()))?;

        room.participants.insert(participant_id.clone());
        let joined = Joined {
            host_id: room.host_id.clone(),
            total: room.listener_count(),
        };

        self.memberships
            .entry(participant_id.clone())
            .or_default()
            .insert(room_id.clone());
        self.subscribe(room_id, &participant_id);

        Ok(joined)
    }

    /// Drop a connection from every room it belongs to.
    ///
    /// Rooms it hosts are deleted; rooms it merely joined lose one listener.
    /// Events come back in room id order. The connection's subscriptions go
    /// with it.
    pub fn remove_connection(&mut self, connection_id: &ConnectionId) -> Vec<RemovalEvent> {
        let room_ids = self.memberships.remove(connection_id).unwrap_or_default();

        let mut events = Vec::with_capacity(room_ids.len());
        for room_id in room_ids {
            let Some(room) = self.rooms.get_mut(&room_id) else {
                continue;
            };

            if room.host_id == *connection_id {
                if let Some(room) = self.rooms.remove(&room_id) {
                    for member in room.participants.iter().filter(|m| *m != connection_id) {
                        self.unindex(member, &room_id);
                    }
                }
                let recipients = self
                    .subscribers_of(&room_id)
                    .into_iter()
                    .filter(|id| id != connection_id)
                    .collect();
                events.push(RemovalEvent::HostLeft {
                    room_id,
                    recipients,
                });
            } else if room.participants.remove(connection_id) {
                events.push(RemovalEvent::ParticipantLeft {
                    host_id: room.host_id.clone(),
                    participant_id: connection_id.clone(),
                    total: room.listener_count(),
                    room_id,
                });
            }
        }

        for room_id in self.subscriptions.remove(connection_id).unwrap_or_default() {
            if let Some(members) = self.subscribers.get_mut(&room_id) {
                members.remove(connection_id);
                if members.is_empty() {
                    self.subscribers.remove(&room_id);
                }
            }
        }

        events
    }

    fn subscribe(&mut self, room_id: &RoomId, connection_id: &ConnectionId) {
        self.subscribers
            .entry(room_id.clone())
            .or_default()
            .insert(connection_id.clone());
        self.subscriptions
            .entry(connection_id.clone())
            .or_default()
            .insert(room_id.clone());
    }

    fn unindex(&mut self, connection_id: &ConnectionId, room_id: &RoomId) {
        if let Some(rooms) = self.memberships.get_mut(connection_id) {
            rooms.remove(room_id);
            if rooms.is_empty() {
                self.memberships.remove(connection_id);
            }
        }
    }
}
