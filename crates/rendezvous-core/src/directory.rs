//! Room directory: membership of each named room, capped at two.
//!
//! Rooms are stored explicitly and removed as soon as their last member
//! leaves, so an empty room is indistinguishable from one that never existed.

use std::collections::HashMap;

use crate::ids::{ConnectionId, RoomName};

/// Maximum number of members in a room.
pub const ROOM_CAPACITY: usize = 2;

/// Result of [`RoomDirectory::try_join`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JoinOutcome {
    /// The room did not exist; the caller is now its only member.
    Created,
    /// The room had one member; the caller is the second.
    Joined,
    /// The room already had two members; nothing changed.
    Full,
}

impl JoinOutcome {
    /// Lowercase label, used for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Joined => "joined",
            Self::Full => "full",
        }
    }
}

/// Room name → ordered members (join order).
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<RoomName, Vec<ConnectionId>>,
}

impl RoomDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check capacity and admit `id` in one step.
    ///
    /// A connection that is already a member is not added twice; the outcome
    /// then reflects the current size.
    pub fn try_join(&mut self, room: &RoomName, id: &ConnectionId) -> JoinOutcome {
        let members = self.rooms.entry(room.clone()).or_default();
        if members.contains(id) {
            return if members.len() == 1 {
                JoinOutcome::Created
            } else {
                JoinOutcome::Joined
            };
        }
        match members.len() {
            0 => {
                members.push(id.clone());
                JoinOutcome::Created
            }
            n if n < ROOM_CAPACITY => {
                members.push(id.clone());
                JoinOutcome::Joined
            }
            _ => JoinOutcome::Full,
        }
    }

    /// Remove `id` from `room`. Returns whether it was a member.
    pub fn leave(&mut self, room: &RoomName, id: &ConnectionId) -> bool {
        let Some(members) = self.rooms.get_mut(room) else {
            return false;
        };
        let before = members.len();
        members.retain(|m| m != id);
        let removed = members.len() != before;
        if members.is_empty() {
            let _ = self.rooms.remove(room);
        }
        removed
    }

    /// All members of `room` except `id`.
    pub fn other_members(&self, room: &RoomName, id: &ConnectionId) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().filter(|m| *m != id).cloned().collect())
            .unwrap_or_default()
    }

    /// Current members of `room`, in join order.
    pub fn members(&self, room: &RoomName) -> &[ConnectionId] {
        self.rooms.get(room).map_or(&[][..], Vec::as_slice)
    }

    /// Number of members in `room` (0 for unknown rooms).
    pub fn member_count(&self, room: &RoomName) -> usize {
        self.rooms.get(room).map_or(0, Vec::len)
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Iterate over `(room, members)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&RoomName, &[ConnectionId])> {
        self.rooms
            .iter()
            .map(|(room, members)| (room, members.as_slice()))
    }
}
