//! Connection registry: live connection IDs and the room each one is in.
//!
//! The registry is a plain data structure. Thread safety comes from the
//! [`SignalingHub`](crate::hub::SignalingHub), which guards it together with
//! the room directory under one lock.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{Result, SignalingError};
use crate::ids::{ConnectionId, RoomName};
use crate::sink::PeerSink;

struct ConnectionEntry {
    room: Option<RoomName>,
    sink: Arc<dyn PeerSink>,
}

/// Tracks registered connections.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection with no room.
    pub fn register(&mut self, id: ConnectionId, sink: Arc<dyn PeerSink>) -> Result<()> {
        if self.connections.contains_key(&id) {
            return Err(SignalingError::DuplicateConnection(id));
        }
        let _ = self
            .connections
            .insert(id, ConnectionEntry { room: None, sink });
        Ok(())
    }

    /// Forget a connection. Returns the room it was associated with, if any.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<RoomName> {
        self.connections.remove(id).and_then(|entry| entry.room)
    }

    /// Associate a connection with a room, replacing any previous room.
    pub fn set_room(&mut self, id: &ConnectionId, room: RoomName) -> Result<()> {
        let entry = self
            .connections
            .get_mut(id)
            .ok_or_else(|| SignalingError::UnknownConnection(id.clone()))?;
        entry.room = Some(room);
        Ok(())
    }

    /// Current room of a connection (`None` when it is in no room).
    pub fn get_room(&self, id: &ConnectionId) -> Result<Option<RoomName>> {
        self.connections
            .get(id)
            .map(|entry| entry.room.clone())
            .ok_or_else(|| SignalingError::UnknownConnection(id.clone()))
    }

    /// Drop the room association. Unknown IDs are ignored.
    pub fn clear_room(&mut self, id: &ConnectionId) -> Option<RoomName> {
        self.connections
            .get_mut(id)
            .and_then(|entry| entry.room.take())
    }

    /// Delivery handle of a connection.
    pub fn sink(&self, id: &ConnectionId) -> Option<Arc<dyn PeerSink>> {
        self.connections.get(id).map(|entry| entry.sink.clone())
    }

    /// Whether the ID is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Iterate over `(id, room)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, Option<&RoomName>)> {
        self.connections
            .iter()
            .map(|(id, entry)| (id, entry.room.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::testing::RecordingSink;

    fn sink() -> Arc<dyn PeerSink> {
        Arc::new(RecordingSink::new())
    }

    fn room(name: &str) -> RoomName {
        RoomName::parse(name).unwrap()
    }

    #[test]
    fn register_starts_without_room() {
        let mut reg = ConnectionRegistry::new();
        reg.register("c1".into(), sink()).unwrap();
        assert_eq!(reg.get_room(&"c1".into()).unwrap(), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn register_twice_fails() {
        let mut reg = ConnectionRegistry::new();
        reg.register("c1".into(), sink()).unwrap();
        let err = reg.register("c1".into(), sink()).unwrap_err();
        assert_eq!(err, SignalingError::DuplicateConnection("c1".into()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn set_room_and_get_room() {
        let mut reg = ConnectionRegistry::new();
        reg.register("c1".into(), sink()).unwrap();
        reg.set_room(&"c1".into(), room("R")).unwrap();
        assert_eq!(reg.get_room(&"c1".into()).unwrap(), Some(room("R")));
    }

    #[test]
    fn set_room_overwrites() {
        let mut reg = ConnectionRegistry::new();
        reg.register("c1".into(), sink()).unwrap();
        reg.set_room(&"c1".into(), room("A")).unwrap();
        reg.set_room(&"c1".into(), room("B")).unwrap();
        assert_eq!(reg.get_room(&"c1".into()).unwrap(), Some(room("B")));
    }

    #[test]
    fn set_room_unknown_fails() {
        let mut reg = ConnectionRegistry::new();
        let err = reg.set_room(&"ghost".into(), room("R")).unwrap_err();
        assert_eq!(err, SignalingError::UnknownConnection("ghost".into()));
    }

    #[test]
    fn get_room_unknown_fails() {
        let reg = ConnectionRegistry::new();
        assert!(matches!(
            reg.get_room(&"ghost".into()),
            Err(SignalingError::UnknownConnection(_))
        ));
    }

    #[test]
    fn clear_room_is_idempotent() {
        let mut reg = ConnectionRegistry::new();
        reg.register("c1".into(), sink()).unwrap();
        reg.set_room(&"c1".into(), room("R")).unwrap();
        assert_eq!(reg.clear_room(&"c1".into()), Some(room("R")));
        assert_eq!(reg.clear_room(&"c1".into()), None);
        assert_eq!(reg.clear_room(&"ghost".into()), None);
        assert_eq!(reg.get_room(&"c1".into()).unwrap(), None);
    }

    #[test]
    fn unregister_returns_room_and_is_idempotent() {
        let mut reg = ConnectionRegistry::new();
        reg.register("c1".into(), sink()).unwrap();
        reg.set_room(&"c1".into(), room("R")).unwrap();
        assert_eq!(reg.unregister(&"c1".into()), Some(room("R")));
        assert_eq!(reg.unregister(&"c1".into()), None);
        assert!(reg.is_empty());
        assert!(!reg.contains(&"c1".into()));
    }

    #[test]
    fn sink_lookup() {
        let mut reg = ConnectionRegistry::new();
        reg.register("c1".into(), sink()).unwrap();
        assert!(reg.sink(&"c1".into()).is_some());
        assert!(reg.sink(&"c2".into()).is_none());
    }
}
