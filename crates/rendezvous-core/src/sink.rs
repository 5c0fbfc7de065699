//! Outbound delivery seam between the hub and the transport.

use crate::protocol::ServerMessage;

/// Why a message could not be handed to a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The peer's transport is already gone.
    #[error("peer connection closed")]
    Closed,
    /// The peer's bounded outbound queue is full.
    #[error("peer outbound queue full")]
    Backlogged,
}

/// Handle used to push events to one connected client.
///
/// Implementations must not block: a slow peer reports
/// [`DeliveryError::Backlogged`] instead of waiting.
pub trait PeerSink: Send + Sync {
    /// Enqueue a message for the peer.
    fn deliver(&self, message: &ServerMessage) -> Result<(), DeliveryError>;

    /// Ask the transport to tear the connection down.
    fn close(&self);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording sink used by the core unit tests.

    use std::sync::atomic::{AtomicBool, Ordering};

    use parking_lot::Mutex;

    use super::{DeliveryError, PeerSink};
    use crate::protocol::ServerMessage;

    /// Sink that records everything it receives.
    #[derive(Default)]
    pub struct RecordingSink {
        messages: Mutex<Vec<ServerMessage>>,
        capacity: Option<usize>,
        closed: AtomicBool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sink that reports `Backlogged` once it holds `capacity` messages.
        pub fn bounded(capacity: usize) -> Self {
            Self {
                capacity: Some(capacity),
                ..Self::default()
            }
        }

        pub fn take(&self) -> Vec<ServerMessage> {
            std::mem::take(&mut *self.messages.lock())
        }

        pub fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl PeerSink for RecordingSink {
        fn deliver(&self, message: &ServerMessage) -> Result<(), DeliveryError> {
            if self.is_closed() {
                return Err(DeliveryError::Closed);
            }
            let mut messages = self.messages.lock();
            if self.capacity.is_some_and(|cap| messages.len() >= cap) {
                return Err(DeliveryError::Backlogged);
            }
            messages.push(message.clone());
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}
