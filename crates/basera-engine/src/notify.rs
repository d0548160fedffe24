//! # Status Change Notifications
//!
//! Broadcast of room status changes to interested listeners (front desk
//! dashboard, housekeeping board). Delivery is fire-and-forget: a slow
//! or absent listener never delays or fails the transition that caused
//! the event.

use tokio::sync::broadcast;
use tracing::debug;

use basera_core::types::RoomStatus;

/// A room status change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub room_id: String,
    pub from: RoomStatus,
    pub to: RoomStatus,
}

/// Broadcast channel for room status changes.
///
/// Wraps `tokio::sync::broadcast`: sending never blocks, and lagging
/// receivers drop old events rather than backpressuring the sender.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    tx: broadcast::Sender<StatusChange>,
}

impl StatusNotifier {
    /// Creates a notifier with the given event buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        StatusNotifier { tx }
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.tx.subscribe()
    }

    /// Publishes a status change.
    ///
    /// A send error only means no one is listening, which is fine.
    pub fn publish(&self, change: StatusChange) {
        debug!(
            room_id = %change.room_id,
            from = ?change.from,
            to = ?change.to,
            "Publishing status change"
        );

        let _ = self.tx.send(change);
    }
}

impl Default for StatusNotifier {
    fn default() -> Self {
        StatusNotifier::new(64)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_changes() {
        let notifier = StatusNotifier::new(8);
        let mut rx = notifier.subscribe();

        notifier.publish(StatusChange {
            room_id: "room-101".into(),
            from: RoomStatus::VacantClean,
            to: RoomStatus::OccupiedClean,
        });

        let change = rx.recv().await.unwrap();
        assert_eq!(change.room_id, "room-101");
        assert_eq!(change.to, RoomStatus::OccupiedClean);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let notifier = StatusNotifier::default();
        notifier.publish(StatusChange {
            room_id: "room-101".into(),
            from: RoomStatus::OccupiedClean,
            to: RoomStatus::OccupiedDirty,
        });
    }
}
