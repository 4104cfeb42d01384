//! Broadcast of scan outcomes.
//!
//! The scan engine publishes one event per finished pass so that long-running
//! surfaces (the daemon, tests) can observe rescans the watcher triggers.

use std::path::PathBuf;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Completed {
        project: String,
        root: PathBuf,
        annotations: usize,
        resolved: usize,
    },
    Failed {
        project: String,
        root: PathBuf,
        reason: String,
    },
    ProjectRemoved {
        project: String,
    },
}

impl ScanEvent {
    pub fn project(&self) -> &str {
        match self {
            ScanEvent::Completed { project, .. }
            | ScanEvent::Failed { project, .. }
            | ScanEvent::ProjectRemoved { project } => project,
        }
    }
}

/// Fan-out of [`ScanEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct NotificationBroadcaster {
    sender: broadcast::Sender<ScanEvent>,
}

impl NotificationBroadcaster {
    /// Create a new broadcaster with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn send(&self, event: ScanEvent) {
        match self.sender.send(event) {
            Ok(count) => {
                crate::debug_event!("broadcast", "sent", "to {count} subscribers");
            }
            Err(broadcast::error::SendError(event)) => {
                // No receivers, this is fine
                crate::debug_event!("broadcast", "dropped", "no subscribers for {event:?}");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.sender.subscribe()
    }
}

impl Default for NotificationBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let broadcaster = NotificationBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();

        broadcaster.send(ScanEvent::ProjectRemoved {
            project: "old".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.project(), "old");
    }

    #[test]
    fn test_send_without_subscribers_is_harmless() {
        let broadcaster = NotificationBroadcaster::default();
        broadcaster.send(ScanEvent::Failed {
            project: "p".to_string(),
            root: PathBuf::from("/p"),
            reason: "gone".to_string(),
        });
    }
}
