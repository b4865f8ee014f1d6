use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::broadcast;

/// Type of event in the watch stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Put,
    Delete,
}

/// A single watch event representing a state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEvent {
    pub seq: u64,
    pub event_type: EventType,
    pub key: String,
    /// New value for `Put`, `None` for `Delete`.
    #[serde(default)]
    pub value: Option<Vec<u8>>,
}

impl WatchEvent {
    /// The remainder of the key after `prefix`, if the event falls under it.
    /// `/registry/namespaces/team-a` under `/registry/namespaces/` → `team-a`.
    pub fn name_under(&self, prefix: &str) -> Option<&str> {
        self.key
            .strip_prefix(prefix)
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }
}

/// Change stream of all state mutations with monotonic sequence numbers.
/// Subscribers receive every event and filter by key prefix themselves; one
/// that falls more than `capacity` events behind sees `Lagged` and must resync.
#[derive(Clone)]
pub struct EventLog {
    seq: Arc<Mutex<u64>>,
    sender: broadcast::Sender<WatchEvent>,
}

impl EventLog {
    /// Create a new event log buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            seq: Arc::new(Mutex::new(0)),
            sender,
        }
    }

    /// Record a new event. Called by StateStore on put/delete.
    pub async fn emit(&self, event_type: EventType, key: String, value: Option<Vec<u8>>) {
        let mut seq = self.seq.lock().await;
        *seq += 1;
        let event = WatchEvent {
            seq: *seq,
            event_type,
            key,
            value,
        };
        // No receivers is fine: nobody is watching yet.
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive new events as they are emitted.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sequence_numbers_increase() {
        let log = EventLog::new(16);
        let mut rx = log.subscribe();
        for i in 0..3 {
            log.emit(EventType::Put, format!("/registry/namespaces/ns-{}", i), None)
                .await;
        }
        for expected in 1..=3 {
            assert_eq!(rx.recv().await.unwrap().seq, expected);
        }
    }

    #[tokio::test]
    async fn slow_subscriber_lags() {
        let log = EventLog::new(2);
        let mut rx = log.subscribe();
        for i in 0..3 {
            log.emit(EventType::Put, format!("/registry/namespaces/ns-{}", i), None)
                .await;
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn subscribers_see_new_events() {
        let log = EventLog::new(16);
        let mut rx = log.subscribe();
        log.emit(EventType::Delete, "/registry/projects/p-1".into(), None)
            .await;
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::Delete);
        assert_eq!(event.name_under("/registry/projects/"), Some("p-1"));
        assert_eq!(event.name_under("/registry/namespaces/"), None);
    }

    #[test]
    fn name_under_rejects_nested_keys() {
        let event = WatchEvent {
            seq: 1,
            event_type: EventType::Put,
            key: "/registry/resourcequotas/team-a/default-1".into(),
            value: None,
        };
        assert_eq!(event.name_under("/registry/resourcequotas/"), None);
    }
}
