use std::collections::HashSet;
use std::fmt;
use std::sync::{MutexGuard, PoisonError};
use tokio::sync::{Mutex, mpsc};

/// A unit of reconcile work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueKey {
    Namespace(String),
    Project(String),
}

impl QueueKey {
    pub fn namespace(name: &str) -> Self {
        QueueKey::Namespace(name.to_string())
    }

    pub fn project(id: &str) -> Self {
        QueueKey::Project(id.to_string())
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueKey::Namespace(name) => write!(f, "namespace/{}", name),
            QueueKey::Project(id) => write!(f, "project/{}", id),
        }
    }
}

/// FIFO work queue shared by the controller workers.
///
/// A key that is already waiting is not queued a second time. A key a worker
/// has taken stays with that worker until `done`: adding it in the meantime
/// marks it dirty, and it is handed out again once `done` is called. No two
/// workers ever hold the same key.
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<QueueKey>,
    rx: Mutex<mpsc::UnboundedReceiver<QueueKey>>,
    state: std::sync::Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    /// Keys waiting to be processed, sent or deferred.
    dirty: HashSet<QueueKey>,
    /// Keys a worker has taken and not yet marked done.
    processing: HashSet<QueueKey>,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
            state: std::sync::Mutex::new(QueueState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, key: QueueKey) {
        let mut state = self.state();
        if !state.dirty.insert(key.clone()) || state.processing.contains(&key) {
            return;
        }
        // The receiver lives as long as `self`.
        let _ = self.tx.send(key);
    }

    /// Wait for the next key. The caller must hand it back with `done`.
    pub async fn next(&self) -> Option<QueueKey> {
        let key = self.rx.lock().await.recv().await?;
        self.take(&key);
        Some(key)
    }

    /// Take the next key if one is waiting.
    pub fn try_next(&self) -> Option<QueueKey> {
        let key = self.rx.try_lock().ok()?.try_recv().ok()?;
        self.take(&key);
        Some(key)
    }

    fn take(&self, key: &QueueKey) {
        let mut state = self.state();
        state.dirty.remove(key);
        state.processing.insert(key.clone());
    }

    /// Finish processing `key`. If it was added again meanwhile it goes back
    /// on the queue.
    pub fn done(&self, key: &QueueKey) {
        let mut state = self.state();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            let _ = self.tx.send(key.clone());
        }
    }

    pub fn contains(&self, key: &QueueKey) -> bool {
        self.state().dirty.contains(key)
    }

    pub fn len(&self) -> usize {
        self.state().dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().dirty.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicates_collapse_while_waiting() {
        let queue = WorkQueue::new();
        queue.add(QueueKey::namespace("a"));
        queue.add(QueueKey::namespace("a"));
        queue.add(QueueKey::project("a"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.next().await, Some(QueueKey::namespace("a")));
        assert_eq!(queue.next().await, Some(QueueKey::project("a")));
        assert!(queue.is_empty());
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn done_key_can_be_queued_again() {
        let queue = WorkQueue::new();
        let key = QueueKey::namespace("a");
        queue.add(key.clone());
        assert_eq!(queue.try_next(), Some(key.clone()));
        queue.done(&key);

        queue.add(key.clone());
        assert!(queue.contains(&key));
        assert_eq!(queue.try_next(), Some(key));
    }

    #[test]
    fn key_in_progress_is_held_back_until_done() {
        let queue = WorkQueue::new();
        let key = QueueKey::namespace("a");
        queue.add(key.clone());
        assert_eq!(queue.try_next(), Some(key.clone()));

        // Re-added while a worker holds it: deferred, and only once.
        queue.add(key.clone());
        queue.add(key.clone());
        assert!(queue.contains(&key));
        assert_eq!(queue.try_next(), None);

        queue.done(&key);
        assert_eq!(queue.try_next(), Some(key.clone()));
        queue.done(&key);
        assert_eq!(queue.try_next(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn done_without_re_add_queues_nothing() {
        let queue = WorkQueue::new();
        let key = QueueKey::project("p-1");
        queue.add(key.clone());
        assert_eq!(queue.try_next(), Some(key.clone()));
        queue.done(&key);
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn display() {
        assert_eq!(QueueKey::namespace("team-a").to_string(), "namespace/team-a");
        assert_eq!(QueueKey::project("p-1").to_string(), "project/p-1");
    }
}
