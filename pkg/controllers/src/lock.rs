use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Exclusive lock serializing quota validation within one project.
pub type ProjectLock = Arc<Mutex<()>>;

struct LockEntry {
    lock: ProjectLock,
    last_used: Instant,
}

impl LockEntry {
    /// A handle is still out there (a worker holds or waits on the lock).
    fn in_use(&self) -> bool {
        Arc::strong_count(&self.lock) > 1
    }
}

/// Per-project mutual exclusion.
///
/// Locks are created on first use and remembered for `ttl` after their last
/// use. Once `capacity` entries exist, idle entries past their TTL are dropped
/// first, then the least recently used idle ones. An entry whose lock is still
/// referenced is never evicted, so two callers can never end up holding
/// different locks for the same project.
pub struct ProjectLockManager {
    locks: DashMap<String, LockEntry>,
    ttl: Duration,
    capacity: usize,
}

impl ProjectLockManager {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            locks: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// The lock for `project_id`, created if needed.
    pub fn get_lock(&self, project_id: &str) -> ProjectLock {
        let now = Instant::now();
        if let Some(mut entry) = self.locks.get_mut(project_id) {
            entry.last_used = now;
            return entry.lock.clone();
        }

        if self.locks.len() >= self.capacity {
            self.evict(now);
        }

        let mut entry = self
            .locks
            .entry(project_id.to_string())
            .or_insert_with(|| LockEntry {
                lock: Arc::new(Mutex::new(())),
                last_used: now,
            });
        entry.last_used = now;
        entry.lock.clone()
    }

    fn evict(&self, now: Instant) {
        self.locks
            .retain(|_, entry| entry.in_use() || now.duration_since(entry.last_used) < self.ttl);
        if self.locks.len() < self.capacity {
            return;
        }

        let mut idle: Vec<(String, Instant)> = self
            .locks
            .iter()
            .filter(|entry| !entry.in_use())
            .map(|entry| (entry.key().clone(), entry.last_used))
            .collect();
        idle.sort_by_key(|(_, last_used)| *last_used);

        let excess = self.locks.len() + 1 - self.capacity;
        for (project_id, _) in idle.into_iter().take(excess) {
            self.locks.remove_if(&project_id, |_, entry| !entry.in_use());
        }
    }

    #[cfg(test)]
    fn contains(&self, project_id: &str) -> bool {
        self.locks.contains_key(project_id)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
