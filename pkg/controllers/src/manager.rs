use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::lock::ProjectLockManager;
use crate::project::ProjectQuotaController;
use crate::queue::{QueueKey, WorkQueue};
use crate::resource_quota::ResourceQuotaSyncController;
use crate::usage::ProjectUsageController;
use pkg_constants::quota::{
    DEFAULT_WORKERS, PROJECT_LOCK_CAPACITY, PROJECT_LOCK_TTL_SECS, RETRY_BASE_MILLIS,
    RETRY_MAX_SECS,
};
use pkg_constants::state::{NAMESPACE_PREFIX, PROJECT_PREFIX};
use pkg_state::client::StateStore;
use pkg_state::error::StoreError;
use pkg_state::index::NamespaceIndex;
use pkg_state::watch::{EventType, WatchEvent};
use pkg_types::namespace::Namespace;
use pkg_types::project::Project;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub workers: usize,
    pub lock_ttl: Duration,
    pub lock_capacity: usize,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            lock_ttl: Duration::from_secs(PROJECT_LOCK_TTL_SECS),
            lock_capacity: PROJECT_LOCK_CAPACITY,
            retry_base: Duration::from_millis(RETRY_BASE_MILLIS),
            retry_max: Duration::from_secs(RETRY_MAX_SECS),
        }
    }
}

/// Wires the quota controllers to the store's change stream.
///
/// Namespace and project events keep the index current and feed a shared
/// work queue. Workers take keys off the queue:
/// - a namespace runs the resource quota sync, then its project's usage;
/// - a project runs the project controller, then its usage.
///
/// A key is processed by one worker at a time. Failed keys are re-queued with
/// exponential backoff.
pub struct QuotaControllerManager {
    store: StateStore,
    index: Arc<NamespaceIndex>,
    queue: Arc<WorkQueue>,
    resource_quota: ResourceQuotaSyncController,
    usage: ProjectUsageController,
    projects: ProjectQuotaController,
    /// Consecutive failures per key, cleared on success.
    failures: DashMap<QueueKey, u32>,
    config: ControllerConfig,
}

impl QuotaControllerManager {
    pub fn new(store: StateStore, config: ControllerConfig) -> Self {
        let index = Arc::new(NamespaceIndex::new());
        let queue = Arc::new(WorkQueue::new());
        let locks = Arc::new(ProjectLockManager::new(
            config.lock_ttl,
            config.lock_capacity,
        ));
        Self {
            resource_quota: ResourceQuotaSyncController::new(store.clone(), index.clone(), locks),
            usage: ProjectUsageController::new(store.clone(), index.clone()),
            projects: ProjectQuotaController::new(store.clone(), index.clone(), queue.clone()),
            store,
            index,
            queue,
            failures: DashMap::new(),
            config,
        }
    }

    pub fn index(&self) -> &NamespaceIndex {
        &self.index
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Start the event pump and the workers as a background task. Aborting
    /// the returned handle stops the workers too.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "QuotaControllerManager started (workers={}, lock_ttl={}s, lock_capacity={})",
                self.config.workers,
                self.config.lock_ttl.as_secs(),
                self.config.lock_capacity
            );
            // Subscribe before listing so nothing written in between is missed.
            let mut event_rx = self.store.event_log.subscribe();
            if let Err(e) = self.resync().await {
                warn!("QuotaControllerManager resync error: {}", e);
            }

            let mut workers = JoinSet::new();
            for id in 0..self.config.workers.max(1) {
                workers.spawn(self.clone().run_worker(id));
            }

            loop {
                match event_rx.recv().await {
                    Ok(event) => self.observe(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            "QuotaControllerManager lagged {} events behind, resyncing",
                            skipped
                        );
                        if let Err(e) = self.resync().await {
                            warn!("QuotaControllerManager resync error: {}", e);
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            workers.shutdown().await;
        })
    }

    /// Rebuild the index from the store and queue every namespace and project.
    pub async fn resync(&self) -> anyhow::Result<()> {
        let namespaces: Vec<Namespace> = self.store.list_resources(NAMESPACE_PREFIX).await?;
        let projects: Vec<Project> = self.store.list_resources(PROJECT_PREFIX).await?;
        info!(
            "Resyncing {} namespaces and {} projects",
            namespaces.len(),
            projects.len()
        );

        self.index.rebuild(namespaces.iter().cloned());
        for ns in &namespaces {
            self.queue.add(QueueKey::namespace(&ns.name));
        }
        for project in &projects {
            self.queue.add(QueueKey::project(&project.id));
        }
        Ok(())
    }

    /// Apply one change event to the index and queue the affected keys.
    pub fn observe(&self, event: &WatchEvent) {
        if let Some(name) = event.name_under(NAMESPACE_PREFIX) {
            self.observe_namespace(name, event);
        } else if let Some(project_id) = event.name_under(PROJECT_PREFIX) {
            self.queue.add(QueueKey::project(project_id));
        }
    }

    fn observe_namespace(&self, name: &str, event: &WatchEvent) {
        let previous_project = match event.event_type {
            EventType::Put => {
                let Some(value) = event.value.as_deref() else {
                    return;
                };
                match serde_json::from_slice::<Namespace>(value) {
                    Ok(ns) => self.index.upsert(&ns),
                    Err(e) => {
                        warn!("Skipping undecodable namespace {}: {}", name, e);
                        return;
                    }
                }
            }
            EventType::Delete => self.index.remove(name).and_then(|ns| ns.project_id),
        };

        self.queue.add(QueueKey::namespace(name));
        if let Some(project_id) = previous_project {
            self.queue.add(QueueKey::project(&project_id));
        }
    }

    /// Run the controllers for one key against the current stored state.
    pub async fn process(&self, key: &QueueKey) -> anyhow::Result<()> {
        match key {
            QueueKey::Namespace(name) => {
                let ns: Option<Namespace> =
                    self.store.get_resource(&Namespace::key_for(name)).await?;
                self.resource_quota.sync(name, ns.as_ref()).await?;
                if let Some(project_id) = ns.as_ref().and_then(|ns| ns.project_id.as_deref()) {
                    self.usage.sync(project_id).await?;
                }
            }
            QueueKey::Project(project_id) => {
                let project: Option<Project> = self
                    .store
                    .get_resource(&Project::key_for(project_id))
                    .await?;
                self.projects.sync(project_id, project.as_ref()).await?;
                self.usage.sync(project_id).await?;
            }
        }
        Ok(())
    }

    async fn run_worker(self: Arc<Self>, id: usize) {
        debug!("Quota worker {} started", id);
        while let Some(key) = self.queue.next().await {
            match self.process(&key).await {
                Ok(()) => {
                    self.failures.remove(&key);
                }
                Err(e) => self.retry_later(key.clone(), e),
            }
            self.queue.done(&key);
        }
    }

    fn retry_later(&self, key: QueueKey, err: anyhow::Error) {
        let attempts = {
            let mut count = self.failures.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let delay = self.backoff(attempts);
        if err
            .downcast_ref::<StoreError>()
            .is_some_and(StoreError::is_conflict)
        {
            debug!(
                "Sync of {} hit a stale copy, retrying in {}ms",
                key,
                delay.as_millis()
            );
        } else {
            warn!(
                "Sync of {} failed (attempt {}), retrying in {}ms: {}",
                key,
                attempts,
                delay.as_millis(),
                err
            );
        }

        let queue = self.queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        self.config
            .retry_base
            .saturating_mul(1u32 << exponent)
            .min(self.config.retry_max)
    }
}
