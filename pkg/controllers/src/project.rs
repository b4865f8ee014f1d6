use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::queue::{QueueKey, WorkQueue};
use pkg_state::client::StateStore;
use pkg_state::index::NamespaceIndex;
use pkg_types::project::{Project, ProjectSpec};
use pkg_types::quota::ResourceQuotaLimit;

/// Handles project changes the per-namespace controllers cannot see.
///
/// An empty project has its `used_limit` cleared. A project with members has
/// them all re-enqueued whenever its templates or cap change, which is how a
/// template edit reaches existing namespaces. Writes to `used_limit` alone do
/// not re-enqueue anything.
pub struct ProjectQuotaController {
    store: StateStore,
    index: Arc<NamespaceIndex>,
    queue: Arc<WorkQueue>,
    /// Usage-free spec last propagated to members, per project. Starts empty,
    /// so the startup resync re-enqueues every member of every project once.
    propagated: DashMap<String, ProjectSpec>,
}

impl ProjectQuotaController {
    pub fn new(store: StateStore, index: Arc<NamespaceIndex>, queue: Arc<WorkQueue>) -> Self {
        Self {
            store,
            index,
            queue,
            propagated: DashMap::new(),
        }
    }

    pub async fn sync(&self, project_id: &str, project: Option<&Project>) -> anyhow::Result<()> {
        let Some(project) = project.filter(|p| !p.is_deleting()) else {
            self.propagated.remove(project_id);
            return Ok(());
        };

        let members = self.index.by_project(project_id);
        if members.is_empty() {
            return self.reset_used_limit(project).await;
        }

        let template = project.spec.without_usage();
        if self
            .propagated
            .get(project_id)
            .is_some_and(|seen| *seen == template)
        {
            debug!("Project {} templates unchanged", project_id);
            return Ok(());
        }
        self.propagated.insert(project_id.to_string(), template);

        info!(
            "Project {} changed, re-enqueuing {} namespaces",
            project_id,
            members.len()
        );
        for ns in members {
            self.queue.add(QueueKey::namespace(&ns.name));
        }
        Ok(())
    }

    async fn reset_used_limit(&self, project: &Project) -> anyhow::Result<()> {
        if project.used_limit().is_none_or(ResourceQuotaLimit::is_empty) {
            return Ok(());
        }
        info!("Project {} has no namespaces, clearing used limit", project.id);
        let mut updated = project.clone();
        if let Some(quota) = updated.spec.resource_quota.as_mut() {
            quota.used_limit = ResourceQuotaLimit::default();
        }
        self.store.update_resource(updated).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{add_namespace, get_project, limit, project, store};
    use pkg_types::namespace::Namespace;

    async fn setup() -> (
        StateStore,
        Arc<NamespaceIndex>,
        Arc<WorkQueue>,
        ProjectQuotaController,
    ) {
        let store = store().await;
        let index = Arc::new(NamespaceIndex::new());
        let queue = Arc::new(WorkQueue::new());
        let controller = ProjectQuotaController::new(store.clone(), index.clone(), queue.clone());
        (store, index, queue, controller)
    }

    #[tokio::test]
    async fn empty_project_usage_is_cleared() {
        let (store, _index, _queue, controller) = setup().await;
        let mut p = project("p-1", Some(&[("pods", "3")]), Some(&[("pods", "2")]));
        p.spec.resource_quota.as_mut().unwrap().used_limit = limit(&[("pods", "2")]);
        let p = store.create_resource(p).await.unwrap();

        controller.sync("p-1", Some(&p)).await.unwrap();
        let p = get_project(&store, "p-1").await;
        assert_eq!(p.used_limit(), Some(&ResourceQuotaLimit::default()));
        assert_eq!(p.aggregate_limit(), Some(&limit(&[("pods", "3")])));

        // Already empty: nothing to write.
        controller.sync("p-1", Some(&p)).await.unwrap();
        assert_eq!(get_project(&store, "p-1").await.resource_version, p.resource_version);
    }

    #[tokio::test]
    async fn template_change_re_enqueues_members() {
        let (store, index, queue, controller) = setup().await;
        let p = store
            .create_resource(project("p-1", Some(&[("pods", "3")]), Some(&[("pods", "2")])))
            .await
            .unwrap();
        add_namespace(&store, &index, Namespace::in_project("a", "p-1")).await;
        add_namespace(&store, &index, Namespace::in_project("b", "p-1")).await;
        add_namespace(&store, &index, Namespace::in_project("other", "p-2")).await;

        controller.sync("p-1", Some(&p)).await.unwrap();
        assert_eq!(queue.len(), 2);
        assert!(queue.contains(&QueueKey::namespace("a")));
        assert!(queue.contains(&QueueKey::namespace("b")));
        while let Some(key) = queue.try_next() {
            queue.done(&key);
        }

        // A usage-only change is not propagated.
        let mut usage_only = p.clone();
        usage_only.spec.resource_quota.as_mut().unwrap().used_limit = limit(&[("pods", "2")]);
        controller.sync("p-1", Some(&usage_only)).await.unwrap();
        assert!(queue.is_empty());

        let mut edited = usage_only;
        edited.spec.namespace_default_resource_quota = None;
        controller.sync("p-1", Some(&edited)).await.unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn missing_or_deleting_project_is_ignored() {
        let (store, index, queue, controller) = setup().await;
        add_namespace(&store, &index, Namespace::in_project("a", "p-1")).await;
        controller.sync("p-1", None).await.unwrap();

        let mut p = project("p-1", Some(&[("pods", "3")]), None);
        p.deletion_timestamp = Some(chrono::Utc::now());
        controller.sync("p-1", Some(&p)).await.unwrap();
        assert!(queue.is_empty());
    }
}
