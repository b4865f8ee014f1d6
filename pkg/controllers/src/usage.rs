use std::sync::Arc;
use tracing::{debug, info};

use pkg_quota::derive_namespace_quota;
use pkg_state::client::StateStore;
use pkg_state::index::NamespaceIndex;
use pkg_types::namespace::Namespace;
use pkg_types::project::Project;
use pkg_types::quantity::Quantity;
use pkg_types::quota::ResourceQuotaLimit;
use pkg_types::resources::ResourceAmountSet;

/// Maintains `used_limit` on each project: the sum of the effective quotas of
/// its validated, live namespaces. Every resource the cap declares is present,
/// at zero when nothing uses it.
pub struct ProjectUsageController {
    store: StateStore,
    index: Arc<NamespaceIndex>,
}

impl ProjectUsageController {
    pub fn new(store: StateStore, index: Arc<NamespaceIndex>) -> Self {
        Self { store, index }
    }

    pub async fn sync(&self, project_id: &str) -> anyhow::Result<()> {
        let Some(project) = self
            .store
            .get_resource::<Project>(&Project::key_for(project_id))
            .await?
        else {
            debug!("Project {} not found, skipping usage", project_id);
            return Ok(());
        };
        if project.is_deleting() {
            return Ok(());
        }
        let Some(cap) = project.aggregate_limit() else {
            return Ok(());
        };

        let members = self.index.by_project(project_id);
        if members.is_empty() {
            // An empty project is reset by the project controller.
            return Ok(());
        }

        let mut used: ResourceAmountSet = ResourceAmountSet::from_list(&cap.to_resource_list())?
            .keys()
            .map(|name| (name.clone(), Quantity::zero()))
            .collect();
        for member in members {
            let Some(ns) = self
                .store
                .get_resource::<Namespace>(&Namespace::key_for(&member.name))
                .await?
            else {
                continue;
            };
            if ns.is_deleting()
                || !ns.is_quota_valid()
                || ns.project_id.as_deref() != Some(project_id)
            {
                continue;
            }
            if let Some(effective) = derive_namespace_quota(
                ns.resource_quota.as_ref().map(|q| &q.limit),
                project.namespace_default_limit(),
            ) {
                used.add(&ResourceAmountSet::from_list(&effective.to_resource_list())?);
            }
        }

        let used_limit = ResourceQuotaLimit::from_resource_list(&used.to_list());
        if project.used_limit() == Some(&used_limit) {
            debug!("Usage of project {} is up to date", project_id);
            return Ok(());
        }

        info!("Updating used limit of project {} to [{}]", project_id, used);
        let mut updated = project.clone();
        if let Some(quota) = updated.spec.resource_quota.as_mut() {
            quota.used_limit = used_limit;
        }
        self.store.update_resource(updated).await?;
        Ok(())
    }
}
