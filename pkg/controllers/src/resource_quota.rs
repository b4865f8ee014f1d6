use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::lock::ProjectLockManager;
use pkg_constants::quota::{
    DEFAULT_OBJECT_NAME_PREFIX, RESOURCE_QUOTA_INIT_CONDITION, RESOURCE_QUOTA_LABEL,
    RESOURCE_QUOTA_VALIDATED_CONDITION,
};
use pkg_quota::{
    QuotaFit, SyncOp, decide_limit_range_op, decide_quota_op, derive_container_limit,
    derive_namespace_quota, exceeded_message, is_quota_fit, limit_range_spec, quota_spec,
    zero_out_exceeded,
};
use pkg_state::client::StateStore;
use pkg_state::index::NamespaceIndex;
use pkg_types::limit_range::{LimitRange, LimitRangeSpec};
use pkg_types::meta::Resource;
use pkg_types::namespace::Namespace;
use pkg_types::project::Project;
use pkg_types::quota::{
    NamespaceResourceQuota, ResourceQuota, ResourceQuotaLimit, ResourceQuotaSpec,
};

/// Outcome of validating a namespace quota against its project cap.
struct Validation {
    /// The namespace as stored after recording the effective quota and status.
    namespace: Namespace,
    fit: QuotaFit,
}

/// Keeps each namespace's owned resource quota and limit range in line with
/// its effective quota, and records whether that quota fits the project cap.
///
/// Only objects carrying `RESOURCE_QUOTA_LABEL` are touched; anything else in
/// the namespace belongs to someone else.
pub struct ResourceQuotaSyncController {
    store: StateStore,
    index: Arc<NamespaceIndex>,
    locks: Arc<ProjectLockManager>,
}

impl ResourceQuotaSyncController {
    pub fn new(
        store: StateStore,
        index: Arc<NamespaceIndex>,
        locks: Arc<ProjectLockManager>,
    ) -> Self {
        Self {
            store,
            index,
            locks,
        }
    }

    /// Reconcile one namespace. `namespace` is its current stored state, or
    /// `None` once it is gone.
    ///
    /// A namespace in a project is reconciled under that project's lock, from
    /// reading its owned objects to writing them, so concurrent syncs of the
    /// same namespace or of siblings are serialized.
    pub async fn sync(&self, name: &str, namespace: Option<&Namespace>) -> anyhow::Result<()> {
        let namespace = match namespace {
            Some(ns) if !ns.is_deleting() => ns.clone(),
            _ => return self.remove_owned_objects(name).await,
        };

        let Some(project_id) = namespace.project_id.clone() else {
            let namespace = self.sync_resource_quota(namespace, None).await?;
            return self.sync_limit_range(&namespace, None).await;
        };

        let _guard = self.locks.get_lock(&project_id).lock_owned().await;
        // Re-read under the lock: another sync may have written it meanwhile.
        let Some(namespace) = self
            .store
            .get_resource::<Namespace>(&Namespace::key_for(name))
            .await?
            .filter(|ns| !ns.is_deleting() && ns.project_id.as_deref() == Some(project_id.as_str()))
        else {
            debug!("Namespace {} changed while waiting, skipping", name);
            return Ok(());
        };

        let Some(project) = self
            .store
            .get_resource::<Project>(&Project::key_for(&project_id))
            .await?
        else {
            debug!(
                "Project {} of namespace {} not found, leaving quota as is",
                project_id, name
            );
            self.mark_initialized(namespace).await?;
            return Ok(());
        };

        let namespace = self
            .sync_resource_quota(namespace, Some(&project))
            .await?;
        self.sync_limit_range(&namespace, Some(&project)).await
    }

    async fn sync_resource_quota(
        &self,
        namespace: Namespace,
        project: Option<&Project>,
    ) -> anyhow::Result<Namespace> {
        let existing: Option<ResourceQuota> = self
            .owned_object(&ResourceQuota::namespace_prefix(&namespace.name))
            .await?;
        let desired = derive_namespace_quota(
            namespace.resource_quota.as_ref().map(|q| &q.limit),
            project.and_then(Project::namespace_default_limit),
        );
        let desired_spec = desired.as_ref().map(quota_spec).transpose()?;
        let op = decide_quota_op(existing.as_ref().map(|q| &q.spec), desired_spec.as_ref())?;

        let namespace = match (op, existing, desired, desired_spec) {
            (SyncOp::Create, _, Some(limit), Some(spec)) => {
                self.create_quota(namespace, project, &limit, spec).await?
            }
            (SyncOp::Update, Some(existing), Some(limit), Some(spec)) => {
                self.update_quota(namespace, project, existing, &limit, spec)
                    .await?
            }
            (SyncOp::Delete, Some(existing), _, _) => self.delete_quota(namespace, existing).await?,
            _ => {
                debug!("Resource quota of namespace {} is up to date", namespace.name);
                namespace
            }
        };
        self.mark_initialized(namespace).await
    }

    async fn create_quota(
        &self,
        namespace: Namespace,
        project: Option<&Project>,
        limit: &ResourceQuotaLimit,
        spec: ResourceQuotaSpec,
    ) -> anyhow::Result<Namespace> {
        let validation = self.validate(namespace, project, limit).await?;
        let spec = match &validation.fit {
            QuotaFit::Fits => spec,
            QuotaFit::Exceeded(exceeded) => quota_spec(&zero_out_exceeded(limit, exceeded))?,
        };

        let quota = ResourceQuota {
            name: generate_name(),
            namespace: validation.namespace.name.clone(),
            labels: owned_labels(),
            spec,
            resource_version: 0,
            created_at: Utc::now(),
        };
        info!(
            "Creating default resource quota {} for namespace {}",
            quota.name, quota.namespace
        );
        self.store.create_resource(quota).await?;
        Ok(validation.namespace)
    }

    async fn update_quota(
        &self,
        namespace: Namespace,
        project: Option<&Project>,
        mut existing: ResourceQuota,
        limit: &ResourceQuotaLimit,
        spec: ResourceQuotaSpec,
    ) -> anyhow::Result<Namespace> {
        let validation = self.validate(namespace, project, limit).await?;
        if let Some(exceeded) = validation.fit.exceeded() {
            info!(
                "Keeping resource quota {} of namespace {}: [{}] exceeds project limit",
                existing.name, existing.namespace, exceeded
            );
            return Ok(validation.namespace);
        }

        info!(
            "Updating default resource quota {} for namespace {}",
            existing.name, existing.namespace
        );
        existing.spec = spec;
        self.store.update_resource(existing).await?;
        Ok(validation.namespace)
    }

    /// The namespace no longer derives a quota: drop the object and the
    /// recorded effective quota with it.
    async fn delete_quota(
        &self,
        namespace: Namespace,
        existing: ResourceQuota,
    ) -> anyhow::Result<Namespace> {
        info!(
            "Deleting default resource quota {} for namespace {}",
            existing.name, existing.namespace
        );
        self.delete_owned(&existing).await?;

        if namespace.resource_quota.is_none() {
            return Ok(namespace);
        }
        let mut updated = namespace;
        updated.resource_quota = None;
        Ok(self.store.update_resource(updated).await?)
    }

    /// Check `limit` against the project cap and record the result on the
    /// namespace. Without a cap every quota fits and nothing is recorded.
    /// Runs under the project lock.
    async fn validate(
        &self,
        namespace: Namespace,
        project: Option<&Project>,
        limit: &ResourceQuotaLimit,
    ) -> anyhow::Result<Validation> {
        let Some((project, project_limit)) =
            project.and_then(|p| p.aggregate_limit().map(|cap| (p, cap)))
        else {
            return Ok(Validation {
                namespace,
                fit: QuotaFit::Fits,
            });
        };

        let siblings = self.sibling_limits(&namespace.name, &project.id).await?;
        let fit = is_quota_fit(limit, &siblings, project_limit)?;
        let message = fit.exceeded().map(exceeded_message).unwrap_or_default();

        let effective = NamespaceResourceQuota {
            limit: limit.clone(),
        };
        let mut updated = namespace.clone();
        let mut changed = updated.resource_quota.as_ref() != Some(&effective);
        updated.resource_quota = Some(effective);
        changed |= updated.set_condition(RESOURCE_QUOTA_VALIDATED_CONDITION, fit.fits(), &message);

        let namespace = if changed {
            if fit.fits() {
                info!("Resource quota of namespace {} fits project {}", namespace.name, project.id);
            } else {
                warn!("Namespace {}: {}", namespace.name, message);
            }
            self.store.update_resource(updated).await?
        } else {
            namespace
        };

        Ok(Validation { namespace, fit })
    }

    /// Recorded quotas of the other live members of `project_id`, read fresh
    /// from the store.
    async fn sibling_limits(
        &self,
        name: &str,
        project_id: &str,
    ) -> anyhow::Result<Vec<ResourceQuotaLimit>> {
        let mut limits = Vec::new();
        for member in self.index.by_project(project_id) {
            if member.name == name {
                continue;
            }
            let Some(sibling) = self
                .store
                .get_resource::<Namespace>(&Namespace::key_for(&member.name))
                .await?
            else {
                continue;
            };
            if sibling.is_deleting() || sibling.project_id.as_deref() != Some(project_id) {
                continue;
            }
            if let Some(quota) = sibling.resource_quota {
                limits.push(quota.limit);
            }
        }
        Ok(limits)
    }

    async fn mark_initialized(&self, namespace: Namespace) -> anyhow::Result<Namespace> {
        if namespace.is_quota_initialized() {
            return Ok(namespace);
        }
        let mut updated = namespace;
        updated.set_condition(RESOURCE_QUOTA_INIT_CONDITION, true, "");
        Ok(self.store.update_resource(updated).await?)
    }

    async fn sync_limit_range(
        &self,
        namespace: &Namespace,
        project: Option<&Project>,
    ) -> anyhow::Result<()> {
        let existing: Option<LimitRange> = self
            .owned_object(&LimitRange::namespace_prefix(&namespace.name))
            .await?;
        let desired = derive_container_limit(
            namespace.container_default_resource_limit.as_ref(),
            project.and_then(|p| p.spec.container_default_resource_limit.as_ref()),
        );
        let desired_spec: Option<LimitRangeSpec> =
            desired.as_ref().map(limit_range_spec).transpose()?;
        let op = decide_limit_range_op(existing.as_ref().map(|l| &l.spec), desired_spec.as_ref())?;

        match (op, existing, desired_spec) {
            (SyncOp::Create, _, Some(spec)) => {
                let limit_range = LimitRange {
                    name: generate_name(),
                    namespace: namespace.name.clone(),
                    labels: owned_labels(),
                    spec,
                    resource_version: 0,
                    created_at: Utc::now(),
                };
                info!(
                    "Creating default limit range {} for namespace {}",
                    limit_range.name, limit_range.namespace
                );
                self.store.create_resource(limit_range).await?;
            }
            (SyncOp::Update, Some(mut existing), Some(spec)) => {
                info!(
                    "Updating default limit range {} for namespace {}",
                    existing.name, existing.namespace
                );
                existing.spec = spec;
                self.store.update_resource(existing).await?;
            }
            (SyncOp::Delete, Some(existing), _) => {
                info!(
                    "Deleting default limit range {} for namespace {}",
                    existing.name, existing.namespace
                );
                self.delete_owned(&existing).await?;
            }
            _ => debug!("Limit range of namespace {} is up to date", namespace.name),
        }
        Ok(())
    }

    /// The namespace is gone or going: delete whatever this controller created
    /// in it.
    async fn remove_owned_objects(&self, name: &str) -> anyhow::Result<()> {
        let quotas: Vec<ResourceQuota> = self
            .store
            .list_resources(&ResourceQuota::namespace_prefix(name))
            .await?;
        for quota in quotas.iter().filter(|q| q.has_label(RESOURCE_QUOTA_LABEL)) {
            info!(
                "Deleting default resource quota {} of removed namespace {}",
                quota.name, name
            );
            self.delete_owned(quota).await?;
        }

        let limit_ranges: Vec<LimitRange> = self
            .store
            .list_resources(&LimitRange::namespace_prefix(name))
            .await?;
        for limit_range in limit_ranges
            .iter()
            .filter(|l| l.has_label(RESOURCE_QUOTA_LABEL))
        {
            info!(
                "Deleting default limit range {} of removed namespace {}",
                limit_range.name, name
            );
            self.delete_owned(limit_range).await?;
        }
        Ok(())
    }

    /// The single object under `prefix` carrying the marker label.
    async fn owned_object<T: Resource>(&self, prefix: &str) -> anyhow::Result<Option<T>> {
        let mut owned: Vec<T> = self
            .store
            .list_resources::<T>(prefix)
            .await?
            .into_iter()
            .filter(|obj| obj.has_label(RESOURCE_QUOTA_LABEL))
            .collect();
        if owned.len() > 1 {
            warn!(
                "Found {} default {} objects under {}, using {}",
                owned.len(),
                T::KIND,
                prefix,
                owned[0].key()
            );
        }
        Ok(if owned.is_empty() {
            None
        } else {
            Some(owned.swap_remove(0))
        })
    }

    /// Delete an owned object. Already gone counts as deleted.
    async fn delete_owned<T: Resource>(&self, obj: &T) -> anyhow::Result<()> {
        match self.store.delete_resource(obj).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => Ok(other?),
        }
    }
}

fn generate_name() -> String {
    let id = Uuid::new_v4().to_string();
    format!("{}{}", DEFAULT_OBJECT_NAME_PREFIX, &id[..8])
}

fn owned_labels() -> HashMap<String, String> {
    HashMap::from([(RESOURCE_QUOTA_LABEL.to_string(), "true".to_string())])
}
