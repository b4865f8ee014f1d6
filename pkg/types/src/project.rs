use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::Resource;
use crate::quota::{
    ContainerResourceLimit, NamespaceResourceQuota, ProjectResourceQuota, ResourceQuotaLimit,
};
use pkg_constants::state::PROJECT_PREFIX;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Aggregate cap shared by every namespace in the project.
    #[serde(default)]
    pub resource_quota: Option<ProjectResourceQuota>,
    /// Template applied to member namespaces without an explicit quota.
    #[serde(default)]
    pub namespace_default_resource_quota: Option<NamespaceResourceQuota>,
    /// Template for member namespaces' container default limits.
    #[serde(default)]
    pub container_default_resource_limit: Option<ContainerResourceLimit>,
}

impl ProjectSpec {
    /// The spec without computed usage: everything member namespaces derive
    /// their quota and limits from.
    pub fn without_usage(&self) -> ProjectSpec {
        let mut spec = self.clone();
        if let Some(quota) = spec.resource_quota.as_mut() {
            quota.used_limit = ResourceQuotaLimit::default();
        }
        spec
    }
}

/// A tenant: a group of namespaces sharing an aggregate resource cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub spec: ProjectSpec,
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_version: u64,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            display_name: id.to_string(),
            labels: HashMap::new(),
            spec: ProjectSpec::default(),
            deletion_timestamp: None,
            resource_version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn key_for(id: &str) -> String {
        format!("{}{}", PROJECT_PREFIX, id)
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// The aggregate cap, if one is configured with at least one resource.
    pub fn aggregate_limit(&self) -> Option<&ResourceQuotaLimit> {
        self.spec
            .resource_quota
            .as_ref()
            .map(|q| &q.limit)
            .filter(|limit| !limit.is_empty())
    }

    pub fn used_limit(&self) -> Option<&ResourceQuotaLimit> {
        self.spec.resource_quota.as_ref().map(|q| &q.used_limit)
    }

    pub fn namespace_default_limit(&self) -> Option<&ResourceQuotaLimit> {
        self.spec
            .namespace_default_resource_quota
            .as_ref()
            .map(|q| &q.limit)
    }
}

impl Resource for Project {
    const KIND: &'static str = "Project";

    fn key(&self) -> String {
        Self::key_for(&self.id)
    }

    fn resource_version(&self) -> u64 {
        self.resource_version
    }

    fn set_resource_version(&mut self, version: u64) {
        self.resource_version = version;
    }

    fn labels(&self) -> &HashMap<String, String> {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_limit_ignores_empty_cap() {
        let mut project = Project::new("p-1");
        assert!(project.aggregate_limit().is_none());

        project.spec.resource_quota = Some(ProjectResourceQuota::default());
        assert!(project.aggregate_limit().is_none());

        project.spec.resource_quota = Some(ProjectResourceQuota {
            limit: ResourceQuotaLimit {
                pods: Some("3".into()),
                ..Default::default()
            },
            used_limit: ResourceQuotaLimit::default(),
        });
        assert_eq!(
            project.aggregate_limit().and_then(|l| l.pods.as_deref()),
            Some("3")
        );
    }

    #[test]
    fn usage_is_not_part_of_the_template() {
        let mut project = Project::new("p-1");
        project.spec.resource_quota = Some(ProjectResourceQuota {
            limit: ResourceQuotaLimit {
                pods: Some("3".into()),
                ..Default::default()
            },
            used_limit: ResourceQuotaLimit::default(),
        });
        let before = project.spec.without_usage();

        if let Some(quota) = project.spec.resource_quota.as_mut() {
            quota.used_limit.pods = Some("2".into());
        }
        assert_eq!(project.spec.without_usage(), before);

        project.spec.namespace_default_resource_quota = Some(NamespaceResourceQuota::default());
        assert_ne!(project.spec.without_usage(), before);
    }
}
