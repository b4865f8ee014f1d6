use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::Resource;
use crate::quota::{ContainerResourceLimit, NamespaceResourceQuota};
use pkg_constants::quota::{RESOURCE_QUOTA_INIT_CONDITION, RESOURCE_QUOTA_VALIDATED_CONDITION};
use pkg_constants::state::NAMESPACE_PREFIX;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceCondition {
    #[serde(rename = "type")]
    pub condition_type: String,
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Owning project, if any.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Explicit quota override. Once the quota controller has validated the
    /// namespace this holds the effective quota.
    #[serde(default)]
    pub resource_quota: Option<NamespaceResourceQuota>,
    /// Explicit container default limit override.
    #[serde(default)]
    pub container_default_resource_limit: Option<ContainerResourceLimit>,
    #[serde(default)]
    pub conditions: Vec<NamespaceCondition>,
    /// Set when the namespace is being deleted.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resource_version: u64,
    pub created_at: DateTime<Utc>,
}

impl Namespace {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            labels: HashMap::new(),
            project_id: None,
            resource_quota: None,
            container_default_resource_limit: None,
            conditions: Vec::new(),
            deletion_timestamp: None,
            resource_version: 0,
            created_at: Utc::now(),
        }
    }

    pub fn in_project(name: &str, project_id: &str) -> Self {
        Self {
            project_id: Some(project_id.to_string()),
            ..Self::new(name)
        }
    }

    pub fn key_for(name: &str) -> String {
        format!("{}{}", NAMESPACE_PREFIX, name)
    }

    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn condition(&self, condition_type: &str) -> Option<&NamespaceCondition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    pub fn is_condition_true(&self, condition_type: &str) -> bool {
        self.condition(condition_type).is_some_and(|c| c.status)
    }

    /// Set a condition. Returns `false` when it already held this status and
    /// message, in which case nothing is modified.
    pub fn set_condition(&mut self, condition_type: &str, status: bool, message: &str) -> bool {
        let now = Utc::now();
        match self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition_type)
        {
            Some(c) if c.status == status && c.message == message => false,
            Some(c) => {
                c.status = status;
                c.message = message.to_string();
                c.last_update_time = now;
                true
            }
            None => {
                self.conditions.push(NamespaceCondition {
                    condition_type: condition_type.to_string(),
                    status,
                    message: message.to_string(),
                    last_update_time: now,
                });
                true
            }
        }
    }

    /// Quota fits the project cap as of the last validation.
    pub fn is_quota_valid(&self) -> bool {
        self.is_condition_true(RESOURCE_QUOTA_VALIDATED_CONDITION)
    }

    pub fn is_quota_initialized(&self) -> bool {
        self.is_condition_true(RESOURCE_QUOTA_INIT_CONDITION)
    }
}

impl Resource for Namespace {
    const KIND: &'static str = "Namespace";

    fn key(&self) -> String {
        Self::key_for(&self.name)
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
    fn set_condition_reports_changes_only() {
        let mut ns = Namespace::new("team-a");
        assert!(!ns.is_quota_valid());

        assert!(ns.set_condition(RESOURCE_QUOTA_VALIDATED_CONDITION, true, ""));
        assert!(ns.is_quota_valid());
        assert!(!ns.set_condition(RESOURCE_QUOTA_VALIDATED_CONDITION, true, ""));

        assert!(ns.set_condition(RESOURCE_QUOTA_VALIDATED_CONDITION, false, "too big"));
        assert!(!ns.is_quota_valid());
        assert_eq!(ns.conditions.len(), 1);
        assert_eq!(
            ns.condition(RESOURCE_QUOTA_VALIDATED_CONDITION)
                .map(|c| c.message.as_str()),
            Some("too big")
        );
    }

    #[test]
    fn deserializes_without_optional_fields() {
        let json = r#"{"name":"default","created_at":"2026-01-01T00:00:00Z"}"#;
        let ns: Namespace = serde_json::from_str(json).unwrap();
        assert_eq!(ns.key(), "/registry/namespaces/default");
        assert!(ns.project_id.is_none());
        assert!(!ns.is_deleting());
        assert_eq!(ns.resource_version, 0);
    }
}
