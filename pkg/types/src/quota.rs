use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::meta::Resource;
use crate::resources::ResourceList;
use pkg_constants::state::RESOURCE_QUOTA_PREFIX;

/// Generates the lossless conversion between a limit struct's well-known
/// fields (plus its `extended` map) and a `ResourceList` keyed by resource name.
macro_rules! resource_fields {
    ($ty:ident { $($field:ident => $name:literal),* $(,)? }) => {
        impl $ty {
            pub fn to_resource_list(&self) -> ResourceList {
                let mut list = self.extended.clone();
                $(
                    if let Some(value) = &self.$field {
                        list.insert($name.to_string(), value.clone());
                    }
                )*
                list
            }

            pub fn from_resource_list(list: &ResourceList) -> Self {
                let mut limit = Self::default();
                for (name, value) in list {
                    match name.as_str() {
                        $($name => limit.$field = Some(value.clone()),)*
                        _ => {
                            limit.extended.insert(name.clone(), value.clone());
                        }
                    }
                }
                limit
            }

            pub fn is_empty(&self) -> bool {
                self.extended.is_empty() $(&& self.$field.is_none())*
            }
        }
    };
}

/// Aggregate resource limits for a namespace or a project.
/// Values are quantity strings; unset fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuotaLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pods: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replication_controllers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_maps: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claims: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_node_ports: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_load_balancers: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits_cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits_memory: Option<String>,
    /// Resources without a dedicated field, keyed by resource name
    /// (e.g. `requests.nvidia.com/gpu`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extended: BTreeMap<String, String>,
}

resource_fields!(ResourceQuotaLimit {
    pods => "pods",
    services => "services",
    replication_controllers => "replicationcontrollers",
    secrets => "secrets",
    config_maps => "configmaps",
    persistent_volume_claims => "persistentvolumeclaims",
    services_node_ports => "services.nodeports",
    services_load_balancers => "services.loadbalancers",
    requests_cpu => "requests.cpu",
    requests_memory => "requests.memory",
    requests_storage => "requests.storage",
    limits_cpu => "limits.cpu",
    limits_memory => "limits.memory",
});

/// Default per-container requests and limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerResourceLimit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests_memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits_cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits_memory: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extended: BTreeMap<String, String>,
}

resource_fields!(ContainerResourceLimit {
    requests_cpu => "requests.cpu",
    requests_memory => "requests.memory",
    limits_cpu => "limits.cpu",
    limits_memory => "limits.memory",
});

/// Quota declared on (or derived for) a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceResourceQuota {
    #[serde(default)]
    pub limit: ResourceQuotaLimit,
}

/// Aggregate cap of a project and the usage computed across its namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectResourceQuota {
    #[serde(default)]
    pub limit: ResourceQuotaLimit,
    #[serde(default)]
    pub used_limit: ResourceQuotaLimit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceQuotaSpec {
    #[serde(default)]
    pub hard: ResourceList,
}

/// Resource quota object enforced inside a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceQuota {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub spec: ResourceQuotaSpec,
    #[serde(default)]
    pub resource_version: u64,
    pub created_at: DateTime<Utc>,
}

impl ResourceQuota {
    pub fn key_for(namespace: &str, name: &str) -> String {
        format!("{}{}/{}", RESOURCE_QUOTA_PREFIX, namespace, name)
    }

    /// Prefix covering every resource quota in `namespace`.
    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{}{}/", RESOURCE_QUOTA_PREFIX, namespace)
    }
}

impl Resource for ResourceQuota {
    const KIND: &'static str = "ResourceQuota";

    fn key(&self) -> String {
        Self::key_for(&self.namespace, &self.name)
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
    fn resource_list_round_trips_well_known_and_extended() {
        let limit = ResourceQuotaLimit {
            pods: Some("10".into()),
            limits_cpu: Some("2".into()),
            services_node_ports: Some("1".into()),
            extended: BTreeMap::from([("requests.nvidia.com/gpu".into(), "4".into())]),
            ..Default::default()
        };
        let list = limit.to_resource_list();
        assert_eq!(list.get("pods").map(String::as_str), Some("10"));
        assert_eq!(list.get("limits.cpu").map(String::as_str), Some("2"));
        assert_eq!(list.get("services.nodeports").map(String::as_str), Some("1"));
        assert_eq!(list.len(), 4);
        assert_eq!(ResourceQuotaLimit::from_resource_list(&list), limit);
    }

    #[test]
    fn empty_limit() {
        assert!(ResourceQuotaLimit::default().is_empty());
        assert!(ContainerResourceLimit::default().is_empty());
        let limit = ContainerResourceLimit {
            limits_memory: Some("256Mi".into()),
            ..Default::default()
        };
        assert!(!limit.is_empty());
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let limit = ResourceQuotaLimit {
            pods: Some("3".into()),
            ..Default::default()
        };
        let json = serde_json::to_string(&limit).unwrap();
        assert_eq!(json, r#"{"pods":"3"}"#);
    }
}
