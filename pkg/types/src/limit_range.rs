use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::meta::Resource;
use crate::resources::ResourceList;
use pkg_constants::state::LIMIT_RANGE_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitType {
    Container,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRangeItem {
    #[serde(rename = "type")]
    pub limit_type: LimitType,
    /// Default limits applied to containers that declare none.
    #[serde(default)]
    pub default: ResourceList,
    /// Default requests applied to containers that declare none.
    #[serde(default)]
    pub default_request: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRangeSpec {
    #[serde(default)]
    pub limits: Vec<LimitRangeItem>,
}

/// Limit range object applying container defaults inside a namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitRange {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub spec: LimitRangeSpec,
    #[serde(default)]
    pub resource_version: u64,
    pub created_at: DateTime<Utc>,
}

impl LimitRange {
    pub fn key_for(namespace: &str, name: &str) -> String {
        format!("{}{}/{}", LIMIT_RANGE_PREFIX, namespace, name)
    }

    /// Prefix covering every limit range in `namespace`.
    pub fn namespace_prefix(namespace: &str) -> String {
        format!("{}{}/", LIMIT_RANGE_PREFIX, namespace)
    }
}

impl Resource for LimitRange {
    const KIND: &'static str = "LimitRange";

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
