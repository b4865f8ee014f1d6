use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// An object persisted in the state store under a single key, guarded by an
/// optimistic-concurrency `resource_version`.
pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind name used in logs and store errors.
    const KIND: &'static str;

    /// Full registry key, e.g. `/registry/namespaces/team-a`.
    fn key(&self) -> String;

    /// Version token of the stored copy this value was read from. `0` means
    /// the object has never been stored.
    fn resource_version(&self) -> u64;

    fn set_resource_version(&mut self, version: u64);

    fn labels(&self) -> &HashMap<String, String>;

    /// True when `label` is present with value `"true"`.
    fn has_label(&self, label: &str) -> bool {
        self.labels().get(label).is_some_and(|v| v == "true")
    }
}
