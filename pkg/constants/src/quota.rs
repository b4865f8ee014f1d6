//! Resource quota controller constants.

/// Marker label carried by the one resource quota / limit range per namespace
/// that the quota controller owns.
pub const RESOURCE_QUOTA_LABEL: &str = "resourcequota.k3rs.io/default-resource-quota";

/// Name prefix for generated resource quota and limit range objects.
pub const DEFAULT_OBJECT_NAME_PREFIX: &str = "default-";

/// Namespace condition recording whether the namespace quota fits its project.
pub const RESOURCE_QUOTA_VALIDATED_CONDITION: &str = "ResourceQuotaValidated";

/// Namespace condition set once the quota controller has processed a namespace.
pub const RESOURCE_QUOTA_INIT_CONDITION: &str = "ResourceQuotaInit";

/// Idle time after which a project lock may be evicted, in seconds.
pub const PROJECT_LOCK_TTL_SECS: u64 = 60 * 60;

/// Maximum number of project locks kept before LRU eviction kicks in.
pub const PROJECT_LOCK_CAPACITY: usize = 1000;

/// Default number of controller worker tasks.
pub const DEFAULT_WORKERS: usize = 4;

/// First retry delay after a failed sync, in milliseconds. Doubles per failure.
pub const RETRY_BASE_MILLIS: u64 = 250;

/// Upper bound for the retry delay, in seconds.
pub const RETRY_MAX_SECS: u64 = 30;
