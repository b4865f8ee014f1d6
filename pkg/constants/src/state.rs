//! State store key layout and change-stream constants.

/// Key prefix for projects: `/registry/projects/{id}`.
pub const PROJECT_PREFIX: &str = "/registry/projects/";

/// Key prefix for namespaces: `/registry/namespaces/{name}`.
pub const NAMESPACE_PREFIX: &str = "/registry/namespaces/";

/// Key prefix for resource quotas: `/registry/resourcequotas/{ns}/{name}`.
pub const RESOURCE_QUOTA_PREFIX: &str = "/registry/resourcequotas/";

/// Key prefix for limit ranges: `/registry/limitranges/{ns}/{name}`.
pub const LIMIT_RANGE_PREFIX: &str = "/registry/limitranges/";

/// Events buffered per event log subscriber before it lags and must resync.
pub const EVENT_LOG_CAPACITY: usize = 1024;
