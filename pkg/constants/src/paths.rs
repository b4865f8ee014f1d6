//! Filesystem path constants.

/// Default config file path for the quota controller.
pub const DEFAULT_QUOTA_CONFIG: &str = "/etc/k3rs/quota-config.yaml";

/// Default data directory for the quota controller state store.
pub const DEFAULT_QUOTA_DATA_DIR: &str = "/tmp/k3rs-quota-data";
