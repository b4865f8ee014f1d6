use serde::{Deserialize, Serialize};

/// Quota controller configuration file (YAML).
///
/// Example `quota-config.yaml`:
/// ```yaml
/// data-dir: /var/lib/k3rs/quota
/// workers: 8
/// lock-ttl-secs: 3600
/// lock-capacity: 1000
/// retry-base-millis: 250
/// retry-max-secs: 30
/// log-json: true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaControllerConfigFile {
    #[serde(default, alias = "data-dir")]
    pub data_dir: Option<String>,
    #[serde(default, alias = "in-memory")]
    pub in_memory: Option<bool>,
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default, alias = "lock-ttl-secs")]
    pub lock_ttl_secs: Option<u64>,
    #[serde(default, alias = "lock-capacity")]
    pub lock_capacity: Option<usize>,
    #[serde(default, alias = "retry-base-millis")]
    pub retry_base_millis: Option<u64>,
    #[serde(default, alias = "retry-max-secs")]
    pub retry_max_secs: Option<u64>,
    #[serde(default, alias = "event-log-capacity")]
    pub event_log_capacity: Option<usize>,
    #[serde(default, alias = "log-json")]
    pub log_json: Option<bool>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e.into()),
    };
    let config: T = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg: QuotaControllerConfigFile =
            load_config_file("/nonexistent/k3rs/quota-config.yaml").unwrap();
        assert!(cfg.data_dir.is_none());
        assert!(cfg.workers.is_none());
    }

    #[test]
    fn reads_kebab_case_keys() {
        let path = std::env::temp_dir().join(format!("k3rs-quota-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "data-dir: /var/lib/k3rs/quota\nworkers: 8\nlock-ttl-secs: 60\nlog-json: true\n",
        )
        .unwrap();

        let cfg: QuotaControllerConfigFile = load_config_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.data_dir.as_deref(), Some("/var/lib/k3rs/quota"));
        assert_eq!(cfg.workers, Some(8));
        assert_eq!(cfg.lock_ttl_secs, Some(60));
        assert_eq!(cfg.log_json, Some(true));
        assert!(cfg.lock_capacity.is_none());
    }
}
