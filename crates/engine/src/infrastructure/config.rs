//! Engine configuration.
//!
//! Every field has a default; `BEACON_*` environment variables override
//! them. A value that fails to parse is ignored with a warning.

use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_debounce_ms() -> u64 {
    500
}
fn default_license_cache_ttl_secs() -> u64 {
    60
}
fn default_import_batch_size() -> usize {
    50
}
fn default_event_buffer() -> usize {
    1024
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Quiet period before a document change is signalled.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_license_cache_ttl_secs")]
    pub license_cache_ttl_secs: u64,
    /// Documents per `create` call during import.
    #[serde(default = "default_import_batch_size")]
    pub import_batch_size: usize,
    /// Capacity of the store's event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            license_cache_ttl_secs: default_license_cache_ttl_secs(),
            import_batch_size: default_import_batch_size(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            debounce_ms: parse_var(&lookup, "BEACON_DEBOUNCE_MS", defaults.debounce_ms),
            license_cache_ttl_secs: parse_var(
                &lookup,
                "BEACON_LICENSE_CACHE_TTL_SECS",
                defaults.license_cache_ttl_secs,
            ),
            import_batch_size: parse_var(
                &lookup,
                "BEACON_IMPORT_BATCH_SIZE",
                defaults.import_batch_size,
            )
            .max(1),
            event_buffer: parse_var(&lookup, "BEACON_EVENT_BUFFER", defaults.event_buffer).max(1),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn license_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.license_cache_ttl_secs)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return default;
    };
    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            tracing::warn!(var = name, value = %raw, default = %default, "Ignoring invalid config value");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = EngineConfig::from_lookup(lookup(&[]));
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.license_cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn variables_override_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("BEACON_DEBOUNCE_MS", "250"),
            ("BEACON_IMPORT_BATCH_SIZE", " 10 "),
        ]));
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.import_batch_size, 10);
        assert_eq!(config.event_buffer, 1024);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("BEACON_LICENSE_CACHE_TTL_SECS", "soon"),
            ("BEACON_IMPORT_BATCH_SIZE", "0"),
        ]));
        assert_eq!(config.license_cache_ttl_secs, 60);
        assert_eq!(config.import_batch_size, 1);
    }

    #[test]
    fn deserializes_partial_json() {
        let config: EngineConfig = serde_json::from_str(r#"{ "debounce_ms": 100 }"#).unwrap();
        assert_eq!(config.debounce_ms, 100);
        assert_eq!(config.import_batch_size, 50);
    }
}
