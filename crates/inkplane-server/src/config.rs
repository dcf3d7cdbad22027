//! Server configuration.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Default length of an admission window.
pub const DEFAULT_WINDOW_MS: u64 = 60 * 1000;
/// Default cost units allowed per window.
pub const DEFAULT_MAX_REQUESTS: f64 = 300.0;
/// Default ceiling on strokes per batched creation.
pub const DEFAULT_MAX_BATCH: usize = 50;
/// Admission cost of one stroke edit.
pub const DEFAULT_UPDATE_COST: f64 = 0.5;

/// Runtime configuration, read from `INKPLANE_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub rate_limit_window_ms: u64,
    pub max_requests_per_window: f64,
    pub max_paths_per_batch: usize,
    pub update_cost: f64,
    /// JSON file for durable stroke storage; in-memory only when unset.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            rate_limit_window_ms: DEFAULT_WINDOW_MS,
            max_requests_per_window: DEFAULT_MAX_REQUESTS,
            max_paths_per_batch: DEFAULT_MAX_BATCH,
            update_cost: DEFAULT_UPDATE_COST,
            snapshot_path: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        override_from(&lookup, "INKPLANE_BIND_ADDR", &mut config.bind_addr);
        override_from(&lookup, "INKPLANE_WINDOW_MS", &mut config.rate_limit_window_ms);
        override_from(&lookup, "INKPLANE_MAX_REQUESTS", &mut config.max_requests_per_window);
        override_from(&lookup, "INKPLANE_MAX_BATCH", &mut config.max_paths_per_batch);
        override_from(&lookup, "INKPLANE_UPDATE_COST", &mut config.update_cost);
        if let Some(path) = lookup("INKPLANE_SNAPSHOT_PATH").filter(|p| !p.trim().is_empty()) {
            config.snapshot_path = Some(PathBuf::from(path));
        }
        if config.rate_limit_window_ms == 0 {
            warn!("INKPLANE_WINDOW_MS must be positive, using {}", DEFAULT_WINDOW_MS);
            config.rate_limit_window_ms = DEFAULT_WINDOW_MS;
        }
        config
    }
}

fn override_from<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!("Ignoring invalid {}={:?}", key, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.rate_limit_window_ms, 60_000);
        assert_eq!(config.max_paths_per_batch, 50);
        assert!((config.max_requests_per_window - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("INKPLANE_BIND_ADDR", "127.0.0.1:8080"),
            ("INKPLANE_MAX_BATCH", "10"),
            ("INKPLANE_SNAPSHOT_PATH", "/tmp/strokes.json"),
        ]));
        assert_eq!(config.bind_addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.max_paths_per_batch, 10);
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/strokes.json")));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("INKPLANE_MAX_REQUESTS", "lots"),
            ("INKPLANE_WINDOW_MS", "0"),
        ]));
        assert!((config.max_requests_per_window - DEFAULT_MAX_REQUESTS).abs() < f64::EPSILON);
        assert_eq!(config.rate_limit_window_ms, DEFAULT_WINDOW_MS);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = serde_json::from_str(r#"{"max_paths_per_batch": 5}"#).unwrap();
        assert_eq!(config.max_paths_per_batch, 5);
        assert_eq!(config.rate_limit_window_ms, DEFAULT_WINDOW_MS);
    }
}
