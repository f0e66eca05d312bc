use std::env;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 9103;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;
const STORAGE_DIR_NAME: &str = ".figment-bridge";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub max_body_bytes: usize,
    /// Zero keeps the sweeper to its single startup pass.
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let storage_dir = get("FIGMENT_BRIDGE_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                get("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(STORAGE_DIR_NAME)
            });

        Self {
            host: get("FIGMENT_BRIDGE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: get("FIGMENT_BRIDGE_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            storage_dir,
            max_body_bytes: get("FIGMENT_BRIDGE_MAX_BODY_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            sweep_interval_secs: get("FIGMENT_BRIDGE_SWEEP_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("HOME", "/home/dev")]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.storage_dir, PathBuf::from("/home/dev/.figment-bridge"));
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.sweep_interval_secs, 0);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("FIGMENT_BRIDGE_PORT", "4000"),
            ("FIGMENT_BRIDGE_DIR", "/tmp/bridge"),
            ("FIGMENT_BRIDGE_SWEEP_INTERVAL_SECS", "600"),
        ]));
        assert_eq!(config.port, 4000);
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/bridge"));
        assert_eq!(config.sweep_interval_secs, 600);
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = Config::from_lookup(lookup(&[("FIGMENT_BRIDGE_PORT", "http")]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.storage_dir, PathBuf::from("./.figment-bridge"));
    }
}
