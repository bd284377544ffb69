use std::path::PathBuf;

use anyhow::{Context, Result};

pub const DEFAULT_DB_PATH: &str = "chirp.db";
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// Argon2id memory cost in KiB.
    pub argon2_memory_kib: u32,
    pub argon2_iterations: u32,
    /// Buffered change notifications per subscriber before it lags.
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            argon2_memory_kib: argon2::Params::DEFAULT_M_COST,
            argon2_iterations: argon2::Params::DEFAULT_T_COST,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl StoreConfig {
    /// Load `.env` if present, then read `CHIRP_*` variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = lookup("CHIRP_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("CHIRP_ARGON2_MEMORY_KIB") {
            config.argon2_memory_kib = raw
                .parse()
                .with_context(|| format!("CHIRP_ARGON2_MEMORY_KIB is not a number: {}", raw))?;
        }
        if let Some(raw) = lookup("CHIRP_ARGON2_ITERATIONS") {
            config.argon2_iterations = raw
                .parse()
                .with_context(|| format!("CHIRP_ARGON2_ITERATIONS is not a number: {}", raw))?;
        }
        if let Some(raw) = lookup("CHIRP_EVENT_CAPACITY") {
            config.event_capacity = raw
                .parse()
                .with_context(|| format!("CHIRP_EVENT_CAPACITY is not a number: {}", raw))?;
            anyhow::ensure!(config.event_capacity > 0, "CHIRP_EVENT_CAPACITY must be positive");
        }

        Ok(config)
    }

    /// Cheapest parameters argon2 accepts. Only for tests and fixtures.
    pub fn with_fast_hashing(mut self) -> Self {
        self.argon2_memory_kib = argon2::Params::MIN_M_COST;
        self.argon2_iterations = argon2::Params::MIN_T_COST;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_path, PathBuf::from("chirp.db"));
        assert_eq!(config.argon2_memory_kib, argon2::Params::DEFAULT_M_COST);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn reads_overrides() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("CHIRP_DB_PATH", "/tmp/other.db"),
            ("CHIRP_ARGON2_ITERATIONS", "3"),
            ("CHIRP_EVENT_CAPACITY", "16"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.argon2_iterations, 3);
        assert_eq!(config.event_capacity, 16);
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(StoreConfig::from_lookup(lookup(&[("CHIRP_ARGON2_MEMORY_KIB", "lots")])).is_err());
        assert!(StoreConfig::from_lookup(lookup(&[("CHIRP_EVENT_CAPACITY", "0")])).is_err());
    }
}
