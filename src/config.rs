use anyhow::Context;
use std::path::PathBuf;

use crate::fetch::DEFAULT_CHUNK_SIZE;
use crate::store::MAX_IN_QUERY;

pub const ENV_LOG: &str = "HUBD_LOG";
pub const ENV_WORKSPACE: &str = "HUBD_WORKSPACE";
pub const ENV_FETCH_CHUNK_SIZE: &str = "HUBD_FETCH_CHUNK_SIZE";

/// Process-level settings. Per-workspace settings live in the `settings` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub log_filter: String,
    pub workspace: Option<PathBuf>,
    pub fetch_chunk_size: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            workspace: None,
            fetch_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl HubConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            cfg.log_filter = v;
        }
        if let Some(v) = lookup(ENV_WORKSPACE).filter(|v| !v.trim().is_empty()) {
            cfg.workspace = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_FETCH_CHUNK_SIZE) {
            let n: usize = v
                .trim()
                .parse()
                .with_context(|| format!("{} must be a positive integer", ENV_FETCH_CHUNK_SIZE))?;
            if n == 0 || n > MAX_IN_QUERY {
                anyhow::bail!("{} must be between 1 and {}", ENV_FETCH_CHUNK_SIZE, MAX_IN_QUERY);
            }
            cfg.fetch_chunk_size = n;
        }
        Ok(cfg)
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
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = HubConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(cfg, HubConfig::default());
        assert_eq!(cfg.fetch_chunk_size, 30);
    }

    #[test]
    fn reads_overrides() {
        let cfg = HubConfig::from_lookup(lookup(&[
            (ENV_LOG, "debug"),
            (ENV_WORKSPACE, "/tmp/hub"),
            (ENV_FETCH_CHUNK_SIZE, "10"),
        ]))
        .expect("config");
        assert_eq!(cfg.log_filter, "debug");
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/hub")));
        assert_eq!(cfg.fetch_chunk_size, 10);
    }

    #[test]
    fn rejects_chunk_size_above_store_limit() {
        assert!(HubConfig::from_lookup(lookup(&[(ENV_FETCH_CHUNK_SIZE, "31")])).is_err());
        assert!(HubConfig::from_lookup(lookup(&[(ENV_FETCH_CHUNK_SIZE, "zero")])).is_err());
    }
}
