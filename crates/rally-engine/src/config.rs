use anyhow::{Context, Result};
use rally_trust::TrustConfig;
use rally_types::TieBreak;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RallyConfig {
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub trust: TrustConfig,
    pub ranking: RankingSettings,
    pub links: LinkSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// "memory" or "rocksdb" (the latter behind the `rocksdb` feature).
    pub backend: String,
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub summary_ttl_secs: u64,
    pub rankings_ttl_secs: u64,
    /// Click fingerprint dedup window.
    pub dedup_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkSettings {
    pub slug_min_len: usize,
    pub slug_max_len: usize,
    pub max_slug_attempts: u32,
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            trust: TrustConfig::default(),
            ranking: RankingSettings::default(),
            links: LinkSettings::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            summary_ttl_secs: 60,
            rankings_ttl_secs: 60,
            dedup_ttl_secs: 24 * 3600,
        }
    }
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::SortOrder,
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            slug_min_len: 6,
            slug_max_len: 8,
            max_slug_attempts: 5,
        }
    }
}

impl RallyConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: RallyConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// `RALLY_DATA_DIR` beats the file so containerized deployments can
    /// relocate state without editing config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("RALLY_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RallyConfig::default();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.cache.dedup_ttl_secs, 24 * 3600);
        assert_eq!(config.ranking.tie_break, TieBreak::SortOrder);
        assert_eq!(config.links.max_slug_attempts, 5);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            [storage]
            backend = "memory"

            [ranking]
            tie_break = "competition"

            [trust]
            rate_limit_per_minute = 10
        "#;
        let config: RallyConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.ranking.tie_break, TieBreak::Competition);
        assert_eq!(config.trust.rate_limit_per_minute, 10);
        // Untouched sections keep their defaults
        assert_eq!(config.cache.summary_ttl_secs, 60);
        assert_eq!(config.links.slug_min_len, 6);
    }

    #[test]
    fn test_roundtrip() {
        let config = RallyConfig::default();
        let raw = toml::to_string(&config).unwrap();
        let back: RallyConfig = toml::from_str(&raw).unwrap();
        assert_eq!(back.storage.backend, config.storage.backend);
        assert_eq!(back.trust.review_penalty, config.trust.review_penalty);
    }
}
