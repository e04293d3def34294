//! Pool configuration - which arenas exist and how large they are
//!
//! Loaded from TOML, e.g.
//!
//! ```toml
//! default_pool = "default"
//!
//! [[pools]]
//! name = "default"
//! size_bytes = 8192
//!
//! [[pools]]
//! name = "testcase"
//! size_bytes = 4096
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::allocator::{PoolId, BLOCK_ALIGN, BLOCK_HEADER_SIZE};
use crate::errors::{Error, Result};

/// Smallest pool that can hold one minimal allocation plus its remainder
pub const MIN_POOL_SIZE: usize = 2 * BLOCK_HEADER_SIZE + BLOCK_ALIGN;

/// Most pools a `PoolId` can address
pub const MAX_POOLS: usize = u8::MAX as usize + 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatorConfig {
    #[serde(default = "default_pools")]
    pub pools: Vec<PoolConfig>,

    #[serde(default = "default_pool_name")]
    pub default_pool: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: String,
    pub size_bytes: usize,
}

impl PoolConfig {
    pub fn new(name: impl Into<String>, size_bytes: usize) -> Self {
        Self {
            name: name.into(),
            size_bytes,
        }
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            pools: default_pools(),
            default_pool: default_pool_name(),
        }
    }
}

fn default_pools() -> Vec<PoolConfig> {
    vec![
        PoolConfig::new("default", 8 * 1024),
        PoolConfig::new("testcase", 4 * 1024),
    ]
}

fn default_pool_name() -> String {
    "default".to_string()
}

impl AllocatorConfig {
    /// Single pool named `default`
    pub fn single(size_bytes: usize) -> Self {
        Self {
            pools: vec![PoolConfig::new("default", size_bytes)],
            default_pool: default_pool_name(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pools.is_empty() {
            return Err(Error::config("at least one pool is required"));
        }
        if self.pools.len() > MAX_POOLS {
            return Err(Error::config(format!(
                "{} pools configured, at most {} supported",
                self.pools.len(),
                MAX_POOLS
            )));
        }

        let mut seen = HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.name.as_str()) {
                return Err(Error::config(format!("duplicate pool name '{}'", pool.name)));
            }
            if pool.size_bytes < MIN_POOL_SIZE {
                return Err(Error::config(format!(
                    "pool '{}' has {} bytes, minimum is {}",
                    pool.name, pool.size_bytes, MIN_POOL_SIZE
                )));
            }
        }

        if self.pool_id(&self.default_pool).is_none() {
            return Err(Error::config(format!(
                "default pool '{}' is not configured",
                self.default_pool
            )));
        }

        Ok(())
    }

    /// Resolve a pool name to its identifier
    pub fn pool_id(&self, name: &str) -> Option<PoolId> {
        self.pools
            .iter()
            .position(|pool| pool.name == name)
            .filter(|&index| index < MAX_POOLS)
            .map(|index| PoolId::new(index as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AllocatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_id("default"), Some(PoolId::new(0)));
        assert_eq!(config.pool_id("testcase"), Some(PoolId::new(1)));
        assert_eq!(config.pool_id("missing"), None);
    }

    #[test]
    fn test_parse_toml() {
        let config = AllocatorConfig::parse(
            r#"
            default_pool = "fast"

            [[pools]]
            name = "slow"
            size_bytes = 1024

            [[pools]]
            name = "fast"
            size_bytes = 512
            "#,
        )
        .unwrap();

        assert_eq!(config.pools.len(), 2);
        assert_eq!(config.pool_id(&config.default_pool), Some(PoolId::new(1)));
    }

    #[test]
    fn test_parse_uses_defaults_for_missing_fields() {
        let config = AllocatorConfig::parse("").unwrap();
        assert_eq!(config, AllocatorConfig::default());
    }

    #[test]
    fn test_rejects_invalid_configs() {
        let tiny = AllocatorConfig::single(MIN_POOL_SIZE - 1);
        assert!(matches!(tiny.validate(), Err(Error::Config { .. })));

        let mut duplicate = AllocatorConfig::default();
        duplicate.pools.push(PoolConfig::new("default", 1024));
        assert!(matches!(duplicate.validate(), Err(Error::Config { .. })));

        let mut no_default = AllocatorConfig::default();
        no_default.default_pool = "nope".to_string();
        assert!(no_default.validate().is_err());

        let empty = AllocatorConfig {
            pools: Vec::new(),
            default_pool: "default".to_string(),
        };
        assert!(empty.validate().is_err());

        assert!(AllocatorConfig::parse("pools = 3").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pools.toml");
        fs::write(&path, "[[pools]]\nname = \"default\"\nsize_bytes = 2048\n").unwrap();

        let config = AllocatorConfig::load(&path).unwrap();
        assert_eq!(config.pools, vec![PoolConfig::new("default", 2048)]);

        let missing = AllocatorConfig::load(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(Error::Config { .. })));
    }
}
