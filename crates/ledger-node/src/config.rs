// ledger-node/src/config.rs
use ledger_core::{miner::MAX_DIFFICULTY, LedgerError, LedgerResult, MinerConfig, PoolConfig};
use ledger_storage::CacheConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pool: PoolConfig,
    pub miner: MinerConfig,
    pub cache: CacheConfig,
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.pool.seal_threshold == 0 {
            return Err(LedgerError::Validation(
                "pool.seal_threshold must be at least 1".into()
            ));
        }
        if self.miner.difficulty > MAX_DIFFICULTY {
            return Err(LedgerError::Validation(format!(
                "miner.difficulty must be at most {}", MAX_DIFFICULTY
            )));
        }
        if self.cache.capacity == 0 {
            return Err(LedgerError::Validation(
                "cache.capacity must be at least 1".into()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.pool.seal_threshold, 5);
        assert_eq!(config.miner.difficulty, 4);
        assert_eq!(config.cache.capacity, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.toml");

        let mut config = EngineConfig::default();
        config.miner.difficulty = 2;
        config.to_file(&path).unwrap();

        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig = toml::from_str("[miner]\ndifficulty = 3\n").unwrap();
        assert_eq!(config.miner.difficulty, 3);
        assert_eq!(config.pool.seal_threshold, 5);
    }

    #[test]
    fn test_rejects_invalid_values() {
        let mut config = EngineConfig::default();
        config.pool.seal_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.miner.difficulty = MAX_DIFFICULTY + 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }
}
