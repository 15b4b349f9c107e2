use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::{DropZones, KeySpacing, TypeLattice};
use crate::models::OrderKey;

const APP_NAME: &str = "backlog-order";
const CONFIG_FILE: &str = "config.json";

/// Problems with an otherwise well-formed configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("drop edge threshold must be in (0, 0.5], got {0}")]
    EdgeThreshold(f64),

    #[error("min_gap must be at least two ticks so midpoints stay strictly inside, got {0}")]
    MinGapTooSmall(OrderKey),

    #[error("base_gap ({base_gap}) must be larger than min_gap ({min_gap})")]
    BaseGapTooSmall { base_gap: OrderKey, min_gap: OrderKey },
}

/// Everything the engine can be tuned with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Parent/child containment table. Types not listed keep their defaults.
    pub lattice: TypeLattice,
    /// Drop zone geometry.
    pub drop: DropZones,
    /// Order key spacing and the rebalance threshold.
    pub keys: KeySpacing,
}

impl EngineConfig {
    /// Load configuration from the user's config directory.
    /// Returns default config if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        match get_config_path().and_then(|path| Self::load_or_default(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(path)
    }

    /// Load and validate configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid config file")?;

        Ok(config)
    }

    /// Save the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.drop.edge_threshold;
        if !(t > 0.0 && t <= 0.5) {
            return Err(ConfigError::EdgeThreshold(t));
        }
        if self.keys.min_gap.ticks() < 2 {
            return Err(ConfigError::MinGapTooSmall(self.keys.min_gap));
        }
        if self.keys.base_gap <= self.keys.min_gap {
            return Err(ConfigError::BaseGapTooSmall {
                base_gap: self.keys.base_gap,
                min_gap: self.keys.min_gap,
            });
        }
        Ok(())
    }
}

/// Default location of the config file.
pub fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
