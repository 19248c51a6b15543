use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stonecut_cache::CacheConfig;
use stonecut_core::slab::{GrooveSpec, OrderConfig};
use stonecut_jobs::PoolConfig;

/// Errors from reading preview configuration or order files.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Drip groove cross-section in millimetres (`[groove]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrooveConfig {
    pub offset_mm: f64,
    pub width_mm: f64,
    pub depth_mm: f64,
}

impl Default for GrooveConfig {
    fn default() -> Self {
        Self {
            offset_mm: GrooveSpec::DEFAULT_OFFSET_MM,
            width_mm: GrooveSpec::DEFAULT_WIDTH_MM,
            depth_mm: GrooveSpec::DEFAULT_DEPTH_MM,
        }
    }
}

impl GrooveConfig {
    pub fn spec(&self) -> GrooveSpec {
        GrooveSpec::from_mm(self.offset_mm, self.width_mm, self.depth_mm)
    }
}

/// Preview settings, stored as TOML.
///
/// ```toml
/// texture_root = "textures"
///
/// [pool]
/// worker_count = 2
///
/// [cache]
/// geometries = 16
///
/// [groove]
/// offset_mm = 20.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Directory texture URLs are resolved against.
    pub texture_root: PathBuf,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
    pub groove: GrooveConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            texture_root: PathBuf::from("textures"),
            pool: PoolConfig::default(),
            cache: CacheConfig::default(),
            groove: GrooveConfig::default(),
        }
    }
}

impl PreviewConfig {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Reads `path`, or returns defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content, path)?;
        log::info!("Loaded preview config from {}", path.display());
        Ok(config)
    }
}

/// Reads an order form saved by the configurator (JSON, millimetres).
pub fn load_order(path: &Path) -> Result<OrderConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
