use serde::{Deserialize, Serialize};

/// Per-class capacities of the resource manager (`[cache]` in TOML).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub textures: usize,
    pub materials: usize,
    pub geometries: usize,
    pub other: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            textures: 64,
            materials: 64,
            geometries: 32,
            other: 32,
        }
    }
}
