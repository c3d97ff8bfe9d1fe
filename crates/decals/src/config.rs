//! Subsystem configuration.
//!
//! Loaded from a JSON settings file; every field has a default so a partial
//! (or absent) file still yields a usable configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecalsConfig {
    /// Visual-quality knob; 0 disables the subsystem entirely. The scar
    /// overlap-eviction threshold is `decal_level + 1`.
    pub decal_level: u32,
    /// Enables the scar alpha-fade-over-lifetime visual mode.
    pub ground_scar_alpha_fade: bool,
    /// Footprint decal records preallocated in the pool.
    pub decal_pool_capacity: usize,
    /// Scar records preallocated in the table.
    pub scar_capacity: usize,
    /// Resource-table paths of the four scar atlas entries.
    pub scar_textures: [String; 4],
}

impl Default for DecalsConfig {
    fn default() -> Self {
        Self {
            decal_level: 3,
            ground_scar_alpha_fade: false,
            decal_pool_capacity: 1024,
            scar_capacity: 4096,
            scar_textures: [
                "bitmaps/scars/scar1.bmp".to_string(),
                "bitmaps/scars/scar2.bmp".to_string(),
                "bitmaps/scars/scar3.bmp".to_string(),
                "bitmaps/scars/scar4.bmp".to_string(),
            ],
        }
    }
}

impl DecalsConfig {
    /// True when the subsystem should run at all.
    pub fn decals_enabled(&self) -> bool {
        self.decal_level > 0
    }

    /// Cumulative overlap-ratio threshold beyond which a scar is evicted.
    pub fn max_scar_overlap(&self) -> i32 {
        self.decal_level as i32 + 1
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path} at {}: {source}", .source.path())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

/// Loads a [`DecalsConfig`] from a JSON file. Parse errors name the exact
/// field path that failed.
pub fn load_config(path: &Path) -> Result<DecalsConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
