//! Ground-decal rendering subsystem: persistent footprint marks under
//! buildings and time-bound explosion scars on the terrain.
//!
//! All state lives in a single [`GroundDecals`] instance. Simulation events
//! (`on_object_created`, `on_explosion`, ...) only mutate bookkeeping; the
//! per-frame [`GroundDecals::render_frame`] call does every side effect that
//! touches the renderer. Collaborators are reached through narrow traits
//! ([`TerrainView`], [`ObjectStateSource`], [`DrawBackend`], [`ImageSource`])
//! so the whole subsystem runs headless in tests.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod assets;
pub mod atlas;
pub mod backend;
pub mod config;
pub mod geometry;
pub mod handler;
pub mod pool;
pub mod registry;
pub mod scars;
pub mod sim;
pub mod terrain;
pub mod world;

pub use assets::{DiskImages, ImageLoadError, ImageSource, MemoryImages, RgbaPixels};
pub use atlas::{build_scar_atlas, AtlasError, ATLAS_CELL, ATLAS_SIZE};
pub use backend::{DecalVertex, DrawBackend, DrawCall, NullBackend, TextureHandle};
pub use config::{load_config, ConfigError, DecalsConfig};
pub use geometry::{BuildState, FootprintLayout, GeometryCache};
pub use handler::{FrameContext, GroundDecals, PlayerView, ViewCircle};
pub use pool::{DecalHandle, DecalPool, DecalRecord};
pub use registry::{DecalTypeRegistry, TypeLookup};
pub use scars::{Scar, ScarId, ScarSpawn, ScarTable, TexelRect};
pub use sim::{
    FootprintDecalDef, GhostDrawState, GhostId, ObjectDrawState, ObjectId, ObjectInfo,
    ObjectStateSource,
};
pub use terrain::{FlatTerrain, TerrainView};
pub use world::{
    Facing, MapDims, WorldPos, SCAR_FIELD_CELL_TEXELS, SQUARE_SIZE, TEX_QUAD_SIZE,
};

pub const ROOT_ENV_VAR: &str = "DECALS_ROOT";

/// Resolved on-disk layout of a decal asset root.
#[derive(Debug, Clone)]
pub struct AssetPaths {
    pub root: PathBuf,
    /// Directory holding `unittextures/` and `bitmaps/`.
    pub assets_dir: PathBuf,
    pub config_file: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "DECALS_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/repo\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

/// Resolves the asset root from `DECALS_ROOT`, falling back to walking up
/// from the executable's directory.
pub fn resolve_asset_paths() -> Result<AssetPaths, StartupError> {
    let root = resolve_root()?;
    let assets_dir = root.join("assets");
    let config_file = assets_dir.join("decals.json");

    Ok(AssetPaths {
        root,
        assets_dir,
        config_file,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            for candidate in exe_dir.ancestors() {
                if is_repo_marker(candidate) {
                    return Ok(normalize_path(candidate));
                }
            }

            Err(StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
