use decals::{load_config, resolve_asset_paths, DecalsConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub(crate) struct AppWiring {
    pub(crate) config: DecalsConfig,
}

pub(crate) fn build_app() -> AppWiring {
    init_tracing();
    info!("=== Decal Viewer Startup ===");

    AppWiring {
        config: resolve_config(),
    }
}

/// Loads `assets/decals.json` under the resolved root; any failure falls
/// back to the built-in defaults so the viewer always starts.
fn resolve_config() -> DecalsConfig {
    match resolve_asset_paths() {
        Ok(paths) if paths.config_file.is_file() => match load_config(&paths.config_file) {
            Ok(config) => {
                info!(path = %paths.config_file.display(), "config_loaded");
                config
            }
            Err(error) => {
                warn!(error = %error, "config_load_failed_using_defaults");
                DecalsConfig::default()
            }
        },
        Ok(paths) => {
            info!(path = %paths.config_file.display(), "no_config_file_using_defaults");
            DecalsConfig::default()
        }
        Err(error) => {
            info!(reason = %error, "no_asset_root_using_defaults");
            DecalsConfig::default()
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
