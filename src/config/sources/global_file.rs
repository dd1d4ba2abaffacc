//! Global config file: `$XDG_CONFIG_HOME/snapverify/config.toml`, falling back to
//! `~/.config/snapverify/config.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

/// Path to the global config file for the current environment.
pub fn global_config_path() -> Option<PathBuf> {
    config_path_from(
        std::env::var_os("XDG_CONFIG_HOME"),
        std::env::var_os("HOME"),
    )
}

/// An empty or relative `XDG_CONFIG_HOME` is ignored, as the XDG base directory
/// rules require.
fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    let base = xdg_config_home
        .map(PathBuf::from)
        .filter(|dir| dir.is_absolute())
        .or_else(|| {
            home.filter(|h| !h.is_empty())
                .map(|h| PathBuf::from(h).join(".config"))
        })?;
    Some(base.join("snapverify").join("config.toml"))
}

/// Add the global config file to the builder when it exists.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    match global_config_path() {
        Some(path) if path.is_file() => {
            debug!(config_path = %path.display(), "Loading global configuration");
            Ok(builder.add_source(File::from(path).required(true)))
        }
        Some(path) => {
            debug!(
                config_path = %path.display(),
                "No global configuration file; using workspace and defaults"
            );
            Ok(builder)
        }
        None => {
            debug!("Neither XDG_CONFIG_HOME nor HOME is set; skipping global configuration");
            Ok(builder)
        }
    }
}
