//! Workspace config files: `config/config.toml`, then `config/{SNAPVERIFY_ENV}.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::Path;
use tracing::debug;

const DEFAULT_ENV: &str = "development";

/// Add workspace config files to the builder, base file first.
///
/// `SNAPVERIFY_ENV` picks the overlay (default `development`); it must be a bare
/// name so the overlay cannot point outside `config/`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let env_name = std::env::var("SNAPVERIFY_ENV").ok();
    let overlay = overlay_file_name(env_name.as_deref())?;
    let config_dir = workspace_root.join("config");

    let mut builder = builder;
    for path in [config_dir.join("config.toml"), config_dir.join(&overlay)] {
        if path.is_file() {
            debug!(config_path = %path.display(), "Loading workspace configuration");
            builder = builder.add_source(File::from(path).required(true));
        }
    }
    Ok(builder)
}

fn overlay_file_name(env_name: Option<&str>) -> Result<String, ConfigError> {
    let name = match env_name {
        None | Some("") => DEFAULT_ENV,
        Some(name) => name,
    };
    let valid = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(ConfigError::Message(format!(
            "SNAPVERIFY_ENV must be a bare name of letters, digits, '-' or '_', got {:?}",
            name
        )));
    }
    Ok(format!("{}.toml", name))
}
