//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("service.mount_path", "mnt/fuse-cpp-ramfs")?
        .set_default("snapshot.prefix", "pickle_tmp")?
        .set_default("snapshot.artifact_dir", ".")?
        .set_default("snapshot.backend", "pickle")
}
