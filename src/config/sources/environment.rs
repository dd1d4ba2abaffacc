//! Environment variable source: SNAPVERIFY__* prefix with __ separator

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
///
/// `SNAPVERIFY__TIMING__MOUNT_SETTLE_MS=0` sets `timing.mount_settle_ms`. The
/// single-underscore logging variables (`SNAPVERIFY_LOG`, ...) are not matched.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(
        Environment::with_prefix("SNAPVERIFY")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    ))
}
