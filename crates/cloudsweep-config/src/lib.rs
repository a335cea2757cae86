//! Configuration loading for cloudsweep
//!
//! Settings come from one TOML file overlaid with `CLOUDSWEEP_` environment
//! variables, nested keys separated by `__`. Example:
//!
//! ```toml
//! state_file = "/var/lib/cloudsweep/state.json"
//!
//! [notify]
//! from = "cloudsweep@example.com"
//! to = ["tools-squad@example.com"]
//!
//! [namespaces.qac]
//! providers = ["azure", "ec2"]
//! default_ttl = "36h"
//! ```

pub mod error;
pub mod settings;

// Re-exports
pub use error::{ConfigError, Result};
pub use settings::{
    Activity, DefaultsConfig, NamespaceConfig, NotifyConfig, ScheduleConfig, SweepConfig,
};

use std::path::Path;

const ENV_PREFIX: &str = "CLOUDSWEEP";
const ENV_SEPARATOR: &str = "__";

/// Load and validate the configuration at `path`.
pub fn load(path: &Path) -> Result<SweepConfig> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let settings = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator(ENV_SEPARATOR))
        .build()?;
    let parsed: SweepConfig = settings.try_deserialize()?;
    parsed.validate()?;
    Ok(parsed)
}
