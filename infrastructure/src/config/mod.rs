//! Configuration file loading for bitrelay
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `BITRELAY_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./bitrelay.toml` or `./.bitrelay.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/bitrelay/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileClientConfig, FileConfig, FileEventsConfig, FileTimeoutsConfig,
};
pub use loader::ConfigLoader;
