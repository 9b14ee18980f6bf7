//! Configuration layers
//!
//! Settings are merged from three layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. TOML file (`--config`, or `./ccdash.toml` if present)
//! 3. CLI flags

mod defaults;
mod merge;
mod settings;

pub use defaults::{BuiltinDefaults, TEST_TIMEOUT_SECONDS};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    now_timestamp, ConfigError, ConfigOrigin, ConfigSource, Settings, DEFAULT_CONFIG_FILE,
    TIMESTAMP_FORMAT,
};
