//! Built-in defaults (lowest layer)

use serde::{Deserialize, Serialize};

/// Default test timeout: 30 minutes
pub const TEST_TIMEOUT_SECONDS: u64 = 30 * 60;

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Log submission level (default: 2, always)
    pub log_level: u8,

    /// Maximum log bytes (default: -1, unlimited)
    pub max_log: i64,

    /// Keep the tail of oversized logs (default: true)
    pub last_log: bool,

    /// Per-test timeout in seconds (default: 1800)
    pub test_timeout_seconds: u64,

    /// Parent of per-submission scratch directories (default: "tmp")
    pub scratch_root: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            log_level: 2,
            max_log: -1,
            last_log: true,
            test_timeout_seconds: TEST_TIMEOUT_SECONDS,
            scratch_root: "tmp".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "log_level": self.log_level,
            "max_log": self.max_log,
            "last_log": self.last_log,
            "test_timeout_seconds": self.test_timeout_seconds,
            "scratch_root": self.scratch_root,
            "dry_run": false,
            "build_log": false,
            "no_update": false
        })
    }
}
