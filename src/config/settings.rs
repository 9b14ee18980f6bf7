//! Merged client settings
//!
//! [`Settings::load`] merges built-in defaults, an optional TOML file and
//! CLI overrides, validates the result and remembers which layers
//! contributed. [`Settings::context`] turns it into a [`ReportContext`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::report::{LogPolicy, OsInfo, ReportContext};

/// Config file read from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "ccdash.toml";

/// Build timestamp format, e.g. `20240131-2055-07`
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M-%S";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid settings: {0}")]
    Invalid(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("one or more mandatory options are missing: {0}")]
    Missing(String),
}

/// Origin of a configuration layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Client settings after merging all layers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    pub url: Option<String>,
    pub site: Option<String>,
    pub build_name: Option<String>,
    pub group: Option<String>,
    pub timestamp: Option<String>,
    pub wdir: Option<PathBuf>,
    pub dry_run: bool,
    pub output: Option<PathBuf>,
    pub log_level: u8,
    pub max_log: i64,
    pub last_log: bool,
    pub test_timeout_seconds: u64,
    pub build_log: bool,
    pub build_log_file: Option<PathBuf>,
    pub no_update: bool,
    pub scratch_root: PathBuf,

    #[serde(skip)]
    pub sources: Vec<ConfigSource>,
}

impl Settings {
    /// Merge defaults, the config file and CLI overrides.
    ///
    /// An explicitly named file must exist; the default file is optional.
    pub fn load(config_path: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
        }];

        let file = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
        };
        if let Some(path) = file {
            layers.push(load_toml_file(&path)?);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.display().to_string()),
            });
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
            });
        }

        let merged = merge_layers(layers);
        let mut settings: Settings =
            serde_json::from_value(merged).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        settings.sources = sources;
        settings.validate()?;
        tracing::debug!(?settings.sources, "configuration loaded");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_level > 2 {
            return Err(ConfigError::Validation(format!(
                "log_level must be in 0..=2, got {}",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Fail unless every submission identity field is set
    pub fn require_identity(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [
            ("url", &self.url),
            ("site", &self.site),
            ("timestamp", &self.timestamp),
            ("build_name", &self.build_name),
            ("group", &self.group),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing.join(", ")))
        }
    }

    /// `<timestamp>-<group>`
    pub fn stamp(&self) -> String {
        format!(
            "{}-{}",
            self.timestamp.as_deref().unwrap_or_default(),
            self.group.as_deref().unwrap_or_default()
        )
    }

    /// Fill the timestamp with the current local time if not given
    pub fn with_current_timestamp(mut self) -> Self {
        if self.timestamp.as_deref().map_or(true, str::is_empty) {
            self.timestamp = Some(now_timestamp());
        }
        self
    }

    pub fn log_policy(&self) -> LogPolicy {
        LogPolicy {
            level: self.log_level,
            max_log: self.max_log,
            last_log: self.last_log,
        }
    }

    /// Reporting context for these settings. Identity fields may be empty.
    pub fn context(&self) -> ReportContext {
        ReportContext {
            submit_url: self.url.clone().unwrap_or_default(),
            site_name: self.site.clone().unwrap_or_default(),
            build_name: self.build_name.clone().unwrap_or_default(),
            stamp: self.stamp(),
            wdir: self.wdir.clone().unwrap_or_else(|| PathBuf::from(".")),
            os: OsInfo::detect(),
            test_timeout: (self.test_timeout_seconds > 0)
                .then(|| Duration::from_secs(self.test_timeout_seconds)),
            log_policy: self.log_policy(),
            dry_run: self.dry_run,
            output: self.output.clone(),
            scratch_root: self.scratch_root.clone(),
            build_log: self.build_log,
            build_log_file: self.build_log_file.clone(),
            no_update: self.no_update,
        }
    }
}

/// Current local time as a build timestamp
pub fn now_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Load a TOML file as a JSON value for merging
fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let toml_value: toml::Value = toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(toml_to_json(toml_value))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}
