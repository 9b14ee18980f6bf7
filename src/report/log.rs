//! Log embedding policy
//!
//! Decides whether a captured log is embedded in a report, trims it to the
//! configured size and applies the requested encoding.

use std::io::Write;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

/// How much of a log to submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPolicy {
    /// 0: never, 1: only on failure, 2: always
    pub level: u8,
    /// Maximum bytes to keep; negative for no limit, zero for nothing
    pub max_log: i64,
    /// Keep the last `max_log` bytes rather than the first
    pub last_log: bool,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self {
            level: 2,
            max_log: -1,
            last_log: true,
        }
    }
}

/// Encoding applied to an embedded log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCodec {
    Plain,
    Base64,
    GzipBase64,
}

impl LogPolicy {
    /// Same policy without a size limit
    pub fn unbounded(self) -> Self {
        Self {
            max_log: -1,
            ..self
        }
    }

    /// Encode `log` for embedding. Returns an empty string when the policy
    /// says the log should not be submitted.
    pub fn encode_log(&self, success: bool, log: &[u8], codec: LogCodec) -> String {
        if log.is_empty() || self.level == 0 || (self.level == 1 && success) || self.max_log == 0 {
            return String::new();
        }

        let trimmed = self.trim(log);
        match codec {
            LogCodec::Plain => String::from_utf8_lossy(&trimmed).into_owned(),
            LogCodec::Base64 => STANDARD.encode(&trimmed),
            LogCodec::GzipBase64 => match gzip(&trimmed) {
                Ok(compressed) => STANDARD.encode(compressed),
                Err(e) => {
                    tracing::warn!("cannot compress log: {}", e);
                    String::new()
                }
            },
        }
    }

    fn trim(&self, log: &[u8]) -> Vec<u8> {
        let limit = match usize::try_from(self.max_log) {
            Ok(limit) if log.len() > limit => limit,
            _ => return log.to_vec(),
        };

        let mut out = Vec::with_capacity(limit + 64);
        if self.last_log {
            out.extend_from_slice(format!("(Output trimmed to last {} bytes)\n..", limit).as_bytes());
            out.extend_from_slice(&log[log.len() - limit..]);
        } else {
            out.extend_from_slice(&log[..limit]);
            out.extend_from_slice(
                format!("..\n(Output trimmed to the first {} bytes)\n", limit).as_bytes(),
            );
        }
        out
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
