//! Reporting context shared by every operation
//!
//! [`ReportContext`] carries the submission identity (site, build name,
//! stamp), the log policy and execution settings. It is built once from the
//! merged configuration and passed by reference; nothing mutates it during a
//! run.

mod log;

pub use log::{LogCodec, LogPolicy};

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};

use crate::document::DocumentNode;

/// Value of the `Generator` attribute
pub const GENERATOR: &str = "ccdash-0.2";

const TIME_FORMAT: &str = "%b %d %H:%M GMT";

/// Host operating system identity for the `<Site>` header
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OsInfo {
    pub name: String,
    pub release: String,
    pub version: String,
}

impl OsInfo {
    #[cfg(unix)]
    pub fn detect() -> Self {
        match nix::sys::utsname::uname() {
            Ok(uts) => Self {
                name: uts.sysname().to_string_lossy().into_owned(),
                release: uts.release().to_string_lossy().into_owned(),
                version: uts.version().to_string_lossy().into_owned(),
            },
            Err(e) => {
                tracing::warn!("uname failed: {}", e);
                Self::fallback()
            }
        }
    }

    #[cfg(not(unix))]
    pub fn detect() -> Self {
        Self::fallback()
    }

    fn fallback() -> Self {
        let mut name = std::env::consts::OS.to_string();
        if let Some(first) = name.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        Self {
            name,
            release: String::new(),
            version: String::new(),
        }
    }
}

/// Immutable settings for one submission
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub submit_url: String,
    pub site_name: String,
    pub build_name: String,
    pub stamp: String,
    /// Default working directory for commands
    pub wdir: PathBuf,
    pub os: OsInfo,
    pub test_timeout: Option<Duration>,
    pub log_policy: LogPolicy,
    /// Write artifacts but do not upload
    pub dry_run: bool,
    /// Save XML output here
    pub output: Option<PathBuf>,
    pub scratch_root: PathBuf,
    /// Embed the full build log in `<Build>`
    pub build_log: bool,
    /// Keep the build output at this path
    pub build_log_file: Option<PathBuf>,
    pub no_update: bool,
}

impl ReportContext {
    pub fn new(
        submit_url: impl Into<String>,
        site_name: impl Into<String>,
        build_name: impl Into<String>,
        stamp: impl Into<String>,
    ) -> Self {
        Self {
            submit_url: submit_url.into(),
            site_name: site_name.into(),
            build_name: build_name.into(),
            stamp: stamp.into(),
            wdir: PathBuf::from("."),
            os: OsInfo::detect(),
            test_timeout: Some(Duration::from_secs(30 * 60)),
            log_policy: LogPolicy::default(),
            dry_run: false,
            output: None,
            scratch_root: PathBuf::from("tmp"),
            build_log: false,
            build_log_file: None,
            no_update: false,
        }
    }

    /// Copy of this context with a different build identity
    pub fn for_submission(&self, build_name: &str, stamp: &str) -> Self {
        let mut ctx = self.clone();
        ctx.build_name = build_name.to_string();
        ctx.stamp = stamp.to_string();
        ctx
    }

    /// `<Site>` header wrapping Build, Configure and Testing reports
    pub fn site_node(&self) -> DocumentNode {
        DocumentNode::new("Site")
            .with_attr("Name", &self.site_name)
            .with_attr("Generator", GENERATOR)
            .with_attr("BuildName", &self.build_name)
            .with_attr("BuildStamp", &self.stamp)
            .with_attr("OSName", &self.os.name)
            .with_attr("OSRelease", &self.os.release)
            .with_attr("OSVersion", &self.os.version)
    }

    /// Encode a log under this context's policy
    pub fn encode_log(&self, success: bool, log: &[u8], codec: LogCodec) -> String {
        self.log_policy.encode_log(success, log, codec)
    }
}

/// Dashboard timestamp, always in GMT
pub fn encode_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Elapsed time as decimal minutes with three places
pub fn encode_duration(elapsed: Duration) -> String {
    format!("{:.3}", elapsed.as_secs_f64() / 60.0)
}

/// Time between two instants; zero if `end` precedes `start`
pub fn elapsed_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
    (end - start).to_std().unwrap_or_default()
}

/// Parse a dashboard timestamp back, assuming `year` since the format
/// carries none.
pub fn parse_time(text: &str, year: i32) -> Option<DateTime<Utc>> {
    let bare = text.trim().strip_suffix("GMT").unwrap_or(text).trim();
    let naive = NaiveDateTime::parse_from_str(&format!("{} {}", year, bare), "%Y %b %d %H:%M").ok()?;
    Utc.from_local_datetime(&naive).single()
}

/// Current year, for [`parse_time`]
pub fn current_year() -> i32 {
    Utc::now().year()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_time() {
        let t = Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 59).unwrap();
        assert_eq!(encode_time(t), "Mar 07 14:05 GMT");
    }

    #[test]
    fn test_encode_duration() {
        assert_eq!(encode_duration(Duration::from_secs(90)), "1.500");
        assert_eq!(encode_duration(Duration::ZERO), "0.000");
    }

    #[test]
    fn test_parse_time_round_trip() {
        let t = Utc.with_ymd_and_hms(2024, 11, 2, 8, 30, 0).unwrap();
        assert_eq!(parse_time(&encode_time(t), 2024), Some(t));
        assert_eq!(parse_time("garbage", 2024), None);
    }

    #[test]
    fn test_site_node_attributes() {
        let ctx = ReportContext::new("http://dash/submit.php", "host1", "linux-gcc", "20240101-0000-Nightly");
        let site = ctx.site_node();
        assert_eq!(site.tag, "Site");
        assert_eq!(site.attr("Name"), Some("host1"));
        assert_eq!(site.attr("Generator"), Some(GENERATOR));
        assert_eq!(site.attr("BuildStamp"), Some("20240101-0000-Nightly"));
        assert!(site.attr("OSName").is_some());
    }

    #[test]
    fn test_for_submission_keeps_site() {
        let ctx = ReportContext::new("u", "host1", "a", "s1");
        let sub = ctx.for_submission("b", "s2");
        assert_eq!(sub.site_name, "host1");
        assert_eq!(sub.build_name, "b");
        assert_eq!(sub.stamp, "s2");
    }
}
