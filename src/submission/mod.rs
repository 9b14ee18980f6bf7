//! Submission orchestration
//!
//! A [`Submission`] runs its operations in order, writes one report file per
//! rendered operation into its scratch directory, then uploads the files.
//! A failing configure or build stops the submission. Scenario files
//! describe several submissions; see [`scenario`].

pub mod scenario;

pub use scenario::{Scenario, ScenarioError};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex_lite::{Regex, RegexBuilder};
use thiserror::Error;

use crate::ops::{Operation, OperationError, Test};
use crate::report::ReportContext;
use crate::upload::{UploadError, Uploader};

/// Name of the manual upload script written next to the artifacts
pub const UPLOAD_SCRIPT: &str = "UPLOAD.BAT";

/// Submission errors
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("operation '{info}' failed: {source}")]
    Operation {
        info: String,
        #[source]
        source: OperationError,
    },

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Result type for submission operations
pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// Drops operations whose info string matches at its start
#[derive(Debug, Clone)]
pub struct ExcludeFilter {
    pattern: String,
    regex: Regex,
}

impl ExcludeFilter {
    /// Case-insensitive, `.` matches newlines
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        let regex = RegexBuilder::new(&format!("^(?:{})", pattern))
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn excludes(&self, info: &str) -> bool {
        self.regex.is_match(info)
    }
}

/// What a submission did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionOutcome {
    /// Report files in upload order
    pub artifacts: Vec<PathBuf>,
    /// Operations executed, including a failing one that stopped the run
    pub executed: usize,
    /// A configure or build failure stopped the submission
    pub stopped_early: bool,
    /// 1 if any operation failed, else 0
    pub exit_code: i32,
}

/// One build row on the dashboard: ordered operations sharing a context
#[derive(Debug)]
pub struct Submission {
    ctx: ReportContext,
    ops: Vec<Operation>,
    exclude: Option<ExcludeFilter>,
    scratch_dir: PathBuf,
}

impl Submission {
    /// Scratch files go to `<scratch_root>/submit-<stamp>-<build name>`
    pub fn new(ctx: ReportContext) -> Self {
        let scratch_root = match std::env::current_dir() {
            Ok(cwd) if ctx.scratch_root.is_relative() => cwd.join(&ctx.scratch_root),
            _ => ctx.scratch_root.clone(),
        };
        let scratch_dir = scratch_root.join(format!(
            "submit-{}-{}",
            ctx.stamp,
            path_component(&ctx.build_name)
        ));
        Self {
            ctx,
            ops: Vec::new(),
            exclude: None,
            scratch_dir,
        }
    }

    pub fn with_exclude(mut self, filter: ExcludeFilter) -> Self {
        self.exclude = Some(filter);
        self
    }

    pub fn context(&self) -> &ReportContext {
        &self.ctx
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    fn is_excluded(&self, info: &str) -> bool {
        self.exclude.as_ref().map_or(false, |f| f.excludes(info))
    }

    /// Append an operation unless the exclude filter matches it.
    ///
    /// Test items are collected into a single [`Test`] placed where the first
    /// item arrived. Returns whether the operation was kept.
    pub fn push(&mut self, op: Operation) -> bool {
        let info = op.info();
        if self.is_excluded(&info) {
            tracing::debug!("skipping {} (excluded)", info);
            return false;
        }
        tracing::debug!("adding {}", info);

        match op {
            Operation::TestItem(item) => {
                let existing = self.ops.iter_mut().find_map(|op| match op {
                    Operation::Test(test) => Some(test),
                    _ => None,
                });
                match existing {
                    Some(test) => test.push(item),
                    None => self.ops.push(Operation::Test(Test::new(vec![item]))),
                }
            }
            op => self.ops.push(op),
        }
        true
    }

    /// Run every operation, write the report files and upload them.
    ///
    /// Nothing is uploaded in dry-run mode. An upload failure is returned
    /// as an error; operation failures are reported in the outcome.
    pub fn execute(&mut self, uploader: &dyn Uploader) -> SubmissionResult<SubmissionOutcome> {
        self.prepare_scratch_dir()?;

        let mut outcome = SubmissionOutcome::default();
        for (index, op) in self.ops.iter_mut().enumerate() {
            op.execute(&self.ctx).map_err(|source| SubmissionError::Operation {
                info: op.info(),
                source,
            })?;
            outcome.executed += 1;

            if let Some(doc) = op.render(&self.ctx) {
                let path = self.scratch_dir.join(format!("{:03}-{}.xml", index + 1, op.name()));
                write_file(&path, doc.to_xml())?;
                if matches!(op, Operation::Build(_)) {
                    outcome.artifacts.insert(0, path);
                } else {
                    outcome.artifacts.push(path);
                }
            }

            if op.exit_code() != 0 {
                outcome.exit_code = 1;
            }
            if op.is_gating() && !op.success() {
                tracing::warn!("{} failed, stopping submission", op.name());
                outcome.stopped_early = true;
                break;
            }
        }

        self.write_upload_script(&outcome.artifacts)?;

        if self.ctx.dry_run {
            tracing::info!(
                "Not uploading (dry run). Files are in {}",
                self.scratch_dir.display()
            );
        } else {
            tracing::info!("Uploading {} files..", outcome.artifacts.len());
            for path in &outcome.artifacts {
                uploader.upload_file(path)?;
            }
        }
        Ok(outcome)
    }

    fn prepare_scratch_dir(&self) -> SubmissionResult<()> {
        if self.scratch_dir.exists() {
            fs::remove_dir_all(&self.scratch_dir).map_err(|source| io_error(&self.scratch_dir, source))?;
        }
        fs::create_dir_all(&self.scratch_dir).map_err(|source| io_error(&self.scratch_dir, source))
    }

    /// `curl -T "<file>" <url>` per artifact, CRLF terminated
    fn write_upload_script(&self, artifacts: &[PathBuf]) -> SubmissionResult<()> {
        let script: String = artifacts
            .iter()
            .map(|path| format!("curl -T \"{}\" {}\r\n", path.display(), self.ctx.submit_url))
            .collect();
        write_file(&self.scratch_dir.join(UPLOAD_SCRIPT), script)
    }
}

/// Build names may contain separators; keep them inside one directory name
fn path_component(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

fn write_file(path: &Path, contents: String) -> SubmissionResult<()> {
    fs::write(path, contents).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: io::Error) -> SubmissionError {
    SubmissionError::Io {
        path: path.display().to_string(),
        source,
    }
}
