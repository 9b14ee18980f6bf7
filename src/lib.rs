//! ccdash - build, test and submit results to a CDash dashboard
//!
//! Runs configure, build, test and source update steps, captures their
//! output, classifies compiler diagnostics and renders the dashboard's XML
//! report documents. Reports are uploaded one at a time, merged from earlier
//! runs, or driven in bulk from a scenario file.

pub mod config;
pub mod document;
pub mod exec;
pub mod merge;
pub mod ops;
pub mod report;
pub mod submission;
pub mod telemetry;
pub mod upload;
pub mod vcs;

pub use ccdash_classifier::{DiagnosticKind, DiagnosticRecord, OutputClassifier};
pub use config::{ConfigError, Settings};
pub use document::{parse_document, DocumentNode};
pub use exec::{ExecRequest, ExecutionResult, ProcessRunner};
pub use merge::{MergeError, MergedTesting, ReportMerger};
pub use ops::{Build, Configure, FileWrite, Operation, OperationError, Test, TestItem, Update};
pub use report::{LogCodec, LogPolicy, ReportContext};
pub use submission::{Scenario, ScenarioError, Submission, SubmissionError, SubmissionOutcome};
pub use upload::{submit_document, CurlUploader, MemoryUploader, UploadError, Uploader};
pub use vcs::{VcsError, VersionControl};
