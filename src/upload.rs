//! Upload collaborator
//!
//! Submissions hand their report files to an [`Uploader`]:
//! - [`CurlUploader`]: HTTP PUT via the `curl` command line client
//! - [`MemoryUploader`]: in-process recorder for tests and dry runs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::document::DocumentNode;
use crate::exec::{ExecRequest, ProcessRunner};
use crate::report::ReportContext;

/// Upload errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload of {path} failed: {message}")]
    Failed { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload rejected: {0}")]
    Rejected(String),
}

/// Transport for finished report documents
pub trait Uploader: Send + Sync {
    /// Upload one file from disk
    fn upload_file(&self, path: &Path) -> Result<(), UploadError>;

    /// Upload an in-memory document through a temporary file
    fn upload(&self, bytes: &[u8]) -> Result<(), UploadError> {
        let mut file = tempfile::Builder::new()
            .prefix("ccdash")
            .suffix(".xml")
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        self.upload_file(file.path())
    }
}

/// Runs `curl -s -f -T <file> <url>`
#[derive(Debug, Clone)]
pub struct CurlUploader {
    url: String,
    runner: ProcessRunner,
}

impl CurlUploader {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            runner: ProcessRunner::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The command line used for one file
    pub fn command_for(&self, path: &Path) -> String {
        format!("curl -s -f -T \"{}\" \"{}\"", path.display(), self.url)
    }
}

impl Uploader for CurlUploader {
    fn upload_file(&self, path: &Path) -> Result<(), UploadError> {
        tracing::info!("Uploading {} to {}", path.display(), self.url);
        let request = ExecRequest::new(self.command_for(path)).capture();
        let result = self.runner.run(&request);
        if result.is_failure() {
            return Err(UploadError::Failed {
                path: path.display().to_string(),
                message: result.to_string(),
            });
        }
        Ok(())
    }
}

/// Deliver one report: save it to the context's output path if set, then
/// upload it unless this is a dry run.
pub fn submit_document(
    ctx: &ReportContext,
    doc: &DocumentNode,
    uploader: &dyn Uploader,
) -> Result<(), UploadError> {
    let xml = doc.to_xml();
    if let Some(path) = &ctx.output {
        std::fs::write(path, &xml)?;
        tracing::info!("output xml saved to '{}'", path.display());
        if ctx.dry_run {
            return Ok(());
        }
        return uploader.upload_file(path);
    }
    if ctx.dry_run {
        tracing::info!("not uploading (dry run)");
        return Ok(());
    }
    uploader.upload(xml.as_bytes())
}

/// One recorded upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

/// Keeps uploads in memory. Can be told to reject everything.
#[derive(Debug, Default)]
pub struct MemoryUploader {
    uploads: Mutex<Vec<RecordedUpload>>,
    reject: bool,
}

impl MemoryUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            uploads: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    pub fn uploads(&self) -> Vec<RecordedUpload> {
        match self.uploads.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Uploader for MemoryUploader {
    fn upload_file(&self, path: &Path) -> Result<(), UploadError> {
        if self.reject {
            return Err(UploadError::Rejected(path.display().to_string()));
        }
        let contents = std::fs::read(path)?;
        let record = RecordedUpload {
            path: path.to_path_buf(),
            contents,
        };
        match self.uploads.lock() {
            Ok(mut guard) => guard.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }
}
