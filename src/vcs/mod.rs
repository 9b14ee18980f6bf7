//! Version-control collaborator used by the Update operation
//!
//! [`VersionControl`] is the seam between Update and the backend; the only
//! shipped backend drives the Subversion command-line client.

mod svn;

pub use svn::SvnClient;

use std::fmt;
use std::path::Path;

use thiserror::Error;

use crate::document::DocumentError;

/// Version-control failures. All of them abort the run.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("{0}")]
    Command(String),

    #[error("cannot parse output of '{command}': {source}")]
    Parse {
        command: String,
        #[source]
        source: DocumentError,
    },

    #[error("no info from command: {0}")]
    NoInfo(String),

    #[error("unsupported repository type: {0}")]
    Unsupported(String),
}

/// One commit
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitInfo {
    pub revision: String,
    pub author: String,
    pub date: String,
    pub message: String,
    /// `(path, action)` pairs, e.g. `("/trunk/a.c", "M")`
    pub items: Vec<(String, String)>,
}

/// Commits touching one path, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRevInfo {
    pub full_name: String,
    pub file: String,
    pub dir: String,
    pub commits: Vec<CommitInfo>,
}

impl FileRevInfo {
    pub fn new(full_name: &str) -> Self {
        let (dir, file) = full_name.rsplit_once('/').unwrap_or(("", full_name));
        Self {
            full_name: full_name.to_string(),
            file: file.to_string(),
            dir: dir.to_string(),
            commits: Vec::new(),
        }
    }

    pub fn add_commit(&mut self, commit: CommitInfo) {
        self.commits.push(commit);
    }

    pub fn earliest(&self) -> Option<&CommitInfo> {
        self.commits.first()
    }

    pub fn latest(&self) -> Option<&CommitInfo> {
        self.commits.last()
    }
}

/// Working-copy revision and repository root
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionInfo {
    pub revision: String,
    pub author: String,
    pub date: String,
    pub root: String,
}

/// Remote status of one working-copy path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStatus {
    pub path: String,
    pub remote_status: String,
}

impl PathStatus {
    /// True if the repository has a change for this path
    pub fn is_out_of_date(&self) -> bool {
        !matches!(
            self.remote_status.as_str(),
            "" | "none" | "ignored" | "unversioned" | "external"
        )
    }
}

pub trait VersionControl: fmt::Debug {
    /// Repository type as reported in `<UpdateType>`
    fn kind(&self) -> &'static str;

    /// Command reported in `<UpdateCommand>`
    fn update_command(&self) -> &'static str;

    /// Revision of the working copy base
    fn local_revision_info(&self) -> Result<RevisionInfo, VcsError>;

    /// Commits from `from` to `to` (inclusive), or just `from` when `to` is
    /// `None`, oldest first
    fn commit_log(&self, root: &str, from: &str, to: Option<&str>) -> Result<Vec<CommitInfo>, VcsError>;

    /// Bring the working copy up to date
    fn apply_update(&self) -> Result<(), VcsError>;

    /// Remote status of every entry under `path`
    fn status(&self, path: &Path) -> Result<Vec<PathStatus>, VcsError>;
}

/// Backend for a scenario `type` attribute
pub fn backend_for(kind: &str, wdir: &Path) -> Result<Box<dyn VersionControl>, VcsError> {
    if kind.eq_ignore_ascii_case("svn") {
        Ok(Box::new(SvnClient::new(wdir)))
    } else {
        Err(VcsError::Unsupported(kind.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_rev_info_split() {
        let info = FileRevInfo::new("/trunk/src/main.c");
        assert_eq!(info.file, "main.c");
        assert_eq!(info.dir, "/trunk/src");

        let bare = FileRevInfo::new("README");
        assert_eq!(bare.file, "README");
        assert_eq!(bare.dir, "");
    }

    #[test]
    fn test_out_of_date_statuses() {
        let status = |s: &str| PathStatus {
            path: "a".into(),
            remote_status: s.into(),
        };
        assert!(status("modified").is_out_of_date());
        assert!(status("added").is_out_of_date());
        assert!(!status("none").is_out_of_date());
        assert!(!status("unversioned").is_out_of_date());
    }

    #[test]
    fn test_backend_for_unknown_type() {
        let err = backend_for("CVS", Path::new(".")).unwrap_err();
        assert_eq!(err.to_string(), "unsupported repository type: CVS");
        assert_eq!(backend_for("SVN", Path::new(".")).unwrap().kind(), "SVN");
    }
}
