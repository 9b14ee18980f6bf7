//! Update operation: compare the working copy with the repository head,
//! update it and report the files that changed in between.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{is_disabled, resolve_wdir, OperationError, Timing};
use crate::document::DocumentNode;
use crate::report::{ReportContext, GENERATOR};
use crate::vcs::{backend_for, CommitInfo, FileRevInfo, VcsError, VersionControl};

#[derive(Debug)]
pub struct Update {
    pub wdir: PathBuf,
    /// Compare only; never run the update
    pub check_only: bool,
    pub disabled: bool,
    backend: Box<dyn VersionControl>,
    timing: Timing,
    base: Option<CommitInfo>,
    head: Option<CommitInfo>,
    file_revs: BTreeMap<String, FileRevInfo>,
}

impl Update {
    pub fn new(wdir: impl Into<PathBuf>, backend: Box<dyn VersionControl>) -> Self {
        Self {
            wdir: wdir.into(),
            check_only: false,
            disabled: false,
            backend,
            timing: Timing::default(),
            base: None,
            head: None,
            file_revs: BTreeMap::new(),
        }
    }

    /// Subversion update of `wdir`
    pub fn svn(wdir: impl Into<PathBuf>) -> Result<Self, OperationError> {
        let wdir = wdir.into();
        let backend = backend_for("SVN", &wdir)?;
        Ok(Self::new(wdir, backend))
    }

    /// Attributes: `wdir`, `type` (default SVN), `checkonly`, `disabled`.
    /// `--no-update` forces check-only.
    pub fn from_declaration(ctx: &ReportContext, node: &DocumentNode) -> Result<Self, OperationError> {
        let wdir = resolve_wdir(ctx, node);
        let kind = node.attr("type").filter(|t| !t.is_empty()).unwrap_or("SVN");
        let backend = backend_for(kind, &wdir)?;

        let mut update = Self::new(wdir, backend);
        update.check_only = ctx.no_update || node.attr("checkonly").map_or(false, |v| !v.is_empty());
        update.disabled = is_disabled(node);
        Ok(update)
    }

    pub fn info(&self) -> String {
        format!(
            "update cmd='{}' wdir='{}'",
            self.backend.update_command(),
            self.wdir.display()
        )
    }

    pub fn base(&self) -> Option<&CommitInfo> {
        self.base.as_ref()
    }

    pub fn head(&self) -> Option<&CommitInfo> {
        self.head.as_ref()
    }

    pub fn file_revs(&self) -> &BTreeMap<String, FileRevInfo> {
        &self.file_revs
    }

    /// Any backend failure aborts the run
    pub fn execute(&mut self) -> Result<(), OperationError> {
        if self.disabled {
            tracing::info!("Update operation disabled");
            return Ok(());
        }
        self.timing.begin();
        tracing::info!("Checking {} work dir", self.backend.kind());

        let local = self.backend.local_revision_info()?;
        let base = first_commit(self.backend.commit_log(&local.root, &local.revision, None)?)?;
        let head = first_commit(self.backend.commit_log(&local.root, "HEAD", None)?)?;

        let mut logs = self
            .backend
            .commit_log(&local.root, &base.revision, Some(&head.revision))?;
        if logs.first().map_or(false, |c| c.revision == base.revision) {
            logs.remove(0);
        }

        for commit in logs {
            for (path, _action) in &commit.items {
                self.file_revs
                    .entry(path.clone())
                    .or_insert_with(|| FileRevInfo::new(path))
                    .add_commit(commit.clone());
            }
        }

        if base.revision == head.revision {
            tracing::info!("  source directory is up to date");
        } else {
            tracing::info!(
                "  local as at rev {}, repository is at rev {}",
                base.revision,
                head.revision
            );
            if self.check_only {
                tracing::info!("  update is disabled by cmd-line");
            } else {
                self.backend.apply_update()?;
            }
        }

        self.base = Some(base);
        self.head = Some(head);
        self.timing.finish();
        Ok(())
    }

    /// Dry comparison against the repository. Returns true if the working
    /// copy needs an update.
    pub fn check_status(&self) -> Result<bool, OperationError> {
        let mut need_update = false;
        for entry in self.backend.status(&self.wdir)? {
            if entry.is_out_of_date() {
                tracing::info!("  svn: {}\t{}", entry.remote_status, entry.path);
                need_update = true;
            }
        }
        if !need_update {
            tracing::info!("Up to date");
        }
        Ok(need_update)
    }

    /// Standalone `<Update>` document (not wrapped in `<Site>`)
    pub fn render(&self, ctx: &ReportContext) -> Option<DocumentNode> {
        if self.disabled {
            return None;
        }
        let head_rev = self.head.as_ref().map(|c| c.revision.as_str()).unwrap_or_default();

        let mut update = DocumentNode::new("Update")
            .with_attr("Mode", "Client")
            .with_attr("Generator", GENERATOR);
        update.push_leaf("Site", &ctx.site_name);
        update.push_leaf("BuildName", &ctx.build_name);
        update.push_leaf("BuildStamp", &ctx.stamp);
        update.push_leaf("UpdateCommand", self.backend.update_command());
        update.push_leaf("UpdateType", self.backend.kind());
        update.push_leaf("UpdateReturnStatus", "");
        self.timing.render_into(&mut update);

        let directory = update.push(DocumentNode::new("Directory"));
        directory.push_leaf("Name", self.wdir.display().to_string());
        for info in self.file_revs.values() {
            directory.push(render_updated(info, head_rev));
        }
        Some(update)
    }
}

fn first_commit(commits: Vec<CommitInfo>) -> Result<CommitInfo, OperationError> {
    commits
        .into_iter()
        .next()
        .ok_or_else(|| VcsError::NoInfo("svn log".to_string()).into())
}

fn render_updated(info: &FileRevInfo, head_rev: &str) -> DocumentNode {
    let mut updated = DocumentNode::new("Updated");
    updated.push(DocumentNode::leaf("File", &info.file).with_attr("Directory", &info.dir));
    updated.push_leaf("Directory", &info.dir);
    updated.push_leaf("FullName", &info.full_name);

    let latest = info.latest().cloned().unwrap_or_default();
    updated.push_leaf("CheckinDate", latest.date);
    updated.push_leaf("Author", latest.author);
    updated.push_leaf("Log", latest.message);
    updated.push_leaf("Revision", head_rev);

    if let Some(earliest) = info.earliest().filter(|c| c.revision != head_rev) {
        updated.push_leaf("PriorRevision", &earliest.revision);
        for commit in &info.commits {
            let revisions = updated.push(DocumentNode::new("Revisions"));
            revisions.push_leaf("Revision", &commit.revision);
            revisions.push_leaf("Author", &commit.author);
            revisions.push_leaf("Date", &commit.date);
            revisions.push_leaf("Comment", &commit.message);
        }
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::{PathStatus, RevisionInfo};
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;

    fn commit(rev: &str, author: &str, paths: &[&str]) -> CommitInfo {
        CommitInfo {
            revision: rev.to_string(),
            author: author.to_string(),
            date: format!("2024-01-{:0>2}", rev),
            message: format!("change {}", rev),
            items: paths.iter().map(|p| (p.to_string(), "M".to_string())).collect(),
        }
    }

    #[derive(Debug, Default)]
    struct FakeVcs {
        base: String,
        history: Vec<CommitInfo>,
        updated: Rc<Cell<bool>>,
        fail: bool,
    }

    impl VersionControl for FakeVcs {
        fn kind(&self) -> &'static str {
            "SVN"
        }

        fn update_command(&self) -> &'static str {
            "svn up"
        }

        fn local_revision_info(&self) -> Result<RevisionInfo, VcsError> {
            if self.fail {
                return Err(VcsError::Command("svn: E155007: not a working copy".into()));
            }
            Ok(RevisionInfo {
                revision: self.base.clone(),
                root: "https://svn.example.org/repo".into(),
                ..Default::default()
            })
        }

        fn commit_log(&self, _root: &str, from: &str, to: Option<&str>) -> Result<Vec<CommitInfo>, VcsError> {
            let head = self.history.last().map(|c| c.revision.clone()).unwrap_or_default();
            let from = if from == "HEAD" { head.clone() } else { from.to_string() };
            let to = to.map(str::to_string).unwrap_or_else(|| from.clone());
            let rev = |c: &CommitInfo| c.revision.parse::<u32>().unwrap_or(0);
            let (lo, hi) = (from.parse::<u32>().unwrap_or(0), to.parse::<u32>().unwrap_or(0));
            Ok(self
                .history
                .iter()
                .filter(|c| rev(c) >= lo && rev(c) <= hi)
                .cloned()
                .collect())
        }

        fn apply_update(&self) -> Result<(), VcsError> {
            self.updated.set(true);
            Ok(())
        }

        fn status(&self, _path: &Path) -> Result<Vec<PathStatus>, VcsError> {
            Ok(vec![
                PathStatus {
                    path: "a.c".into(),
                    remote_status: "modified".into(),
                },
                PathStatus {
                    path: "b.c".into(),
                    remote_status: "none".into(),
                },
            ])
        }
    }

    fn ctx() -> ReportContext {
        ReportContext::new("http://dash/submit.php", "host", "linux", "20240101-0000-Nightly")
    }

    fn history() -> Vec<CommitInfo> {
        vec![
            commit("10", "alice", &["/trunk/a.c"]),
            commit("11", "bob", &["/trunk/a.c", "/trunk/lib/b.c"]),
            commit("12", "carol", &["/trunk/a.c"]),
        ]
    }

    #[test]
    fn test_update_collects_file_history() {
        let fake = FakeVcs {
            base: "10".into(),
            history: history(),
            ..Default::default()
        };
        let mut update = Update::new("/src", Box::new(fake));
        update.execute().unwrap();

        assert_eq!(update.base().unwrap().revision, "10");
        assert_eq!(update.head().unwrap().revision, "12");
        let a = &update.file_revs()["/trunk/a.c"];
        let revs: Vec<&str> = a.commits.iter().map(|c| c.revision.as_str()).collect();
        assert_eq!(revs, vec!["11", "12"]);
        assert_eq!(update.file_revs()["/trunk/lib/b.c"].commits.len(), 1);
    }

    #[test]
    fn test_render_prior_revision_only_when_head_differs() {
        let fake = FakeVcs {
            base: "10".into(),
            history: history(),
            ..Default::default()
        };
        let mut update = Update::new("/src", Box::new(fake));
        update.execute().unwrap();
        let doc = update.render(&ctx()).unwrap();

        assert_eq!(doc.tag, "Update");
        assert_eq!(doc.attr("Mode"), Some("Client"));
        assert_eq!(doc.child_text("UpdateType"), Some("SVN"));

        let dir = doc.child("Directory").unwrap();
        assert_eq!(dir.child_text("Name"), Some("/src"));
        let updated: Vec<&DocumentNode> = dir.children_named("Updated").collect();
        assert_eq!(updated.len(), 2);

        // /trunk/a.c: touched by 11 and 12, head is 12 -> prior revision 11
        let a = updated[0];
        assert_eq!(a.child_text("FullName"), Some("/trunk/a.c"));
        assert_eq!(a.child("File").unwrap().attr("Directory"), Some("/trunk"));
        assert_eq!(a.child_text("Author"), Some("carol"));
        assert_eq!(a.child_text("Revision"), Some("12"));
        assert_eq!(a.child_text("PriorRevision"), Some("11"));
        assert_eq!(a.children_named("Revisions").count(), 2);

        // /trunk/lib/b.c: only touched by 11
        let b = updated[1];
        assert_eq!(b.child_text("PriorRevision"), Some("11"));
    }

    #[test]
    fn test_single_commit_at_head_has_no_prior_revision() {
        let fake = FakeVcs {
            base: "11".into(),
            history: history(),
            ..Default::default()
        };
        let mut update = Update::new("/src", Box::new(fake));
        update.execute().unwrap();
        let doc = update.render(&ctx()).unwrap();
        let a = doc.find("Updated").unwrap();
        assert_eq!(a.child_text("Revision"), Some("12"));
        assert!(a.child("PriorRevision").is_none());
        assert!(a.child("Revisions").is_none());
    }

    #[test]
    fn test_check_only_never_updates() {
        let updated = Rc::new(Cell::new(false));
        let mut update = Update::new(
            "/src",
            Box::new(FakeVcs {
                base: "10".into(),
                history: history(),
                updated: Rc::clone(&updated),
                ..Default::default()
            }),
        );
        update.check_only = true;
        update.execute().unwrap();
        assert!(!updated.get());
    }

    #[test]
    fn test_behind_head_applies_update() {
        let updated = Rc::new(Cell::new(false));
        let mut update = Update::new(
            "/src",
            Box::new(FakeVcs {
                base: "10".into(),
                history: history(),
                updated: Rc::clone(&updated),
                ..Default::default()
            }),
        );
        update.execute().unwrap();
        assert!(updated.get());
    }

    #[test]
    fn test_backend_failure_is_fatal() {
        let mut update = Update::new(
            "/src",
            Box::new(FakeVcs {
                fail: true,
                ..Default::default()
            }),
        );
        assert!(matches!(update.execute(), Err(OperationError::Vcs(_))));
    }

    #[test]
    fn test_check_status_reports_out_of_date() {
        let update = Update::new("/src", Box::new(FakeVcs::default()));
        assert!(update.check_status().unwrap());
    }

    #[test]
    fn test_declaration_rejects_unknown_type() {
        let node = DocumentNode::new("Update").with_attr("type", "git");
        let err = Update::from_declaration(&ctx(), &node).unwrap_err();
        assert!(matches!(err, OperationError::Vcs(VcsError::Unsupported(_))));
    }
}
