//! Subversion backend driving the `svn` command-line client with `--xml`

use std::path::{Path, PathBuf};

use super::{CommitInfo, PathStatus, RevisionInfo, VcsError, VersionControl};
use crate::document::{parse_document, DocumentNode};
use crate::exec::{ExecRequest, ProcessRunner};

#[derive(Debug, Clone)]
pub struct SvnClient {
    wdir: PathBuf,
    runner: ProcessRunner,
}

impl SvnClient {
    pub fn new(wdir: impl Into<PathBuf>) -> Self {
        Self {
            wdir: wdir.into(),
            runner: ProcessRunner::new(),
        }
    }

    fn run_xml(&self, command: &str) -> Result<DocumentNode, VcsError> {
        let request = ExecRequest::new(command).capture().working_dir(&self.wdir);
        let result = self.runner.run(&request);
        if result.is_failure() {
            return Err(VcsError::Command(result.to_string()));
        }
        parse_document(result.output()).map_err(|source| VcsError::Parse {
            command: command.to_string(),
            source,
        })
    }
}

impl VersionControl for SvnClient {
    fn kind(&self) -> &'static str {
        "SVN"
    }

    fn update_command(&self) -> &'static str {
        "svn up"
    }

    fn local_revision_info(&self) -> Result<RevisionInfo, VcsError> {
        let command = "svn info --non-interactive --xml -r BASE";
        let doc = self.run_xml(command)?;
        parse_info(&doc).ok_or_else(|| VcsError::NoInfo(command.to_string()))
    }

    fn commit_log(&self, root: &str, from: &str, to: Option<&str>) -> Result<Vec<CommitInfo>, VcsError> {
        let range = match to {
            Some(to) => format!("{}:{}", from, to),
            None => from.to_string(),
        };
        let command = format!("svn log --non-interactive --xml -v -r {} {}", range, root);
        let commits = parse_log(&self.run_xml(&command)?);
        if commits.is_empty() {
            return Err(VcsError::NoInfo(command));
        }
        Ok(commits)
    }

    fn apply_update(&self) -> Result<(), VcsError> {
        let request = ExecRequest::new("svn update --non-interactive").working_dir(&self.wdir);
        let result = self.runner.run(&request);
        if result.is_failure() {
            return Err(VcsError::Command(result.to_string()));
        }
        Ok(())
    }

    fn status(&self, path: &Path) -> Result<Vec<PathStatus>, VcsError> {
        let command = format!("svn status --non-interactive -u --xml \"{}\"", path.display());
        Ok(parse_status(&self.run_xml(&command)?))
    }
}

fn text(node: &DocumentNode, tag: &str) -> String {
    node.find(tag).map(|n| n.body.clone()).unwrap_or_default()
}

fn parse_info(doc: &DocumentNode) -> Option<RevisionInfo> {
    let entry = doc.find("entry")?;
    let commit = entry.child("commit")?;
    Some(RevisionInfo {
        revision: commit.attr("revision")?.to_string(),
        author: text(commit, "author"),
        date: text(commit, "date"),
        root: entry.find("root").map(|n| n.body.clone())?,
    })
}

fn parse_log(doc: &DocumentNode) -> Vec<CommitInfo> {
    doc.children_named("logentry")
        .map(|entry| CommitInfo {
            revision: entry.attr("revision").unwrap_or_default().to_string(),
            author: text(entry, "author"),
            date: text(entry, "date"),
            message: text(entry, "msg"),
            items: entry
                .child("paths")
                .map(|paths| {
                    paths
                        .children_named("path")
                        .map(|p| (p.body.clone(), p.attr("action").unwrap_or_default().to_string()))
                        .collect()
                })
                .unwrap_or_default(),
        })
        .collect()
}

fn parse_status(doc: &DocumentNode) -> Vec<PathStatus> {
    let mut out = Vec::new();
    for target in doc.children_named("target") {
        for entry in target.children_named("entry") {
            let remote = entry
                .child("repos-status")
                .and_then(|s| s.attr("item"))
                .unwrap_or("none");
            out.push(PathStatus {
                path: entry.attr("path").unwrap_or_default().to_string(),
                remote_status: remote.to_string(),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<info>
<entry kind="dir" path="." revision="120">
<url>https://svn.example.org/repo/trunk</url>
<repository>
<root>https://svn.example.org/repo</root>
<uuid>0000</uuid>
</repository>
<commit revision="118">
<author>alice</author>
<date>2024-01-02T03:04:05.000000Z</date>
</commit>
</entry>
</info>"#;

    const LOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<log>
<logentry revision="118">
<author>alice</author>
<date>2024-01-02T03:04:05.000000Z</date>
<paths>
<path action="M" kind="file">/trunk/a.c</path>
</paths>
<msg>fix a</msg>
</logentry>
<logentry revision="121">
<author>bob</author>
<date>2024-01-03T00:00:00.000000Z</date>
<paths>
<path action="M" kind="file">/trunk/a.c</path>
<path action="A" kind="file">/trunk/b.c</path>
</paths>
<msg></msg>
</logentry>
</log>"#;

    const STATUS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<status>
<target path=".">
<entry path="a.c">
<wc-status item="normal" revision="120"></wc-status>
<repos-status item="modified" props="none"></repos-status>
</entry>
<entry path="notes.txt">
<wc-status item="unversioned"></wc-status>
</entry>
</target>
</status>"#;

    #[test]
    fn test_parse_info() {
        let info = parse_info(&parse_document(INFO).unwrap()).unwrap();
        assert_eq!(info.revision, "118");
        assert_eq!(info.author, "alice");
        assert_eq!(info.root, "https://svn.example.org/repo");
    }

    #[test]
    fn test_parse_log() {
        let commits = parse_log(&parse_document(LOG).unwrap());
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[1].revision, "121");
        assert_eq!(commits[1].message, "");
        assert_eq!(
            commits[1].items,
            vec![
                ("/trunk/a.c".to_string(), "M".to_string()),
                ("/trunk/b.c".to_string(), "A".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_status() {
        let statuses = parse_status(&parse_document(STATUS).unwrap());
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].is_out_of_date());
        assert!(!statuses[1].is_out_of_date());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_client_is_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = SvnClient::new(dir.path().join("missing"));
        assert!(matches!(client.local_revision_info(), Err(VcsError::Command(_))));
    }
}
