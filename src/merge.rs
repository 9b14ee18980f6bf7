//! Merging previously generated reports into one submission
//!
//! The merged document is rooted at a fresh `<Site>` header for the current
//! identity. `<Update>` documents are appended whole; other documents
//! contribute their children, except `<Testing>` sections which are folded
//! into a single aggregate appended last.

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::document::{parse_file, DocumentError, DocumentNode};
use crate::report::{current_year, encode_time, parse_time, ReportContext};

/// Merge errors
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: DocumentError,
    },

    #[error("no files to merge")]
    NoInput,
}

/// Several `<Testing>` sections folded into one
#[derive(Debug, Clone, Default)]
pub struct MergedTesting {
    year: i32,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    elapsed_minutes: f64,
    test_names: Vec<String>,
    test_nodes: Vec<DocumentNode>,
    folded: usize,
}

impl MergedTesting {
    /// Timestamps are read as falling in `year`
    pub fn new(year: i32) -> Self {
        Self {
            year,
            ..Default::default()
        }
    }

    /// Number of sections folded so far
    pub fn len(&self) -> usize {
        self.folded
    }

    pub fn is_empty(&self) -> bool {
        self.folded == 0
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed_minutes
    }

    /// Fold one `<Testing>` node: earliest start, latest end, summed
    /// elapsed minutes, concatenated test lists and results.
    pub fn add(&mut self, testing: &DocumentNode) {
        self.folded += 1;

        if let Some(start) = self.time_of(testing, "StartDateTime") {
            if self.start.map_or(true, |s| start < s) {
                self.start = Some(start);
            }
        }
        if let Some(end) = self.time_of(testing, "EndDateTime") {
            if self.end.map_or(true, |e| end > e) {
                self.end = Some(end);
            }
        }
        if let Some(text) = testing.child_text("ElapsedMinutes") {
            match text.trim().parse::<f64>() {
                Ok(minutes) => self.elapsed_minutes += minutes,
                Err(_) => tracing::warn!("ignoring bad ElapsedMinutes '{}'", text),
            }
        }
        if let Some(list) = testing.child("TestList") {
            self.test_names
                .extend(list.children_named("Test").map(|t| t.body.clone()));
        }
        self.test_nodes.extend(
            testing
                .children
                .iter()
                .filter(|n| n.tag.eq_ignore_ascii_case("test"))
                .cloned(),
        );
    }

    fn time_of(&self, testing: &DocumentNode, tag: &str) -> Option<DateTime<Utc>> {
        let text = testing.child_text(tag)?;
        let parsed = parse_time(text, self.year);
        if parsed.is_none() {
            tracing::warn!("ignoring bad {} '{}'", tag, text);
        }
        parsed
    }

    pub fn to_node(&self) -> DocumentNode {
        let mut testing = DocumentNode::new("Testing");
        if let Some(start) = self.start {
            testing.push_leaf("StartDateTime", encode_time(start));
        }
        if let Some(end) = self.end {
            testing.push_leaf("EndDateTime", encode_time(end));
        }
        testing.push_leaf("ElapsedMinutes", format!("{:.1}", self.elapsed_minutes));

        let list = testing.push(DocumentNode::new("TestList"));
        for name in &self.test_names {
            list.push_leaf("Test", name);
        }
        for node in &self.test_nodes {
            testing.push(node.clone());
        }
        testing
    }
}

/// Merges report files under the identity of a [`ReportContext`]
#[derive(Debug)]
pub struct ReportMerger<'a> {
    ctx: &'a ReportContext,
}

impl<'a> ReportMerger<'a> {
    pub fn new(ctx: &'a ReportContext) -> Self {
        Self { ctx }
    }

    /// Parse and merge the files. Any parse failure is fatal.
    pub fn merge_files<P: AsRef<Path>>(&self, files: &[P]) -> Result<DocumentNode, MergeError> {
        if files.is_empty() {
            return Err(MergeError::NoInput);
        }
        let mut docs = Vec::with_capacity(files.len());
        for file in files {
            let file = file.as_ref();
            let doc = parse_file(file).map_err(|source| MergeError::Parse {
                file: file.display().to_string(),
                source,
            })?;
            docs.push((file.display().to_string(), doc));
        }
        Ok(self.merge(docs))
    }

    /// Merge parsed documents, each labelled with where it came from
    pub fn merge(&self, docs: Vec<(String, DocumentNode)>) -> DocumentNode {
        let mut merged = self.ctx.site_node();
        let mut testing = MergedTesting::new(current_year());

        for (label, doc) in docs {
            if doc.tag.eq_ignore_ascii_case("site") {
                for warning in self.identity_mismatches(&doc) {
                    tracing::warn!("{}: {}", label, warning);
                }
            }

            if doc.tag.eq_ignore_ascii_case("update") {
                merged.push(doc);
                continue;
            }
            for child in doc.children {
                if child.tag.eq_ignore_ascii_case("testing") {
                    testing.add(&child);
                } else {
                    merged.push(child);
                }
            }
        }

        if !testing.is_empty() {
            merged.push(testing.to_node());
        }
        merged
    }

    /// Site header attributes that differ from the current identity
    pub fn identity_mismatches(&self, site: &DocumentNode) -> Vec<String> {
        let expected = [
            ("Name", "site name", self.ctx.site_name.as_str()),
            ("OSName", "OSName", self.ctx.os.name.as_str()),
            ("OSRelease", "OSRelease", self.ctx.os.release.as_str()),
            ("BuildName", "BuildName", self.ctx.build_name.as_str()),
            ("BuildStamp", "BuildStamp", self.ctx.stamp.as_str()),
        ];
        expected
            .into_iter()
            .filter_map(|(attr, label, want)| {
                let found = site.attr(attr).unwrap_or_default();
                (found != want).then(|| format!("different {} '{}' (expecting '{}')", label, found, want))
            })
            .collect()
    }
}
