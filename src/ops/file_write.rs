//! FileWrite: textual substitution into a file. Produces no report.

use std::fs;
use std::path::{Path, PathBuf};

use regex_lite::{Captures, Regex};

use super::{is_disabled, required_attr, OperationError};
use crate::document::DocumentNode;
use crate::report::ReportContext;

/// How the new content is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace every occurrence of the text
    Literal(String),
    /// Replace everything between two marker patterns, keeping the text
    /// the markers matched
    Region { begin: String, end: String },
    /// Write the content as the whole file
    Overwrite,
}

#[derive(Debug)]
pub struct FileWrite {
    pub file: PathBuf,
    pub content: String,
    pub mode: WriteMode,
    /// Destination; the source file when not set
    pub save_as: PathBuf,
    pub disabled: bool,
}

impl FileWrite {
    pub fn new(file: impl Into<PathBuf>, content: impl Into<String>, mode: WriteMode) -> Self {
        let file = file.into();
        Self {
            save_as: file.clone(),
            file,
            content: content.into(),
            mode,
            disabled: false,
        }
    }

    /// Attributes: `file` (mandatory), `replace`, `replace_begin` +
    /// `replace_end`, `saveas`, `disabled`. The element text is the content.
    pub fn from_declaration(ctx: &ReportContext, node: &DocumentNode) -> Result<Self, OperationError> {
        let file = ctx.wdir.join(required_attr(node, "file")?);
        let mode = match (
            non_empty(node, "replace"),
            non_empty(node, "replace_begin"),
            non_empty(node, "replace_end"),
        ) {
            (Some(text), _, _) => WriteMode::Literal(text.to_string()),
            (None, Some(begin), Some(end)) => WriteMode::Region {
                begin: begin.to_string(),
                end: end.to_string(),
            },
            _ => WriteMode::Overwrite,
        };

        let mut op = Self::new(file, node.body.clone(), mode);
        if let Some(save_as) = non_empty(node, "saveas") {
            op.save_as = ctx.wdir.join(save_as);
        }
        op.disabled = is_disabled(node);
        Ok(op)
    }

    pub fn info(&self) -> String {
        format!("filewrite file='{}'", self.file.display())
    }

    pub fn execute(&mut self) -> Result<(), OperationError> {
        if self.disabled {
            tracing::info!("FileWrite operation disabled");
            return Ok(());
        }

        let output = match &self.mode {
            WriteMode::Literal(text) => {
                let original = read(&self.file)?;
                if !original.contains(text.as_str()) {
                    tracing::warn!("pattern '{}' is not found in {}", text, self.file.display());
                }
                original.replace(text.as_str(), &self.content)
            }
            WriteMode::Region { begin, end } => {
                let original = read(&self.file)?;
                let pattern = format!("(?s)(?P<begin>{}).*?(?P<end>{})", begin, end);
                let region = Regex::new(&pattern).map_err(|e| OperationError::Pattern {
                    pattern: format!("{}...{}", begin, end),
                    message: e.to_string(),
                })?;
                if !region.is_match(&original) {
                    tracing::warn!(
                        "patterns '{}' and '{}' are not found in {}",
                        begin,
                        end,
                        self.file.display()
                    );
                }
                region
                    .replace_all(&original, |caps: &Captures<'_>| {
                        format!("{}{}{}", &caps["begin"], self.content, &caps["end"])
                    })
                    .into_owned()
            }
            WriteMode::Overwrite => self.content.clone(),
        };

        fs::write(&self.save_as, output).map_err(|source| OperationError::Io {
            path: self.save_as.display().to_string(),
            source,
        })
    }
}

fn non_empty<'a>(node: &'a DocumentNode, key: &str) -> Option<&'a str> {
    node.attr(key).filter(|v| !v.is_empty())
}

fn read(path: &Path) -> Result<String, OperationError> {
    fs::read_to_string(path).map_err(|source| OperationError::Io {
        path: path.display().to_string(),
        source,
    })
}
