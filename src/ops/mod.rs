//! Reporting operations
//!
//! Each operation is constructed (directly or from a scenario element),
//! executed once, then rendered to a report document. A disabled operation
//! skips execution and renders nothing.

mod build;
mod configure;
mod file_write;
mod update;

pub use build::Build;
pub use configure::Configure;
pub use file_write::FileWrite;
pub use test::{Test, TestItem};
pub use update::Update;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::document::DocumentNode;
use crate::report::{elapsed_between, encode_duration, encode_time, ReportContext};
use crate::vcs::VcsError;

/// Errors from constructing or executing an operation
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("missing '{attribute}' attribute in <{element}>")]
    MissingAttribute { element: String, attribute: &'static str },

    #[error("invalid node name <{0}>")]
    UnknownElement(String),

    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Start and end of an operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Timing {
    pub fn begin(&mut self) {
        self.start = Utc::now();
        self.end = self.start;
    }

    pub fn finish(&mut self) {
        self.end = Utc::now();
    }

    pub fn elapsed_seconds(&self) -> f64 {
        elapsed_between(self.start, self.end).as_secs_f64()
    }

    /// Append StartDateTime, EndDateTime and ElapsedMinutes
    pub fn render_into(&self, node: &mut DocumentNode) {
        node.push_leaf("StartDateTime", encode_time(self.start));
        node.push_leaf("EndDateTime", encode_time(self.end));
        node.push_leaf(
            "ElapsedMinutes",
            encode_duration(elapsed_between(self.start, self.end)),
        );
    }
}

/// Closed set of operations a submission can hold
#[derive(Debug)]
pub enum Operation {
    Update(Update),
    Configure(Configure),
    Build(Build),
    TestItem(TestItem),
    Test(Test),
    FileWrite(FileWrite),
}

impl Operation {
    /// Build an operation from a scenario element.
    ///
    /// Element names are matched case-insensitively. `<Test>` yields a
    /// single [`TestItem`]; grouping into a [`Test`] is the caller's job.
    pub fn from_declaration(ctx: &ReportContext, node: &DocumentNode) -> Result<Self, OperationError> {
        let op = match node.tag.to_ascii_lowercase().as_str() {
            "update" => Operation::Update(Update::from_declaration(ctx, node)?),
            "configure" => Operation::Configure(Configure::from_declaration(ctx, node)?),
            "build" => Operation::Build(Build::from_declaration(ctx, node)?),
            "test" => Operation::TestItem(TestItem::from_declaration(ctx, node)?),
            "filewrite" => Operation::FileWrite(FileWrite::from_declaration(ctx, node)?),
            _ => return Err(OperationError::UnknownElement(node.tag.clone())),
        };
        Ok(op)
    }

    /// Short kind name, used in artifact file names
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Update(_) => "update",
            Operation::Configure(_) => "configure",
            Operation::Build(_) => "build",
            Operation::TestItem(_) => "testitem",
            Operation::Test(_) => "test",
            Operation::FileWrite(_) => "filewrite",
        }
    }

    /// Human-readable description, matched by exclude filters
    pub fn info(&self) -> String {
        match self {
            Operation::Update(op) => op.info(),
            Operation::Configure(op) => op.info(),
            Operation::Build(op) => op.info(),
            Operation::TestItem(op) => op.info(),
            Operation::Test(_) => "test".to_string(),
            Operation::FileWrite(op) => op.info(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        match self {
            Operation::Update(op) => op.disabled,
            Operation::Configure(op) => op.disabled,
            Operation::Build(op) => op.disabled,
            Operation::TestItem(op) => op.disabled,
            Operation::Test(_) => false,
            Operation::FileWrite(op) => op.disabled,
        }
    }

    /// Disabled operations count as successful
    pub fn success(&self) -> bool {
        if self.is_disabled() {
            return true;
        }
        match self {
            Operation::Update(_) | Operation::FileWrite(_) => true,
            Operation::Configure(op) => op.success(),
            Operation::Build(op) => op.success(),
            Operation::TestItem(op) => op.success(),
            Operation::Test(op) => op.exit_code() == 0,
        }
    }

    /// Raw exit code of the operation; 0 when disabled
    pub fn exit_code(&self) -> i32 {
        if self.is_disabled() {
            return 0;
        }
        match self {
            Operation::Update(_) | Operation::FileWrite(_) => 0,
            Operation::Configure(op) => op.exit_code(),
            Operation::Build(op) => op.exit_code(),
            Operation::TestItem(op) => op.exit_code(),
            Operation::Test(op) => op.exit_code(),
        }
    }

    /// True for kinds whose failure stops the rest of a submission
    pub fn is_gating(&self) -> bool {
        matches!(self, Operation::Configure(_) | Operation::Build(_))
    }

    pub fn execute(&mut self, ctx: &ReportContext) -> Result<(), OperationError> {
        match self {
            Operation::Update(op) => op.execute(),
            Operation::Configure(op) => {
                op.execute(ctx);
                Ok(())
            }
            Operation::Build(op) => {
                op.execute(ctx);
                Ok(())
            }
            Operation::TestItem(op) => {
                op.execute(ctx);
                Ok(())
            }
            Operation::Test(op) => {
                op.execute(ctx);
                Ok(())
            }
            Operation::FileWrite(op) => op.execute(),
        }
    }

    pub fn render(&self, ctx: &ReportContext) -> Option<DocumentNode> {
        match self {
            Operation::Update(op) => op.render(ctx),
            Operation::Configure(op) => op.render(ctx),
            Operation::Build(op) => op.render(ctx),
            Operation::TestItem(op) => op.render(ctx),
            Operation::Test(op) => op.render(ctx),
            Operation::FileWrite(_) => None,
        }
    }
}

/// `disabled` is set by any value other than empty or "0"
pub(crate) fn is_disabled(node: &DocumentNode) -> bool {
    node.attr("disabled").map_or(false, |v| !v.is_empty() && v != "0")
}

pub(crate) fn required_attr(node: &DocumentNode, attribute: &'static str) -> Result<String, OperationError> {
    match node.attr(attribute) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(OperationError::MissingAttribute {
            element: node.tag.clone(),
            attribute,
        }),
    }
}

/// The element's `wdir` resolved against the context working directory
pub(crate) fn resolve_wdir(ctx: &ReportContext, node: &DocumentNode) -> PathBuf {
    match node.attr("wdir") {
        Some(dir) if !dir.is_empty() => ctx.wdir.join(dir),
        _ => ctx.wdir.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ReportContext {
        ReportContext::new("http://dash/submit.php", "host", "linux", "20240101-0000-Nightly")
    }

    #[test]
    fn test_factory_dispatch_is_case_insensitive() {
        let node = DocumentNode::new("BUILD").with_attr("cmd", "make");
        let op = Operation::from_declaration(&ctx(), &node).unwrap();
        assert_eq!(op.name(), "build");
        assert_eq!(op.info(), "build cmd='make'");
        assert!(op.is_gating());
    }

    #[test]
    fn test_factory_unknown_element() {
        let err = Operation::from_declaration(&ctx(), &DocumentNode::new("Deploy")).unwrap_err();
        assert_eq!(err.to_string(), "invalid node name <Deploy>");
    }

    #[test]
    fn test_factory_missing_attribute() {
        let err = Operation::from_declaration(&ctx(), &DocumentNode::new("Configure")).unwrap_err();
        assert!(matches!(
            err,
            OperationError::MissingAttribute {
                attribute: "cmd",
                ..
            }
        ));
    }

    #[test]
    fn test_disabled_values() {
        let node = |v: &str| DocumentNode::new("Build").with_attr("disabled", v);
        assert!(is_disabled(&node("1")));
        assert!(is_disabled(&node("yes")));
        assert!(!is_disabled(&node("0")));
        assert!(!is_disabled(&node("")));
        assert!(!is_disabled(&DocumentNode::new("Build")));
    }

    #[test]
    fn test_disabled_operation_renders_nothing() {
        let node = DocumentNode::new("Configure")
            .with_attr("cmd", "./configure")
            .with_attr("disabled", "1");
        let mut op = Operation::from_declaration(&ctx(), &node).unwrap();
        op.execute(&ctx()).unwrap();
        assert!(op.render(&ctx()).is_none());
        assert!(op.success());
        assert_eq!(op.exit_code(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_operation_exit_codes() {
        let item = DocumentNode::new("Test")
            .with_attr("name", "t")
            .with_attr("cmd", "exit 3");
        let mut op = Operation::from_declaration(&ctx(), &item).unwrap();
        op.execute(&ctx()).unwrap();
        assert!(!op.success());
        assert_eq!(op.exit_code(), 3);

        let mut configure = Operation::Configure(Configure::new("exit 4"));
        configure.execute(&ctx()).unwrap();
        assert_eq!(configure.exit_code(), 1);
    }

    #[test]
    fn test_resolve_wdir() {
        let mut c = ctx();
        c.wdir = PathBuf::from("/src/project");
        let node = DocumentNode::new("Build").with_attr("wdir", "build");
        assert_eq!(resolve_wdir(&c, &node), PathBuf::from("/src/project/build"));
        assert_eq!(resolve_wdir(&c, &DocumentNode::new("Build")), PathBuf::from("/src/project"));
    }

    #[test]
    fn test_timing_render() {
        let mut node = DocumentNode::new("Build");
        Timing::default().render_into(&mut node);
        assert_eq!(node.child_text("StartDateTime"), Some("Jan 01 00:00 GMT"));
        assert_eq!(node.child_text("ElapsedMinutes"), Some("0.000"));
    }
}
