//! Diagnostic record types.

use serde::{Deserialize, Serialize};

/// Severity of a recognized diagnostic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Warning,
    Error,
}

impl DiagnosticKind {
    /// Tag name used in the dashboard build schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Error => "Error",
        }
    }
}

/// Toolchain family whose output format matched a line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `path/file.c:123: warning: message`
    Gcc,
    /// `path\file.c(123) : error C2065: message`
    Msvc,
    /// `path/file.cpp:1234: message` (CodeWarrior / WINSCW)
    Symbian,
}

/// A warning or error parsed from build output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticRecord {
    pub kind: DiagnosticKind,

    /// 1-based line in the captured build log
    pub source_line_number: usize,

    /// The full log line (after VCBUILD prefix stripping for MSVC)
    pub message: String,

    pub file: String,

    /// Kept as text: some dialects produce empty or non-numeric values
    pub line: String,

    pub context_before: Option<String>,
    pub context_after: Option<String>,
}

impl DiagnosticRecord {
    /// Create a record without context lines.
    pub fn new(
        kind: DiagnosticKind,
        source_line_number: usize,
        message: impl Into<String>,
        file: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            source_line_number,
            message: message.into(),
            file: file.into(),
            line: line.into(),
            context_before: None,
            context_after: None,
        }
    }

    /// Attach surrounding log lines.
    pub fn with_context(mut self, before: Option<String>, after: Option<String>) -> Self {
        self.context_before = before;
        self.context_after = after;
        self
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}
