//! Ordered rule table for diagnostic recognition.
//!
//! Rules are evaluated top to bottom against a single log line and the first
//! match wins. Adding a dialect means adding a row; the order of the table is
//! the priority order.

use regex_lite::Regex;

use crate::record::{DiagnosticKind, Dialect};

/// How a matching line is turned into a file/line location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extractor {
    /// Line is consumed and nothing is recorded.
    Ignore,
    /// First two fields of a `:`-split (at most 3 fields).
    ColonFields,
    /// `file(line) : kind ...` with optional VCBUILD `N>` prefix.
    Parenthesized,
    /// `file:line:` where the two colons are close together.
    ShortColonPair,
}

/// How a rule recognizes its lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// Needle must occur at a position greater than zero.
    Contains(&'static str),
    /// Line starts with `<anything>:<digits>: `.
    PathNumberPrefix,
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub matcher: Matcher,
    pub extractor: Extractor,
    /// `None` for ignore rules
    pub kind: Option<DiagnosticKind>,
    pub dialect: Option<Dialect>,
}

/// Priority-ordered rules.
pub const RULES: &[Rule] = &[
    Rule {
        name: "gcc-note",
        matcher: Matcher::Contains("note:"),
        extractor: Extractor::Ignore,
        kind: None,
        dialect: Some(Dialect::Gcc),
    },
    Rule {
        name: "gcc-warning",
        matcher: Matcher::Contains("warning:"),
        extractor: Extractor::ColonFields,
        kind: Some(DiagnosticKind::Warning),
        dialect: Some(Dialect::Gcc),
    },
    Rule {
        name: "gcc-error",
        matcher: Matcher::Contains("error:"),
        extractor: Extractor::ColonFields,
        kind: Some(DiagnosticKind::Error),
        dialect: Some(Dialect::Gcc),
    },
    Rule {
        name: "msvc-warning",
        matcher: Matcher::Contains(" : warning "),
        extractor: Extractor::Parenthesized,
        kind: Some(DiagnosticKind::Warning),
        dialect: Some(Dialect::Msvc),
    },
    Rule {
        name: "msvc-error",
        matcher: Matcher::Contains(" : error "),
        extractor: Extractor::Parenthesized,
        kind: Some(DiagnosticKind::Error),
        dialect: Some(Dialect::Msvc),
    },
    Rule {
        name: "msvc-fatal-error",
        matcher: Matcher::Contains(" : fatal error "),
        extractor: Extractor::Parenthesized,
        kind: Some(DiagnosticKind::Error),
        dialect: Some(Dialect::Msvc),
    },
    Rule {
        name: "symbian-error",
        matcher: Matcher::PathNumberPrefix,
        extractor: Extractor::ShortColonPair,
        kind: Some(DiagnosticKind::Error),
        dialect: Some(Dialect::Symbian),
    },
];

/// Maximum distance between the two colons of a Symbian location.
const SYMBIAN_MAX_COLON_GAP: usize = 6;

/// Outcome of running one line through the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch {
    /// No rule matched.
    Unmatched,
    /// An ignore rule consumed the line.
    Ignored(&'static str),
    /// A diagnostic was recognized.
    Diagnostic {
        rule: &'static str,
        kind: DiagnosticKind,
        message: String,
        file: String,
        line: String,
    },
}

/// Compiled form of [`RULES`].
#[derive(Debug)]
pub struct RuleSet {
    path_number_prefix: Regex,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    pub fn new() -> Self {
        Self {
            path_number_prefix: Regex::new(r"^.*:[0-9]+: ").expect("static pattern"),
        }
    }

    /// Match a single line against the table.
    pub fn match_line(&self, line: &str) -> LineMatch {
        for rule in RULES {
            let pos = match rule.matcher {
                Matcher::Contains(needle) => match line.find(needle) {
                    Some(p) if p > 0 => Some(p),
                    _ => None,
                },
                Matcher::PathNumberPrefix => {
                    if self.path_number_prefix.is_match(line) {
                        Some(0)
                    } else {
                        None
                    }
                }
            };
            let Some(pos) = pos else { continue };

            let kind = match rule.kind {
                Some(kind) => kind,
                None => return LineMatch::Ignored(rule.name),
            };

            let extracted = match rule.extractor {
                Extractor::Ignore => return LineMatch::Ignored(rule.name),
                Extractor::ColonFields => Some(colon_fields(line)),
                Extractor::Parenthesized => Some(parenthesized(line, rule.matcher, pos)),
                Extractor::ShortColonPair => short_colon_pair(line),
            };

            // A row whose extractor rejects the line falls through.
            if let Some((message, file, line_no)) = extracted {
                return LineMatch::Diagnostic {
                    rule: rule.name,
                    kind,
                    message,
                    file,
                    line: line_no,
                };
            }
        }
        LineMatch::Unmatched
    }
}

fn colon_fields(line: &str) -> (String, String, String) {
    let mut fields = line.splitn(3, ':');
    let file = fields.next().unwrap_or_default().to_string();
    let line_no = fields.next().unwrap_or_default().to_string();
    (line.to_string(), file, line_no)
}

/// Strip the `N>` project prefix VCBUILD puts in front of compiler output.
pub fn strip_vcbuild_prefix(line: &str) -> &str {
    match line.find('>') {
        Some(pos) => &line[pos + 1..],
        None => line,
    }
}

fn parenthesized(raw: &str, matcher: Matcher, raw_pos: usize) -> (String, String, String) {
    // Only a '>' ahead of the marker is a project prefix; one inside the
    // message text is kept.
    let (line, pos) = match matcher {
        Matcher::Contains(_) => match raw[..raw_pos].find('>') {
            Some(_) => {
                let stripped = strip_vcbuild_prefix(raw);
                (stripped, raw_pos - (raw.len() - stripped.len()))
            }
            None => (raw, raw_pos),
        },
        Matcher::PathNumberPrefix => (raw, raw_pos),
    };

    let open = line.find('(');
    let close = line.find(')');
    let (file, line_no) = match (open, close) {
        (Some(p0), Some(p1)) if p0 > 0 && p0 < pos && p1 > p0 => {
            (line[..p0].to_string(), line[p0 + 1..p1].to_string())
        }
        (Some(p0), None) if p0 > 0 && p0 < pos => (line[..p0].to_string(), String::new()),
        _ => (line[..pos].to_string(), String::new()),
    };
    (line.to_string(), file, line_no)
}

fn short_colon_pair(line: &str) -> Option<(String, String, String)> {
    let p0 = line.find(':')?;
    let p1 = p0 + 1 + line[p0 + 1..].find(':')?;
    if p0 > 0 && p1 - p0 < SYMBIAN_MAX_COLON_GAP {
        Some((
            line.to_string(),
            line[..p0].to_string(),
            line[p0 + 1..p1].to_string(),
        ))
    } else {
        None
    }
}
