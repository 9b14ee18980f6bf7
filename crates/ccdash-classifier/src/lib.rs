//! Compiler output classifier for ccdash build reports.
//!
//! The classifier is fed build output one line at a time and recognizes
//! warnings and errors from several toolchains (GCC, MSVC/VCBUILD, Symbian
//! WINSCW). Each recognized line becomes a [`DiagnosticRecord`] carrying one
//! line of context before and after it.
//!
//! Classification lags input by one line so the trailing context is known
//! when a line is classified; call [`OutputClassifier::finish`] at end of
//! stream to classify the final buffered line.

mod record;
mod rules;

pub use record::{DiagnosticKind, DiagnosticRecord, Dialect};
pub use rules::{strip_vcbuild_prefix, Extractor, LineMatch, Matcher, Rule, RuleSet, RULES};

/// Sliding-window classifier over a build log.
#[derive(Debug, Default)]
pub struct OutputClassifier {
    rules: RuleSet,
    prev: Option<String>,
    cur: Option<String>,
    next: Option<String>,
    cur_number: usize,
    next_number: usize,
    records: Vec<DiagnosticRecord>,
    have_error: bool,
    finished: bool,
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next log line. `line_number` is 1-based.
    ///
    /// The line is buffered; the previously fed line is classified now.
    pub fn feed(&mut self, line: &str, line_number: usize) {
        self.shift(Some(line.to_string()), line_number);
        self.classify_current();
    }

    /// Classify the last buffered line. Further calls are no-ops.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.shift(None, self.next_number);
        self.classify_current();
    }

    /// Append a record produced outside the line stream.
    pub fn push(&mut self, record: DiagnosticRecord) {
        if record.is_error() {
            self.have_error = true;
        }
        self.records.push(record);
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DiagnosticRecord> {
        self.records
    }

    /// True if any error record was produced.
    pub fn have_error(&self) -> bool {
        self.have_error
    }

    pub fn success(&self) -> bool {
        !self.have_error
    }

    /// 1 if any error was recorded, 0 otherwise. Warnings never fail.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.have_error)
    }

    /// Number of the most recent line fed.
    pub fn lines_seen(&self) -> usize {
        self.next_number.max(self.cur_number)
    }

    pub fn warning_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.kind == DiagnosticKind::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_error()).count()
    }

    fn shift(&mut self, incoming: Option<String>, incoming_number: usize) {
        self.prev = self.cur.take();
        self.cur = self.next.take();
        self.next = incoming;
        self.cur_number = self.next_number;
        self.next_number = incoming_number;
    }

    fn classify_current(&mut self) {
        let Some(line) = self.cur.as_deref() else {
            return;
        };

        if let LineMatch::Diagnostic {
            kind,
            message,
            file,
            line,
            ..
        } = self.rules.match_line(line)
        {
            let record = DiagnosticRecord::new(kind, self.cur_number, message, file, line)
                .with_context(self.prev.clone(), self.next.clone());
            self.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(lines: &[&str]) -> OutputClassifier {
        let mut c = OutputClassifier::new();
        for (i, line) in lines.iter().enumerate() {
            c.feed(line, i + 1);
        }
        c.finish();
        c
    }

    #[test]
    fn test_gcc_error_marks_failure() {
        let c = classify(&["gcc -c foo.c", "foo.c:10: error: missing semicolon", "make: *** [foo.o] Error 1"]);
        assert_eq!(c.records().len(), 1);
        let r = &c.records()[0];
        assert_eq!(r.kind, DiagnosticKind::Error);
        assert_eq!(r.file, "foo.c");
        assert_eq!(r.line, "10");
        assert_eq!(r.source_line_number, 2);
        assert_eq!(r.context_before.as_deref(), Some("gcc -c foo.c"));
        assert_eq!(r.context_after.as_deref(), Some("make: *** [foo.o] Error 1"));
        assert!(!c.success());
        assert_eq!(c.exit_code(), 1);
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let c = classify(&["a.c:1: warning: unused", "b.c:2: warning: shadowed"]);
        assert_eq!(c.warning_count(), 2);
        assert_eq!(c.error_count(), 0);
        assert!(c.success());
        assert_eq!(c.exit_code(), 0);
    }

    #[test]
    fn test_note_emits_nothing() {
        let c = classify(&["a.c:5: note: declared here"]);
        assert!(c.records().is_empty());
        assert!(c.success());
    }

    #[test]
    fn test_last_line_is_not_dropped() {
        let c = classify(&["compiling", "z.c:99: error: boom"]);
        assert_eq!(c.records().len(), 1);
        assert_eq!(c.records()[0].source_line_number, 2);
        assert_eq!(c.records()[0].context_after, None);
    }

    #[test]
    fn test_single_line_log() {
        let c = classify(&["only.c:1: error: alone"]);
        assert_eq!(c.records().len(), 1);
        assert_eq!(c.records()[0].context_before, None);
        assert_eq!(c.records()[0].context_after, None);
    }

    #[test]
    fn test_note_line_still_advances_window() {
        let c = classify(&[
            "x.c:1: error: first",
            "x.c:1: note: see here",
            "x.c:2: warning: second",
        ]);
        assert_eq!(c.records().len(), 2);
        assert_eq!(c.records()[0].context_after.as_deref(), Some("x.c:1: note: see here"));
        assert_eq!(c.records()[1].context_before.as_deref(), Some("x.c:1: note: see here"));
        assert_eq!(c.records()[1].source_line_number, 3);
    }

    #[test]
    fn test_finish_is_idempotent() {
        let mut c = OutputClassifier::new();
        c.feed("q.c:3: error: once", 1);
        c.finish();
        c.finish();
        assert_eq!(c.records().len(), 1);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let c = classify(&["d.c:1: warning: same", "d.c:1: warning: same"]);
        assert_eq!(c.records().len(), 2);
    }

    #[test]
    fn test_push_external_error() {
        let mut c = OutputClassifier::new();
        c.finish();
        c.push(DiagnosticRecord::new(
            DiagnosticKind::Error,
            0,
            "Error executing 'make': program returned 2",
            "",
            "0",
        ));
        assert!(c.have_error());
    }

    #[test]
    fn test_record_serializes() {
        let c = classify(&["w.c:4: warning: hmm"]);
        let json = serde_json::to_value(&c.records()[0]).unwrap();
        assert_eq!(json["kind"], "Warning");
        assert_eq!(json["line"], "4");
    }
}
