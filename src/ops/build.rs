//! Build operation: run the build command and classify its output

use std::path::PathBuf;

use ccdash_classifier::{DiagnosticKind, DiagnosticRecord, OutputClassifier};

use super::{is_disabled, required_attr, resolve_wdir, OperationError, Timing};
use crate::document::DocumentNode;
use crate::exec::{ExecRequest, ProcessRunner};
use crate::report::{LogCodec, ReportContext};

#[derive(Debug)]
pub struct Build {
    pub command: String,
    pub wdir: Option<PathBuf>,
    pub disabled: bool,
    /// Embed the whole build log in the report
    pub build_log: bool,
    /// Keep the build output here instead of a temporary file
    pub log_file: Option<PathBuf>,
    timing: Timing,
    classifier: OutputClassifier,
    log: Option<String>,
}

impl Build {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            wdir: None,
            disabled: false,
            build_log: false,
            log_file: None,
            timing: Timing::default(),
            classifier: OutputClassifier::new(),
            log: None,
        }
    }

    /// Attributes: `cmd` (mandatory), `wdir`, `disabled`
    pub fn from_declaration(ctx: &ReportContext, node: &DocumentNode) -> Result<Self, OperationError> {
        let mut build = Self::new(required_attr(node, "cmd")?);
        build.wdir = Some(resolve_wdir(ctx, node));
        build.disabled = is_disabled(node);
        build.build_log = ctx.build_log;
        build.log_file = ctx.build_log_file.clone();
        Ok(build)
    }

    pub fn info(&self) -> String {
        format!("build cmd='{}'", self.command)
    }

    pub fn success(&self) -> bool {
        !self.classifier.have_error()
    }

    /// 1 if any error was recorded
    pub fn exit_code(&self) -> i32 {
        self.classifier.exit_code()
    }

    pub fn records(&self) -> &[DiagnosticRecord] {
        self.classifier.records()
    }

    pub fn execute(&mut self, _ctx: &ReportContext) {
        if self.disabled {
            tracing::info!("Build operation disabled");
            return;
        }
        tracing::info!("Executing build command: '{}'..", self.command);

        let mut request = ExecRequest::new(&self.command);
        if let Some(dir) = &self.wdir {
            request = request.working_dir(dir);
        }
        if let Some(file) = &self.log_file {
            // Relative to where ccdash was started, not the build directory
            let file = match std::env::current_dir() {
                Ok(cwd) if file.is_relative() => cwd.join(file),
                _ => file.clone(),
            };
            request = request.output_file(file);
        }
        if self.build_log {
            request = request.capture();
        }

        self.timing.begin();
        let classifier = &mut self.classifier;
        let result = ProcessRunner::new().execute(&request, |line, n| classifier.feed(line, n));
        self.classifier.finish();

        if result.is_failure() {
            let record = DiagnosticRecord::new(
                DiagnosticKind::Error,
                self.classifier.lines_seen(),
                result.to_string(),
                "",
                "0",
            );
            self.classifier.push(record);
        }
        self.log = result.captured_output;
        self.timing.finish();

        tracing::info!(
            warnings = self.classifier.warning_count(),
            errors = self.classifier.error_count(),
            "build finished"
        );
    }

    pub fn render(&self, ctx: &ReportContext) -> Option<DocumentNode> {
        if self.disabled {
            return None;
        }
        let mut site = ctx.site_node();
        let build = site.push(DocumentNode::new("Build"));
        build.push_leaf("BuildCommand", &self.command);
        self.timing.render_into(build);

        for record in self.classifier.records() {
            build.push(render_record(record));
        }

        if let Some(log) = self.log.as_deref().filter(|_| self.build_log) {
            let body = ctx
                .log_policy
                .unbounded()
                .encode_log(false, log.as_bytes(), LogCodec::GzipBase64);
            build.push(
                DocumentNode::leaf("Log", body)
                    .with_attr("Encoding", "base64")
                    .with_attr("Compression", "/bin/gzip"),
            );
        }
        Some(site)
    }
}

fn render_record(record: &DiagnosticRecord) -> DocumentNode {
    DocumentNode::new(record.kind.as_str())
        .with_child(DocumentNode::leaf("BuildLogLine", record.source_line_number.to_string()))
        .with_child(DocumentNode::leaf("Text", &record.message))
        .with_child(DocumentNode::leaf("SourceFile", &record.file))
        .with_child(DocumentNode::leaf("SourceLineNumber", &record.line))
        .with_child(DocumentNode::leaf(
            "PreContext",
            record.context_before.as_deref().unwrap_or_default(),
        ))
        .with_child(DocumentNode::leaf(
            "PostContext",
            record.context_after.as_deref().unwrap_or_default(),
        ))
        .with_child(DocumentNode::leaf("RepeatCount", "0"))
}
