//! Configure operation

use std::path::PathBuf;

use super::{is_disabled, required_attr, resolve_wdir, OperationError, Timing};
use crate::document::DocumentNode;
use crate::exec::{ExecRequest, ProcessRunner};
use crate::report::{LogCodec, ReportContext};

#[derive(Debug)]
pub struct Configure {
    pub command: String,
    pub wdir: Option<PathBuf>,
    pub disabled: bool,
    timing: Timing,
    /// -1 until executed, then 0 or 1
    status: i32,
    output: String,
}

impl Configure {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            wdir: None,
            disabled: false,
            timing: Timing::default(),
            status: -1,
            output: String::new(),
        }
    }

    /// Attributes: `cmd` (mandatory), `wdir`, `disabled`
    pub fn from_declaration(ctx: &ReportContext, node: &DocumentNode) -> Result<Self, OperationError> {
        let mut configure = Self::new(required_attr(node, "cmd")?);
        configure.wdir = Some(resolve_wdir(ctx, node));
        configure.disabled = is_disabled(node);
        Ok(configure)
    }

    pub fn info(&self) -> String {
        format!("configure cmd='{}'", self.command)
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn exit_code(&self) -> i32 {
        self.status
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn execute(&mut self, _ctx: &ReportContext) {
        if self.disabled {
            tracing::info!("Configure operation disabled");
            return;
        }
        self.timing.begin();
        tracing::info!("Running configure test: '{}'...", self.command);

        let mut request = ExecRequest::new(&self.command).capture();
        if let Some(dir) = &self.wdir {
            request = request.working_dir(dir);
        }
        let result = ProcessRunner::new().run(&request);

        if result.is_failure() {
            self.status = 1;
            self.output = match result.captured_output.as_deref() {
                Some(out) if !out.is_empty() => out.to_string(),
                _ => result.to_string(),
            };
        } else {
            self.status = 0;
            self.output = result.output().to_string();
        }
        self.timing.finish();
    }

    pub fn render(&self, ctx: &ReportContext) -> Option<DocumentNode> {
        if self.disabled {
            return None;
        }
        let mut site = ctx.site_node();
        let configure = site.push(DocumentNode::new("Configure"));
        configure.push_leaf("ConfigureCommand", &self.command);
        configure.push_leaf("ConfigureStatus", self.status.to_string());
        self.timing.render_into(configure);
        configure.push_leaf(
            "Log",
            ctx.encode_log(self.success(), self.output.as_bytes(), LogCodec::Plain),
        );
        Some(site)
    }
}
