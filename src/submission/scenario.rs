//! Scenario files: several submissions described in one XML document
//!
//! ```xml
//! <Scenario site="host" url="http://dash/submit.php?project=Foo" wdir="/src/foo">
//!   <Submit group="Nightly" build="linux-gcc" exclude="testitem.*slow">
//!     <Update />
//!     <Configure cmd="./configure" />
//!     <Build cmd="make" />
//!     <Test name="unit" cmd="make check" />
//!   </Submit>
//! </Scenario>
//! ```
//!
//! Site, URL and working directory given in the settings take precedence
//! over the root attributes; so does the group. The whole document is
//! validated before anything runs, and every submission shares one
//! timestamp.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{ExcludeFilter, Submission, SubmissionError, SubmissionOutcome};
use crate::config::{ConfigError, Settings};
use crate::document::{parse_file, DocumentError, DocumentNode};
use crate::ops::{Operation, OperationError};
use crate::upload::Uploader;

/// Errors from loading a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("missing <Scenario> root node, found <{0}>")]
    MissingRoot(String),

    #[error("{0} is not specified, set it in the scenario file or on the command line")]
    MissingSetting(&'static str),

    #[error("expecting <Submit> node below <Scenario> node, found <{0}>")]
    UnexpectedElement(String),

    #[error("missing '{0}' attribute in <Submit>")]
    MissingAttribute(&'static str),

    #[error("invalid exclude pattern '{pattern}': {message}")]
    Exclude { pattern: String, message: String },

    #[error("error parsing <{element}> node: {source}")]
    Operation {
        element: String,
        #[source]
        source: OperationError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Parsed scenario, ready to execute
#[derive(Debug)]
pub struct Scenario {
    submit_url: String,
    submissions: Vec<Submission>,
}

impl Scenario {
    pub fn load(settings: &Settings, path: &Path) -> Result<Self, ScenarioError> {
        let root = parse_file(path)?;
        Self::from_document(settings, &root)
    }

    pub fn from_document(settings: &Settings, root: &DocumentNode) -> Result<Self, ScenarioError> {
        if !root.tag.eq_ignore_ascii_case("scenario") {
            return Err(ScenarioError::MissingRoot(root.tag.clone()));
        }

        let mut settings = settings.clone();
        settings.site = Some(
            setting_or_attr(settings.site.take(), root, "site").ok_or(ScenarioError::MissingSetting("site name"))?,
        );
        settings.url =
            Some(setting_or_attr(settings.url.take(), root, "url").ok_or(ScenarioError::MissingSetting("URL"))?);
        let wdir = setting_or_attr(
            settings.wdir.take().map(|p| p.display().to_string()),
            root,
            "wdir",
        )
        .ok_or(ScenarioError::MissingSetting("wdir"))?;
        settings.wdir = Some(PathBuf::from(wdir));
        let settings = settings.with_current_timestamp();
        let submit_url = settings.url.clone().unwrap_or_default();

        let submissions = root
            .children
            .iter()
            .map(|node| parse_submission(&settings, node))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!("scenario loaded with {} submissions", submissions.len());
        Ok(Self {
            submit_url,
            submissions,
        })
    }

    /// Dashboard URL shared by every submission
    pub fn submit_url(&self) -> &str {
        &self.submit_url
    }

    pub fn submissions(&self) -> &[Submission] {
        &self.submissions
    }

    /// Execute every submission in order. A configure or build failure
    /// stops only its own submission.
    pub fn execute(&mut self, uploader: &dyn Uploader) -> Result<Vec<SubmissionOutcome>, SubmissionError> {
        let mut outcomes = Vec::with_capacity(self.submissions.len());
        for submission in &mut self.submissions {
            let ctx = submission.context();
            tracing::info!("Submission {} / {}", ctx.build_name, ctx.stamp);
            outcomes.push(submission.execute(uploader)?);
        }
        Ok(outcomes)
    }
}

fn parse_submission(settings: &Settings, node: &DocumentNode) -> Result<Submission, ScenarioError> {
    if !node.tag.eq_ignore_ascii_case("submit") {
        return Err(ScenarioError::UnexpectedElement(node.tag.clone()));
    }

    let mut settings = settings.clone();
    settings.group = Some(
        setting_or_attr(settings.group.take(), node, "group").ok_or(ScenarioError::MissingAttribute("group"))?,
    );
    settings.build_name = Some(non_empty_attr(node, "build").ok_or(ScenarioError::MissingAttribute("build"))?);
    settings.require_identity()?;

    let mut submission = Submission::new(settings.context());
    if let Some(pattern) = non_empty_attr(node, "exclude") {
        let filter = ExcludeFilter::new(&pattern).map_err(|e| ScenarioError::Exclude {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        submission = submission.with_exclude(filter);
    }

    for child in &node.children {
        let op = Operation::from_declaration(submission.context(), child).map_err(|source| {
            ScenarioError::Operation {
                element: child.tag.clone(),
                source,
            }
        })?;
        submission.push(op);
    }
    Ok(submission)
}

fn non_empty_attr(node: &DocumentNode, key: &str) -> Option<String> {
    node.attr(key).filter(|v| !v.is_empty()).map(str::to_string)
}

fn setting_or_attr(setting: Option<String>, node: &DocumentNode, key: &str) -> Option<String> {
    setting.filter(|v| !v.is_empty()).or_else(|| non_empty_attr(node, key))
}
