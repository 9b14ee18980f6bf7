//! ccdash CLI
//!
//! Entry point for the `ccdash` command-line tool.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde_json::json;
use thiserror::Error;

use ccdash::config::{ConfigError, Settings};
use ccdash::merge::{MergeError, ReportMerger};
use ccdash::ops::{Build, Configure, OperationError, Test, TestItem, Update};
use ccdash::submission::{Scenario, ScenarioError, SubmissionError};
use ccdash::telemetry;
use ccdash::upload::{submit_document, CurlUploader, UploadError, Uploader};

#[derive(Parser)]
#[command(name = "ccdash")]
#[command(about = "Build, test and submit results to a CDash dashboard", version)]
#[command(after_help = "Example:\n  ccdash build \"make clean && make all\" -w /path/to/project \\\n    \
    -U http://dash.example.org/submit.php?project=Hello -S testsite \\\n    \
    -T 20081220-2055 -B linux-gcc-4.1.1 -G Experimental")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Full URL to submit the XML document to
    #[arg(short = 'U', long, global = true)]
    url: Option<String>,

    /// Site name identifying the submitter
    #[arg(short = 'S', long, global = true)]
    site: Option<String>,

    /// Build timestamp (e.g. 20080331-0210) grouping submissions into one row
    #[arg(short = 'T', long, global = true)]
    timestamp: Option<String>,

    /// Build identification (e.g. linux-gcc-4.1.1)
    #[arg(short = 'B', long = "build", global = true)]
    build_name: Option<String>,

    /// Dashboard group (Nightly, Continuous, Experimental)
    #[arg(short = 'G', long, global = true)]
    group: Option<String>,

    /// Do not update the local working copy
    #[arg(long, global = true)]
    no_update: bool,

    /// Always include the build log in build reports
    #[arg(long, global = true)]
    build_log: bool,

    /// Keep the plain-text build output in this file
    #[arg(long, global = true)]
    build_log_file: Option<PathBuf>,

    /// Test timeout in seconds, 0 disables
    #[arg(long = "t1", global = true)]
    t1: Option<u64>,

    /// Working directory for commands
    #[arg(short = 'w', long = "work-dir", global = true)]
    wdir: Option<PathBuf>,

    /// Output log sent to the dashboard: 0 never, 1 on error, 2 always
    #[arg(short = 'l', long, global = true)]
    log_level: Option<u8>,

    /// Maximum log size in bytes, -1 for no limit
    #[arg(long, global = true, allow_negative_numbers = true)]
    max_log: Option<i64>,

    /// Keep the first part of a trimmed log instead of the last
    #[arg(long, global = true)]
    first_log: bool,

    /// Write the reports but do not upload them
    #[arg(short = 'y', long, global = true)]
    dry_run: bool,

    /// Save the XML report to this file
    #[arg(short = 'o', long, global = true)]
    output: Option<PathBuf>,

    /// More diagnostics (repeat for more)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./ccdash.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the working copy is up to date; exits 1 if not
    Status,

    /// Update the working copy and submit the result
    Update,

    /// Run a configure command and submit the result
    Configure {
        /// Command line to run
        cmd: String,
    },

    /// Run a build command and submit warnings and errors
    Build {
        /// Command line to run
        cmd: String,
    },

    /// Run one test and submit it as NAME
    Test {
        /// Test name
        name: String,

        /// Command line to run
        cmd: String,
    },

    /// Merge report files into one and submit it
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Upload a report file as is
    Upload { file: PathBuf },

    /// Execute an XML scenario file
    Scenario { file: PathBuf },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("{0}")]
    Usage(String),
}

fn main() {
    let cli = Cli::parse();
    telemetry::init_tracing(telemetry::level_for(cli.verbose, cli.quiet));

    let code = match run(cli) {
        Ok(0) => 0,
        Ok(_) => 1,
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> Result<i32, CliError> {
    let settings = Settings::load(cli.config.as_deref(), Some(cli_overrides(&cli)))?;

    match cli.command {
        Commands::Status => run_status(&settings),
        Commands::Update => run_update(&settings),
        Commands::Configure { cmd } => run_configure(&settings, &cmd),
        Commands::Build { cmd } => run_build(&settings, &cmd),
        Commands::Test { name, cmd } => run_test(&settings, &name, &cmd),
        Commands::Merge { files } => run_merge(&settings, &files),
        Commands::Upload { file } => run_upload(&settings, &file),
        Commands::Scenario { file } => run_scenario(&settings, &file),
    }
}

/// Command-line layer of the configuration. Unset options stay null so
/// lower layers show through.
fn cli_overrides(cli: &Cli) -> serde_json::Value {
    json!({
        "url": cli.url,
        "site": cli.site,
        "timestamp": cli.timestamp,
        "build_name": cli.build_name,
        "group": cli.group,
        "wdir": cli.wdir,
        "no_update": cli.no_update.then_some(true),
        "build_log": cli.build_log.then_some(true),
        "build_log_file": cli.build_log_file,
        "test_timeout_seconds": cli.t1,
        "log_level": cli.log_level,
        "max_log": cli.max_log,
        "last_log": cli.first_log.then_some(false),
        "dry_run": cli.dry_run.then_some(true),
        "output": cli.output,
    })
}

fn identified(settings: &Settings) -> Result<ccdash::ReportContext, CliError> {
    settings.require_identity().map_err(|e| match e {
        ConfigError::Missing(fields) => {
            CliError::Usage(format!("one or more mandatory options are missing: {}", fields))
        }
        other => other.into(),
    })?;
    Ok(settings.context())
}

fn run_status(settings: &Settings) -> Result<i32, CliError> {
    let ctx = settings.context();
    let mut update = Update::svn(&ctx.wdir)?;
    update.check_only = true;
    let need_update = update.check_status()?;
    Ok(i32::from(need_update))
}

fn run_update(settings: &Settings) -> Result<i32, CliError> {
    let ctx = identified(settings)?;
    let mut update = Update::svn(&ctx.wdir)?;
    update.check_only = ctx.no_update;
    update.execute()?;
    if let Some(doc) = update.render(&ctx) {
        submit_document(&ctx, &doc, &CurlUploader::new(&ctx.submit_url))?;
    }
    Ok(0)
}

fn run_configure(settings: &Settings, cmd: &str) -> Result<i32, CliError> {
    let ctx = identified(settings)?;
    let mut configure = Configure::new(cmd);
    configure.wdir = Some(ctx.wdir.clone());
    configure.execute(&ctx);
    if let Some(doc) = configure.render(&ctx) {
        submit_document(&ctx, &doc, &CurlUploader::new(&ctx.submit_url))?;
    }
    Ok(configure.exit_code())
}

fn run_build(settings: &Settings, cmd: &str) -> Result<i32, CliError> {
    let ctx = identified(settings)?;
    let mut build = Build::new(cmd);
    build.wdir = Some(ctx.wdir.clone());
    build.build_log = ctx.build_log;
    build.log_file = ctx.build_log_file.clone();
    build.execute(&ctx);
    if let Some(doc) = build.render(&ctx) {
        submit_document(&ctx, &doc, &CurlUploader::new(&ctx.submit_url))?;
    }
    Ok(build.exit_code())
}

fn run_test(settings: &Settings, name: &str, cmd: &str) -> Result<i32, CliError> {
    let ctx = identified(settings)?;
    let mut item = TestItem::new(name, name, cmd);
    item.wdir = Some(ctx.wdir.clone());
    let mut test = Test::new(vec![item]);
    test.execute(&ctx);
    if let Some(doc) = test.render(&ctx) {
        submit_document(&ctx, &doc, &CurlUploader::new(&ctx.submit_url))?;
    }
    Ok(test.exit_code())
}

fn run_merge(settings: &Settings, files: &[PathBuf]) -> Result<i32, CliError> {
    let ctx = identified(settings)?;
    let merged = ReportMerger::new(&ctx).merge_files(files)?;
    submit_document(&ctx, &merged, &CurlUploader::new(&ctx.submit_url))?;
    Ok(0)
}

fn run_upload(settings: &Settings, file: &Path) -> Result<i32, CliError> {
    let url = settings
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| CliError::Usage("URL not specified".to_string()))?;
    CurlUploader::new(url).upload_file(file)?;
    println!("Upload success");
    Ok(0)
}

fn run_scenario(settings: &Settings, file: &Path) -> Result<i32, CliError> {
    let mut scenario = Scenario::load(settings, file)?;
    let uploader = CurlUploader::new(scenario.submit_url());
    let outcomes = scenario.execute(&uploader)?;
    println!("Done");
    Ok(i32::from(outcomes.iter().any(|o| o.exit_code != 0)))
}
