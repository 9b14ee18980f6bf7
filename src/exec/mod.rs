//! Shell command execution with merged output capture
//!
//! Every operation runs its command through [`ProcessRunner`]. The child's
//! stdout and stderr share one file; once the child exits the file is read
//! back, line endings are normalized, and each line is handed to the caller's
//! line filter with its 1-based line number.
//!
//! Failure to start the process never escapes as an error: it is reported in
//! [`ExecutionResult::error_message`] with exit code [`NOT_EXECUTABLE`].

mod timeout;

pub use timeout::{TerminationTimer, TERMINATED_NOTICE, TIMEOUT_NOTICE};

use std::fmt;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::NamedTempFile;
use thiserror::Error;

/// Exit code reported when the command could not be started
pub const NOT_EXECUTABLE: i32 = 127;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Internal I/O failures around the output file
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("cannot create output file {path}: {source}")]
    OutputFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot create temporary output file: {0}")]
    TempFile(#[source] io::Error),

    #[error("cannot read output file {path}: {source}")]
    ReadBack {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("spawn failed: {0}")]
    Spawn(#[source] io::Error),

    #[error("wait failed: {0}")]
    Wait(#[source] io::Error),
}

/// Outcome of one command execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub command: String,
    /// Whole output, present when capture was requested
    pub captured_output: Option<String>,
    /// Set only when the process could not be run at all
    pub error_message: Option<String>,
    pub exit_code: i32,
    /// The termination timer fired
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Result for a command that could not be started
    pub fn not_executable(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            captured_output: None,
            error_message: Some(message.into()),
            exit_code: NOT_EXECUTABLE,
            timed_out: false,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error_message.is_some() || self.exit_code != 0
    }

    /// Captured output, or empty
    pub fn output(&self) -> &str {
        self.captured_output.as_deref().unwrap_or("")
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(msg) = &self.error_message {
            write!(f, "Error executing '{}': {}", self.command, msg)
        } else if self.exit_code != 0 {
            write!(
                f,
                "Error executing '{}': program returned {}",
                self.command, self.exit_code
            )
        } else {
            Ok(())
        }
    }
}

/// What to run and how to collect its output
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub command_line: String,
    /// Keep the output here instead of a temporary file
    pub output_file: Option<PathBuf>,
    pub capture_output: bool,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ExecRequest {
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            ..Default::default()
        }
    }

    pub fn capture(mut self) -> Self {
        self.capture_output = true;
        self
    }

    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Zero disables the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }
}

/// Runs commands through the platform shell
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    temp_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place temporary output files in `dir` instead of the system temp dir
    pub fn with_temp_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: Some(dir.into()),
        }
    }

    /// Run without a line filter
    pub fn run(&self, request: &ExecRequest) -> ExecutionResult {
        self.execute(request, |_, _| {})
    }

    /// Run `request`, calling `line_filter(line, n)` for each output line.
    pub fn execute<F>(&self, request: &ExecRequest, mut line_filter: F) -> ExecutionResult
    where
        F: FnMut(&str, usize),
    {
        tracing::debug!(command = %request.command_line, "executing");
        match self.try_execute(request, &mut line_filter) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("  error: {}", e);
                let message = match e {
                    ExecError::Spawn(source) => source.to_string(),
                    other => other.to_string(),
                };
                ExecutionResult::not_executable(&request.command_line, message)
            }
        }
    }

    fn try_execute(
        &self,
        request: &ExecRequest,
        line_filter: &mut dyn FnMut(&str, usize),
    ) -> Result<ExecutionResult, ExecError> {
        // Holds the temp file alive until read back; removed on drop.
        let mut temp: Option<NamedTempFile> = None;
        let (file, path) = match &request.output_file {
            Some(path) => {
                let file = File::create(path).map_err(|source| ExecError::OutputFile {
                    path: path.display().to_string(),
                    source,
                })?;
                (file, path.clone())
            }
            None => {
                let named = self.temp_file()?;
                let file = named.reopen().map_err(ExecError::TempFile)?;
                let path = named.path().to_path_buf();
                temp = Some(named);
                (file, path)
            }
        };

        let (status, timed_out) = run_child(request, file)?;
        let exit_code = exit_code(status);
        if timed_out {
            tracing::warn!(command = %request.command_line, "command timed out");
        }

        let captured = read_back(&path, request.capture_output, line_filter)?;
        drop(temp);

        Ok(ExecutionResult {
            command: request.command_line.clone(),
            captured_output: captured,
            error_message: None,
            exit_code,
            timed_out,
        })
    }

    fn temp_file(&self) -> Result<NamedTempFile, ExecError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ccexec");
        match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ExecError::TempFile)
    }
}

/// Spawn the child and wait for it, with the timer armed if requested.
///
/// `file` is closed only after the timer has been disarmed.
fn run_child(request: &ExecRequest, file: File) -> Result<(ExitStatus, bool), ExecError> {
    let stdout = file.try_clone().map_err(ExecError::TempFile)?;
    let stderr = file.try_clone().map_err(ExecError::TempFile)?;

    let mut command = shell_command(&request.command_line);
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    if let Some(dir) = &request.working_dir {
        command.current_dir(dir);
    }

    let mut child = command.spawn().map_err(ExecError::Spawn)?;
    // Child sees end-of-input immediately
    drop(child.stdin.take());

    let child = Arc::new(Mutex::new(child));
    let timer = match request.timeout {
        Some(limit) => {
            let handle = file.try_clone().map_err(ExecError::TempFile)?;
            Some(TerminationTimer::arm(limit, Arc::clone(&child), handle))
        }
        None => None,
    };

    let waited = wait_for(&child);
    let timed_out = timer.map(TerminationTimer::disarm).unwrap_or(false);
    drop(file);

    Ok((waited?, timed_out))
}

fn wait_for(child: &Arc<Mutex<Child>>) -> Result<ExitStatus, ExecError> {
    loop {
        {
            let mut guard = child
                .lock()
                .map_err(|_| ExecError::Wait(io::Error::other("process handle poisoned")))?;
            if let Some(status) = guard.try_wait().map_err(ExecError::Wait)? {
                return Ok(status);
            }
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn shell_command(command_line: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(command_line);
    command
}

#[cfg(windows)]
fn shell_command(command_line: &str) -> Command {
    use std::os::windows::process::CommandExt;

    let trimmed = command_line.trim_start();
    let (program, rest) = if let Some(quoted) = trimmed.strip_prefix('"') {
        match quoted.find('"') {
            Some(end) => (&quoted[..end], &quoted[end + 1..]),
            None => (quoted, ""),
        }
    } else {
        match trimmed.find(char::is_whitespace) {
            Some(end) => (&trimmed[..end], &trimmed[end..]),
            None => (trimmed, ""),
        }
    };
    let mut command = Command::new(program);
    let rest = rest.trim_start();
    if !rest.is_empty() {
        command.raw_arg(rest);
    }
    command
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => -signal,
        (None, None) => -1,
    }
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Read the output file back, strip `\r`, and feed each line to the filter.
fn read_back(
    path: &Path,
    capture: bool,
    line_filter: &mut dyn FnMut(&str, usize),
) -> Result<Option<String>, ExecError> {
    let bytes = fs::read(path).map_err(|source| ExecError::ReadBack {
        path: path.display().to_string(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes).replace('\r', "");

    let mut captured = capture.then(|| String::with_capacity(text.len()));
    for (index, raw) in text.split_inclusive('\n').enumerate() {
        if let Some(out) = captured.as_mut() {
            out.push_str(raw);
        }
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        tracing::trace!("   {}", line);
        line_filter(line, index + 1);
    }
    Ok(captured)
}
