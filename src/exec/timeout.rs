//! Timeout enforcement for executed commands
//!
//! A [`TerminationTimer`] is armed right after a child process starts. If the
//! deadline passes before it is disarmed, the timer thread writes a notice
//! into the command's output file and terminates the child.
//!
//! [`TerminationTimer::disarm`] cancels the timer and joins its thread, so
//! once it returns the timer can no longer touch the output file. Callers
//! must disarm before closing the output file.

use std::fs::File;
use std::io::Write;
use std::process::Child;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Notice written into the output when the deadline passes
pub const TIMEOUT_NOTICE: &str =
    "*** ccdash timeout: process has been running for too long, attempting to stop it now ***";

/// Notice written after a successful termination request
pub const TERMINATED_NOTICE: &str = "*** process terminated successfully ***";

/// Armed timer for a single child process
#[derive(Debug)]
pub struct TerminationTimer {
    cancel: mpsc::Sender<()>,
    handle: JoinHandle<bool>,
}

impl TerminationTimer {
    /// Start the timer thread.
    ///
    /// `child` is shared with the waiting thread; `output` is a handle onto
    /// the same file the child writes to.
    pub fn arm(timeout: Duration, child: Arc<Mutex<Child>>, output: File) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let handle = thread::spawn(move || match cancelled.recv_timeout(timeout) {
            // Disarmed, or the owner went away
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
            Err(RecvTimeoutError::Timeout) => {
                terminate(&child, output);
                true
            }
        });
        Self { cancel, handle }
    }

    /// Cancel the timer and wait for its thread.
    ///
    /// Returns true if the timer fired before it was disarmed.
    pub fn disarm(self) -> bool {
        // The receiver is gone if the timer already fired.
        let _ = self.cancel.send(());
        self.handle.join().unwrap_or(true)
    }
}

fn terminate(child: &Arc<Mutex<Child>>, mut output: File) {
    tracing::error!("{}", TIMEOUT_NOTICE);
    let _ = output.flush();
    let _ = write!(output, "\n{}\n", TIMEOUT_NOTICE);

    let result = match child.lock() {
        Ok(mut child) => send_terminate(&mut child),
        Err(_) => Err("process handle poisoned".to_string()),
    };

    let notice = match result {
        Ok(()) => TERMINATED_NOTICE.to_string(),
        Err(e) => format!("*** error terminating process: {} ***", e),
    };
    tracing::error!("{}", notice);
    let _ = writeln!(output, "{}", notice);
    let _ = output.flush();
}

#[cfg(unix)]
fn send_terminate(child: &mut Child) -> Result<(), String> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(child.id() as i32);
    signal::kill(pid, Signal::SIGTERM).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child) -> Result<(), String> {
    child.kill().map_err(|e| e.to_string())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};
    use std::time::Instant;

    fn spawn_sleep(secs: &str) -> Arc<Mutex<Child>> {
        let child = Command::new("sleep")
            .arg(secs)
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        Arc::new(Mutex::new(child))
    }

    fn wait(child: &Arc<Mutex<Child>>) {
        loop {
            if let Some(_) = child.lock().unwrap().try_wait().unwrap() {
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_disarm_before_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("out.log")).unwrap();
        let child = spawn_sleep("0");
        let timer = TerminationTimer::arm(Duration::from_secs(30), Arc::clone(&child), file);
        wait(&child);
        assert!(!timer.disarm());
        let text = std::fs::read_to_string(dir.path().join("out.log")).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn test_fires_and_terminates() {
        let dir = tempfile::tempdir().unwrap();
        let file = File::create(dir.path().join("out.log")).unwrap();
        let child = spawn_sleep("30");
        let start = Instant::now();
        let timer = TerminationTimer::arm(Duration::from_millis(200), Arc::clone(&child), file);
        wait(&child);
        assert!(timer.disarm());
        assert!(start.elapsed() < Duration::from_secs(10));
        let text = std::fs::read_to_string(dir.path().join("out.log")).unwrap();
        assert!(text.contains(TIMEOUT_NOTICE));
        assert!(text.contains(TERMINATED_NOTICE));
    }
}
