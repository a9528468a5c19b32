//! Command runners
//!
//! `CommandRunner` is the seam between snapvault and the host: managers build
//! `CommandSpec`s and hand them to a runner. `SystemRunner` executes them with
//! `std::process`; tests substitute a simulated host.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, trace};

use super::command::{CommandOutput, CommandSpec, OutputMode};
use crate::error::{SnapvaultError, SnapvaultResult};

/// Lines of a running command's stdout; the final item is an error if it exits non-zero
pub type LineStream<'a> = Box<dyn Iterator<Item = SnapvaultResult<String>> + 'a>;

/// Executes external commands
pub trait CommandRunner {
    /// Run the command to completion
    ///
    /// A non-zero exit is not an error at this level; it is reported in the
    /// returned `CommandOutput` for the caller to interpret. Only a failure to
    /// start the program is an `Err`.
    fn run(&self, spec: &CommandSpec) -> SnapvaultResult<CommandOutput>;

    /// Start the command and yield its stdout line by line as it arrives
    fn stream(&self, spec: &CommandSpec) -> SnapvaultResult<LineStream<'_>>;
}

/// Number of stderr lines kept for error context in passthrough mode
const STDERR_TAIL_LINES: usize = 40;

/// Runs commands on the local host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }

    fn command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.get_args());
        for (key, value) in spec.get_env() {
            cmd.env(key, value);
        }
        if let Some(dir) = spec.get_current_dir() {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn spawn_error(spec: &CommandSpec, err: std::io::Error) -> SnapvaultError {
        SnapvaultError::CommandSpawn {
            command: spec.to_string(),
            reason: err.to_string(),
        }
    }

    fn run_captured(&self, spec: &CommandSpec) -> SnapvaultResult<CommandOutput> {
        let output = Self::command(spec)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Self::spawn_error(spec, e))?;

        Ok(CommandOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn run_passthrough(&self, spec: &CommandSpec) -> SnapvaultResult<CommandOutput> {
        let mut child = Self::command(spec)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        if let Some(stderr) = child.stderr.take() {
            // Drained to EOF: closing the pipe early would SIGPIPE the child.
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(command = %spec, "Stopped reading stderr: {}", e);
                        break;
                    }
                }
                let line = decode_line(&buf);
                eprintln!("{}", line);
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }

        let status = child.wait().map_err(|e| Self::spawn_error(spec, e))?;
        Ok(CommandOutput {
            exit_code: exit_code(status),
            stdout: String::new(),
            stderr: tail.into_iter().collect::<Vec<_>>().join("\n"),
        })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> SnapvaultResult<CommandOutput> {
        trace!(command = %spec, mode = ?spec.mode(), "Executing command");
        match spec.mode() {
            OutputMode::Capture => self.run_captured(spec),
            OutputMode::Passthrough => self.run_passthrough(spec),
        }
    }

    fn stream(&self, spec: &CommandSpec) -> SnapvaultResult<LineStream<'_>> {
        trace!(command = %spec, "Streaming command output");
        let mut child = Self::command(spec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::spawn_error(spec, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Self::spawn_error(spec, std::io::Error::other("stdout not captured")))?;

        // Drained on a separate thread so a chatty stderr cannot block stdout.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf);
                buf
            })
        });

        Ok(Box::new(ChildLines {
            command: spec.to_string(),
            child: Some(child),
            lines: BufReader::new(stdout),
            stderr_reader,
        }))
    }
}

/// Iterator over the stdout lines of a live child process
struct ChildLines {
    command: String,
    child: Option<Child>,
    lines: BufReader<ChildStdout>,
    stderr_reader: Option<JoinHandle<String>>,
}

impl ChildLines {
    /// Kill and reap the child without waiting on unread output
    fn abort(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.stderr_reader.take();
    }

    fn finish(&mut self) -> Option<SnapvaultResult<String>> {
        let mut child = self.child.take()?;
        let status = match child.wait() {
            Ok(status) => status,
            Err(e) => {
                return Some(Err(SnapvaultError::CommandSpawn {
                    command: self.command.clone(),
                    reason: e.to_string(),
                }))
            }
        };
        let stderr = self
            .stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        let code = exit_code(status);
        debug!(command = %self.command, exit_code = code, "Streamed command finished");
        if code == 0 {
            return None;
        }

        tracing::error!(exit_code = code, "Command failed: {}", self.command);
        if !stderr.trim().is_empty() {
            tracing::error!("Failed command stderr: {}", stderr.trim());
        }
        Some(Err(SnapvaultError::CommandFailed {
            command: self.command.clone(),
            exit_code: code,
            stdout: String::new(),
            stderr,
        }))
    }
}

impl Iterator for ChildLines {
    type Item = SnapvaultResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.as_ref()?;

        let mut buf = Vec::new();
        loop {
            match self.lines.read_until(b'\n', &mut buf) {
                Ok(0) => return self.finish(),
                Ok(_) => return Some(Ok(decode_line(&buf))),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.abort();
                    return Some(Err(SnapvaultError::Io(format!(
                        "Failed to read output of '{}': {}",
                        self.command, e
                    ))));
                }
            }
        }
    }
}

impl Drop for ChildLines {
    fn drop(&mut self) {
        // Consumer stopped early: don't leave a zombie behind.
        self.abort();
    }
}

/// One output line without its terminator; invalid UTF-8 is replaced, not fatal
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

fn exit_code(status: ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}
