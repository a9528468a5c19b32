//! Command descriptions and captured results
//!
//! A `CommandSpec` describes one invocation of an external tool without
//! executing it. Runners turn it into a `CommandOutput`.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::error;

use crate::error::{SnapvaultError, SnapvaultResult};

/// How a command's output streams are wired up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Capture stdout and stderr for the caller
    #[default]
    Capture,
    /// Let the operator watch progress; stderr is mirrored and its tail kept
    Passthrough,
}

/// One invocation of an external program
#[derive(Clone)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    cwd: Option<PathBuf>,
    mode: OutputMode,
}

impl CommandSpec {
    /// Create a new command for the given program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            mode: OutputMode::Capture,
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child (added to the inherited environment)
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.env.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.env.push((key, value)),
        }
        self
    }

    /// Run the command from the given working directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Mirror output to the operator instead of capturing it silently
    pub fn passthrough(mut self) -> Self {
        self.mode = OutputMode::Passthrough;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Look up one of the explicitly set environment variables
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }
}

// Environment values may carry the repository passphrase, so only keys are shown.
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env_keys)
            .field("cwd", &self.cwd)
            .field("mode", &self.mode)
            .finish()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Create a successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create an output with a specific exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into a `CommandFailed` error, logging both streams
    pub fn into_result(self, spec: &CommandSpec) -> SnapvaultResult<CommandOutput> {
        if self.success() {
            return Ok(self);
        }
        Err(self.into_error(spec))
    }

    /// Accept any of the given exit codes as success
    pub fn accept_codes(self, spec: &CommandSpec, ok_codes: &[i32]) -> SnapvaultResult<CommandOutput> {
        if ok_codes.contains(&self.exit_code) {
            return Ok(self);
        }
        Err(self.into_error(spec))
    }

    /// Interpret an existence query
    ///
    /// Exit code 0 means found, `not_found_code` means absent, and anything
    /// else is a genuine fault surfaced as `CommandFailed`.
    pub fn presence(self, spec: &CommandSpec, not_found_code: i32) -> SnapvaultResult<bool> {
        match self.exit_code {
            0 => Ok(true),
            code if code == not_found_code => Ok(false),
            _ => Err(self.into_error(spec)),
        }
    }

    fn into_error(self, spec: &CommandSpec) -> SnapvaultError {
        error!(exit_code = self.exit_code, "Command failed: {}", spec);
        if !self.stdout.trim().is_empty() {
            error!("Failed command stdout: {}", self.stdout.trim());
        }
        if !self.stderr.trim().is_empty() {
            error!("Failed command stderr: {}", self.stderr.trim());
        }
        SnapvaultError::CommandFailed {
            command: spec.to_string(),
            exit_code: self.exit_code,
            stdout: self.stdout,
            stderr: self.stderr,
        }
    }
}
