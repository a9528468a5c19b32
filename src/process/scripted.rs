//! Canned-response runner for unit tests

use std::cell::RefCell;
use std::collections::VecDeque;

use super::command::{CommandOutput, CommandSpec};
use super::runner::{CommandRunner, LineStream};
use crate::error::{SnapvaultError, SnapvaultResult};

/// Replays queued outputs in order and records every command it was given
#[derive(Default)]
pub struct ScriptedRunner {
    responses: RefCell<VecDeque<CommandOutput>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, output: CommandOutput) {
        self.responses.borrow_mut().push_back(output);
    }

    pub fn push_ok(&self, stdout: &str) {
        self.push_output(CommandOutput::ok(stdout));
    }

    pub fn push_exit(&self, exit_code: i32, stderr: &str) {
        self.push_output(CommandOutput::failed(exit_code, stderr));
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Rendered command lines of every call so far
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.to_string()).collect()
    }

    fn next_response(&self, spec: &CommandSpec) -> CommandOutput {
        self.calls.borrow_mut().push(spec.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for '{}'", spec))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> SnapvaultResult<CommandOutput> {
        Ok(self.next_response(spec))
    }

    fn stream(&self, spec: &CommandSpec) -> SnapvaultResult<LineStream<'_>> {
        let output = self.next_response(spec);
        let mut items: Vec<SnapvaultResult<String>> =
            output.stdout.lines().map(|l| Ok(l.to_string())).collect();
        if !output.success() {
            items.push(Err(SnapvaultError::CommandFailed {
                command: spec.to_string(),
                exit_code: output.exit_code,
                stdout: String::new(),
                stderr: output.stderr,
            }));
        }
        Ok(Box::new(items.into_iter()))
    }
}
