//! Execution context threaded through every statement and expression
//!
//! [`ProgramContext`] records what the running program has printed, the input
//! `scanf` reads from, the source line being executed, and the counters that
//! bound runaway loops and recursion.

use crate::interpreter::constants::{LOOP_LIMIT, MAX_CALL_DEPTH};
use crate::interpreter::errors::{ResourceError, RuntimeError};

/// Mutable per-run state that is not part of the memory image
#[derive(Debug, Clone)]
pub struct ProgramContext {
    output: String,
    input: Vec<char>,
    cursor: usize,
    line: usize,
    call_depth: usize,
    loop_limit: u64,
    max_call_depth: usize,
    iterations: u64,
}

impl ProgramContext {
    pub fn new(loop_limit: u64, max_call_depth: usize) -> Self {
        ProgramContext {
            output: String::new(),
            input: Vec::new(),
            cursor: 0,
            line: 0,
            call_depth: 0,
            loop_limit,
            max_call_depth,
            iterations: 0,
        }
    }

    pub fn with_input(mut self, input: &str) -> Self {
        self.input = input.chars().collect();
        self.cursor = 0;
        self
    }

    /// Append program output
    pub fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    /// Output split into lines, without a trailing empty line
    pub fn output_lines(&self) -> Vec<String> {
        let mut lines: Vec<String> = self.output.split('\n').map(|s| s.to_string()).collect();
        if lines.last().is_some_and(|s| s.is_empty()) {
            lines.pop();
        }
        lines
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn set_line(&mut self, line: usize) {
        self.line = line;
    }

    /// Next whitespace-delimited token of input, if any remains
    pub fn next_token(&mut self) -> Option<String> {
        while self.cursor < self.input.len() && self.input[self.cursor].is_whitespace() {
            self.cursor += 1;
        }
        let start = self.cursor;
        while self.cursor < self.input.len() && !self.input[self.cursor].is_whitespace() {
            self.cursor += 1;
        }
        (self.cursor > start).then(|| self.input[start..self.cursor].iter().collect())
    }

    /// Next raw input character, whitespace included
    pub fn next_char(&mut self) -> Option<char> {
        let c = self.input.get(self.cursor).copied()?;
        self.cursor += 1;
        Some(c)
    }

    /// Count one iteration of a loop that has already run `so_far` times
    pub fn tick_loop(&mut self, so_far: u64) -> Result<(), RuntimeError> {
        self.iterations += 1;
        if so_far >= self.loop_limit {
            return Err(ResourceError::RunawayLoop {
                limit: self.loop_limit,
            }
            .into());
        }
        Ok(())
    }

    /// Total loop iterations executed so far, across all loops
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn enter_call(&mut self) -> Result<(), RuntimeError> {
        if self.call_depth >= self.max_call_depth {
            return Err(ResourceError::CallDepth {
                limit: self.max_call_depth,
            }
            .into());
        }
        self.call_depth += 1;
        Ok(())
    }

    pub fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn call_depth(&self) -> usize {
        self.call_depth
    }
}

impl Default for ProgramContext {
    fn default() -> Self {
        Self::new(LOOP_LIMIT, MAX_CALL_DEPTH)
    }
}
