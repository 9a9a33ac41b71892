//! Command-execution port.
//!
//! The pipeline shells out to git and the container engine through [`CommandRunner`], so
//! the sequencing logic can be exercised with a scripted fake instead of real tools.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::Result;
use crate::error::CommandFailure;

/// Lines of output kept in a [`CommandFailure`].
const FAILURE_TAIL_LINES: usize = 5;

/// A subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Log output lines as they arrive instead of only collecting them.
    pub stream_output: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            stream_output: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn streamed(mut self) -> Self {
        self.stream_output = true;
        self
    }

    /// Whether the arguments start with `prefix`.
    pub fn has_args(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A line of output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub content: String,
}

impl LogLine {
    pub fn stdout(content: impl Into<String>) -> Self {
        Self::new(LogStream::Stdout, content)
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self::new(LogStream::Stderr, content)
    }

    pub fn new(stream: LogStream, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// What a finished subprocess produced.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub lines: Vec<LogLine>,
}

impl CommandOutput {
    pub fn success(lines: Vec<LogLine>) -> Self {
        Self {
            exit_code: Some(0),
            lines,
        }
    }

    pub fn failure(exit_code: i32, lines: Vec<LogLine>) -> Self {
        Self {
            exit_code: Some(exit_code),
            lines,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout lines joined with newlines.
    pub fn stdout(&self) -> String {
        self.lines
            .iter()
            .filter(|l| l.stream == LogStream::Stdout)
            .map(|l| l.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Last meaningful lines of output, for error messages.
    pub fn tail(&self, n: usize) -> String {
        let meaningful: Vec<&str> = self
            .lines
            .iter()
            .filter_map(|l| clean_line(&l.content))
            .collect();
        meaningful[meaningful.len().saturating_sub(n)..].join("\n")
    }

    /// Turn a non-zero exit into a [`CommandFailure`] for `spec`.
    pub fn into_result(self, spec: &CommandSpec) -> std::result::Result<Self, CommandFailure> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(CommandFailure {
                command: spec.to_string(),
                exit_code: self.exit_code,
                detail: self.tail(FAILURE_TAIL_LINES),
            })
        }
    }
}

/// Runs subprocesses to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Name of this runner.
    fn name(&self) -> &'static str;

    /// Run `spec` and wait for it to exit.
    ///
    /// A non-zero exit is not an error at this level; `Err` means the process could not be
    /// started or its output could not be read.
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput>;
}

/// The part of a raw output line worth logging, or `None` for noise.
///
/// Progress redraws are joined with carriage returns, so only the text after the last
/// `\r` is considered. Lines without a single letter (blank lines, bare progress bars,
/// percentages, timings) are noise.
pub fn clean_line(raw: &str) -> Option<&str> {
    let visible = raw.rsplit('\r').next().unwrap_or(raw).trim();
    if visible.chars().any(char::is_alphabetic) {
        Some(visible)
    } else {
        None
    }
}
