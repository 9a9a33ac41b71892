//! Local subprocess runner.

use async_trait::async_trait;
use dockhand_core::executor::{CommandOutput, CommandRunner, CommandSpec, LogLine, LogStream, clean_line};
use dockhand_core::{Error, Result};
use std::collections::VecDeque;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::SplitStream;
use tracing::{debug, info};

/// Meaningful lines kept from a streamed command, for failure reports.
const STREAMED_LINES_KEPT: usize = 50;

/// Output gathered from a child. Streamed commands are already in the log, so only
/// their most recent meaningful lines are kept.
struct Collected {
    lines: VecDeque<LogLine>,
    limit: Option<usize>,
}

impl Collected {
    fn for_spec(spec: &CommandSpec) -> Self {
        Self {
            lines: VecDeque::new(),
            limit: spec.stream_output.then_some(STREAMED_LINES_KEPT),
        }
    }

    fn push(&mut self, line: LogLine) {
        if let Some(limit) = self.limit {
            if clean_line(&line.content).is_none() {
                return;
            }
            if self.lines.len() == limit {
                self.lines.pop_front();
            }
        }
        self.lines.push_back(line);
    }
}

/// Runs commands as child processes of the worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        debug!(command = %spec, cwd = ?spec.working_dir, "Running command");

        let mut child = command.spawn().map_err(|e| {
            Error::ExecutionFailed(format!("failed to start `{}`: {}", spec.program, e))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Internal("stderr not captured".to_string()))?;

        // Output is split on raw bytes so non-UTF-8 build output cannot abort the read.
        let stdout = SplitStream::new(BufReader::new(stdout).split(b'\n'))
            .map(|chunk| (LogStream::Stdout, chunk));
        let stderr = SplitStream::new(BufReader::new(stderr).split(b'\n'))
            .map(|chunk| (LogStream::Stderr, chunk));
        let mut output = stdout.merge(stderr);

        let mut collected = Collected::for_spec(&spec);
        while let Some((stream, chunk)) = output.next().await {
            let content = String::from_utf8_lossy(&chunk?).into_owned();
            if spec.stream_output {
                if let Some(visible) = clean_line(&content) {
                    info!(target: "dockhand::build_output", "{}", visible);
                }
            }
            collected.push(LogLine::new(stream, content));
        }

        let status = child.wait().await?;
        debug!(command = %spec, status = ?status.code(), "Command finished");

        Ok(CommandOutput {
            exit_code: status.code(),
            lines: collected.lines.into(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let err = ProcessRunner
            .run(CommandSpec::new("dockhand-definitely-not-installed"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed(_)));
    }

    #[test]
    fn test_streamed_collection_keeps_recent_meaningful_lines() {
        let mut collected = Collected::for_spec(&CommandSpec::new("docker").streamed());
        for i in 0..1000 {
            collected.push(LogLine::stdout(format!("Step {i}")));
            collected.push(LogLine::stdout("[=====>   ] 45%"));
        }

        assert_eq!(collected.lines.len(), STREAMED_LINES_KEPT);
        assert_eq!(collected.lines.front().unwrap().content, "Step 950");
        assert_eq!(collected.lines.back().unwrap().content, "Step 999");
    }

    #[test]
    fn test_captured_collection_keeps_everything() {
        let mut collected = Collected::for_spec(&CommandSpec::new("git"));
        for i in 0..100 {
            collected.push(LogLine::stdout(i.to_string()));
        }
        assert_eq!(collected.lines.len(), 100);
    }
}
