//! Test doubles for the command and notification ports.
//!
//! [`FakeToolchain`] stands in for git and the container engine: clones write a fixture
//! tree to disk, `rev-parse HEAD` answers with a fixed commit, and individual builds or
//! pushes can be made to fail. Branch checkouts only succeed for refs that were cloned or
//! fetched into that directory, as with a real single-branch clone.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::NotifyError;
use crate::executor::{CommandOutput, CommandRunner, CommandSpec, LogLine};
use crate::notify::{CompletionHook, Notifier};
use crate::{Error, Result};

pub const FAKE_SHA: &str = "3f2a9c1d4b5e6f708192a3b4c5d6e7f809a1b2c3";

/// Scripted git and container engine.
pub struct FakeToolchain {
    files: HashMap<PathBuf, String>,
    head: String,
    reachable: bool,
    failing_builds: Vec<PathBuf>,
    failing_pushes: Vec<String>,
    checkout: Mutex<Option<String>>,
    repos: Mutex<HashMap<PathBuf, Refs>>,
    calls: Mutex<Vec<CommandSpec>>,
}

/// Refs known to one cloned directory.
#[derive(Default)]
struct Refs {
    branches: HashSet<String>,
    tracking: HashSet<String>,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeToolchain {
    /// A reachable remote whose tree holds a root `Dockerfile`.
    pub fn new() -> Self {
        Self {
            files: HashMap::from([(PathBuf::from("Dockerfile"), "FROM scratch\n".to_string())]),
            head: FAKE_SHA.to_string(),
            reachable: true,
            failing_builds: Vec::new(),
            failing_pushes: Vec::new(),
            checkout: Mutex::new(None),
            repos: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Replace the fixture tree.
    pub fn with_files<I, P, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        self.files = files
            .into_iter()
            .map(|(p, s)| (p.into(), s.into()))
            .collect();
        self
    }

    pub fn with_head(mut self, sha: impl Into<String>) -> Self {
        self.head = sha.into();
        self
    }

    /// Every network operation fails as if the host could not be resolved.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// `build` fails when run in a context ending with `dir`.
    pub fn failing_build(mut self, dir: impl Into<PathBuf>) -> Self {
        self.failing_builds.push(dir.into());
        self
    }

    /// `push` fails for this exact reference.
    pub fn failing_push(mut self, reference: impl Into<String>) -> Self {
        self.failing_pushes.push(reference.into());
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls rendered as command lines.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    fn git(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let cwd = spec.working_dir.clone().unwrap_or_default();
        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();

        match args.as_slice() {
            ["clone", .., url, dir] => {
                if !self.reachable {
                    return Ok(unresolvable(url));
                }
                let dir = Path::new(dir);
                std::fs::create_dir_all(dir.join(".git"))?;
                for (path, content) in &self.files {
                    let target = dir.join(path);
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(target, content)?;
                }
                let branch = args
                    .iter()
                    .position(|a| *a == "--branch")
                    .and_then(|i| args.get(i + 1))
                    .map(|b| b.to_string());
                let mut refs = Refs::default();
                if let Some(branch) = branch {
                    refs.tracking.insert(format!("refs/remotes/origin/{branch}"));
                    refs.branches.insert(branch);
                }
                self.repos.lock().unwrap().insert(dir.to_path_buf(), refs);
                *self.checkout.lock().unwrap() = None;
                Ok(CommandOutput::success(vec![LogLine::stderr(format!(
                    "Cloning into '{}'...",
                    dir.display()
                ))]))
            }
            ["rev-parse", "--is-inside-work-tree"] => {
                if cwd.join(".git").is_dir() {
                    Ok(CommandOutput::success(vec![LogLine::stdout("true")]))
                } else {
                    Ok(CommandOutput::failure(
                        128,
                        vec![LogLine::stderr("fatal: not a git repository")],
                    ))
                }
            }
            ["rev-parse", "HEAD"] => {
                let head = self
                    .checkout
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| self.head.clone());
                Ok(CommandOutput::success(vec![LogLine::stdout(head)]))
            }
            ["fetch", ..] if !self.reachable => Ok(unresolvable("origin")),
            ["fetch", "origin", refspecs @ ..] => {
                let mut repos = self.repos.lock().unwrap();
                let refs = repos.entry(cwd).or_default();
                for refspec in refspecs {
                    if let Some((_, dst)) = refspec.split_once(':') {
                        refs.tracking.insert(dst.to_string());
                    }
                }
                Ok(CommandOutput::success(vec![]))
            }
            ["checkout", "--force", "-B", branch, start] => {
                let mut repos = self.repos.lock().unwrap();
                let refs = repos.entry(cwd).or_default();
                if !refs.tracking.contains(*start) && !crate::job::is_object_id(start) {
                    return Ok(invalid_reference(start));
                }
                refs.branches.insert(branch.to_string());
                *self.checkout.lock().unwrap() = None;
                Ok(CommandOutput::success(vec![]))
            }
            ["checkout", "--force", target, ..] => {
                if crate::job::is_object_id(target) {
                    *self.checkout.lock().unwrap() = Some(target.to_string());
                    return Ok(CommandOutput::success(vec![]));
                }
                let known = self
                    .repos
                    .lock()
                    .unwrap()
                    .get(&cwd)
                    .is_some_and(|refs| refs.branches.contains(*target));
                if !known {
                    return Ok(invalid_reference(target));
                }
                *self.checkout.lock().unwrap() = None;
                Ok(CommandOutput::success(vec![]))
            }
            _ => Ok(CommandOutput::success(vec![])),
        }
    }

    fn engine(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let cwd = spec.working_dir.clone().unwrap_or_default();
        if spec.args.iter().any(|a| a == "build") {
            if self.failing_builds.iter().any(|dir| cwd.ends_with(dir)) {
                return Ok(CommandOutput::failure(
                    1,
                    vec![LogLine::stderr("ERROR: failed to solve: process did not complete")],
                ));
            }
            return Ok(CommandOutput::success(vec![
                LogLine::stdout("Step 1/1 : FROM scratch"),
                LogLine::stdout(""),
                LogLine::stdout("Successfully built 0123456789ab"),
            ]));
        }
        if spec.args.iter().any(|a| a == "push") {
            if let Some(reference) = spec.args.last() {
                if self.failing_pushes.contains(reference) {
                    return Ok(CommandOutput::failure(
                        1,
                        vec![LogLine::stderr("denied: requested access to the resource is denied")],
                    ));
                }
            }
        }
        Ok(CommandOutput::success(vec![]))
    }
}

fn invalid_reference(name: &str) -> CommandOutput {
    CommandOutput::failure(
        128,
        vec![LogLine::stderr(format!("fatal: invalid reference: {name}"))],
    )
}

fn unresolvable(url: &str) -> CommandOutput {
    CommandOutput::failure(
        128,
        vec![
            LogLine::stderr(format!("fatal: unable to access '{url}'")),
            LogLine::stderr("Could not resolve host"),
        ],
    )
}

#[async_trait]
impl CommandRunner for FakeToolchain {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        if spec.program == "git" {
            self.git(&spec)
        } else if spec.program.is_empty() {
            Err(Error::ExecutionFailed("empty program".to_string()))
        } else {
            self.engine(&spec)
        }
    }
}

/// Records every message; optionally fails after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, bool)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call returns an error, as if the endpoint were down.
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<(String, bool)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, text: &str, ok: bool) -> std::result::Result<(), NotifyError> {
        self.messages.lock().unwrap().push((text.to_string(), ok));
        if self.fail {
            Err(NotifyError::Request("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Records completion callback URLs.
#[derive(Default)]
pub struct RecordingHook {
    urls: Mutex<Vec<String>>,
}

impl RecordingHook {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionHook for RecordingHook {
    async fn completed(&self, url: &str) -> std::result::Result<(), NotifyError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
