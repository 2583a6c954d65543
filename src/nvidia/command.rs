//! Invocation of external query tools.
//!
//! The [`CommandRunner`] trait is the only place the exporter spawns
//! processes. It hands back raw stdout and never interprets it.

use crate::error::{ExporterError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

/// Default bound on a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_millis(crate::DEFAULT_TOOL_TIMEOUT_MS);

/// A fully specified tool invocation: program plus ordered arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolQuery {
    pub program: String,
    pub args: Vec<String>,
    /// Non-zero exit codes that still count as success
    pub accepted_exit_codes: Vec<i32>,
}

impl ToolQuery {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            accepted_exit_codes: Vec::new(),
        }
    }

    /// Treat `code` as a successful exit.
    pub fn accept_exit_code(mut self, code: i32) -> Self {
        self.accepted_exit_codes.push(code);
        self
    }

    fn is_accepted(&self, status: std::process::ExitStatus) -> bool {
        status.success()
            || status
                .code()
                .is_some_and(|code| self.accepted_exit_codes.contains(&code))
    }
}

/// Runs a [`ToolQuery`] and returns its raw standard output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, query: &ToolQuery) -> Result<String>;
}

/// Spawns real processes with a bounded wait.
///
/// The child is killed if it outlives the timeout or if the returned future is
/// dropped (for example when the scrape's HTTP client disconnects).
#[derive(Debug, Clone)]
pub struct SystemCommandRunner {
    timeout: Duration,
}

impl SystemCommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, query: &ToolQuery) -> Result<String> {
        debug!(program = %query.program, args = ?query.args, "spawning tool");

        let child = Command::new(&query.program)
            .args(&query.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExporterError::from_spawn_io(query.program.as_str(), e))?;

        let output = match time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ExporterError::ToolTimeout {
                    tool: query.program.clone(),
                    timeout: self.timeout,
                })
            }
        };

        if !query.is_accepted(output.status) {
            return Err(ExporterError::ToolExecution {
                tool: query.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Replays fixed output per query instead of spawning processes.
///
/// Queries without a registered response behave like a missing binary.
#[derive(Debug, Clone, Default)]
pub struct CannedRunner {
    responses: HashMap<ToolQuery, CannedResponse>,
}

#[derive(Debug, Clone)]
enum CannedResponse {
    Output(String),
    ExitCode(i32),
    Timeout,
}

impl CannedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `stdout`.
    pub fn with_output(mut self, query: ToolQuery, stdout: impl Into<String>) -> Self {
        self.responses
            .insert(query, CannedResponse::Output(stdout.into()));
        self
    }

    /// Make `query` exit with `code`.
    pub fn with_exit_code(mut self, query: ToolQuery, code: i32) -> Self {
        self.responses.insert(query, CannedResponse::ExitCode(code));
        self
    }

    /// Make `query` time out.
    pub fn with_timeout(mut self, query: ToolQuery) -> Self {
        self.responses.insert(query, CannedResponse::Timeout);
        self
    }
}

#[async_trait]
impl CommandRunner for CannedRunner {
    async fn run(&self, query: &ToolQuery) -> Result<String> {
        match self.responses.get(query) {
            Some(CannedResponse::Output(stdout)) => Ok(stdout.clone()),
            Some(CannedResponse::ExitCode(code)) => Err(ExporterError::ToolExecution {
                tool: query.program.clone(),
                code: Some(*code),
                stderr: String::new(),
            }),
            Some(CannedResponse::Timeout) => Err(ExporterError::ToolTimeout {
                tool: query.program.clone(),
                timeout: DEFAULT_TOOL_TIMEOUT,
            }),
            None => Err(ExporterError::ToolNotFound {
                tool: query.program.clone(),
            }),
        }
    }
}
