//! GNU screen terminal sessions.

use crate::error::Result;
use crate::metrics::{Collector, Labels, Metric};
use crate::nvidia::{CommandRunner, ToolQuery};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use std::ffi::OsString;
use std::sync::Arc;
use sysinfo::{Pid, System};

/// Default name of the screen binary, resolved through `PATH`.
pub const DEFAULT_SCREEN: &str = "screen";

/// Timestamp layouts printed by different screen builds.
const SESSION_TIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// One detached or attached screen session.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSession {
    pub pid: u32,
    pub name: String,
    pub status: String,
    /// Unix seconds the session was opened, when screen printed a parsable time
    pub opened_at: Option<i64>,
}

/// `screen -ls`; exit code 1 is normal whenever no session is attached.
pub fn list_query(binary: &str) -> ToolQuery {
    ToolQuery::new(binary, ["-ls"]).accept_exit_code(1)
}

fn parse_opened_at(raw: &str) -> Option<i64> {
    SESSION_TIME_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(raw, format).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|time| time.timestamp())
    })
}

/// Parse `screen -ls` output. Lines that are not session entries are ignored.
pub fn parse_screen_list(output: &str) -> Vec<ScreenSession> {
    output
        .lines()
        .filter(|line| line.starts_with('\t') || line.starts_with(' '))
        .filter_map(|line| {
            let mut parts = line.split('\t').map(str::trim).filter(|p| !p.is_empty());
            let (pid, name) = parts.next()?.split_once('.')?;
            let pid = pid.parse::<u32>().ok()?;

            let bracketed: Vec<&str> = parts
                .map(|p| p.trim_start_matches('(').trim_end_matches(')'))
                .collect();
            let status = bracketed.last().copied().unwrap_or_default();
            let opened_at = if bracketed.len() >= 2 {
                parse_opened_at(bracketed[0])
            } else {
                None
            };

            Some(ScreenSession {
                pid,
                name: name.to_string(),
                status: status.to_string(),
                opened_at,
            })
        })
        .collect()
}

/// Command line of the program running inside a session: the newest child of
/// the session's shell, or `None` when the shell is idle.
pub fn foreground_command(system: &System, session_pid: u32) -> Option<String> {
    let session = Pid::from_u32(session_pid);
    let shell = system
        .processes()
        .values()
        .find(|p| p.parent() == Some(session))?
        .pid();
    let program = system
        .processes()
        .values()
        .filter(|p| p.parent() == Some(shell))
        .max_by_key(|p| p.start_time())?;
    Some(command_line(program.cmd()))
}

/// Join argv into one label value; non UTF-8 bytes are replaced.
pub fn command_line(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `screen_count` and one `screen_info` per session.
pub struct SessionCollector {
    binary: String,
    runner: Arc<dyn CommandRunner>,
    resolve_commands: bool,
}

impl SessionCollector {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
            resolve_commands: true,
        }
    }

    /// Whether to look up each session's foreground command in the process table.
    pub fn with_command_lookup(mut self, enabled: bool) -> Self {
        self.resolve_commands = enabled;
        self
    }
}

#[async_trait]
impl Collector for SessionCollector {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn collect(&self) -> Result<Vec<Metric>> {
        let output = self.runner.run(&list_query(&self.binary)).await?;
        let sessions = parse_screen_list(&output);

        let system = (self.resolve_commands && !sessions.is_empty()).then(System::new_all);
        let commands: Vec<String> = sessions
            .iter()
            .map(|s| {
                system
                    .as_ref()
                    .and_then(|sys| foreground_command(sys, s.pid))
                    .unwrap_or_default()
            })
            .collect();

        Ok(session_metrics(&sessions, &commands))
    }
}

/// Metrics for `sessions`; `commands` is index-aligned with `sessions`.
pub fn session_metrics(sessions: &[ScreenSession], commands: &[String]) -> Vec<Metric> {
    let mut metrics = vec![Metric::new("screen_count", sessions.len())];

    for (session, command) in sessions.iter().zip(commands) {
        metrics.push(Metric::info(
            "screen_info",
            Labels::new()
                .with("pid", session.pid.to_string())
                .with("open_time", session.opened_at.map(|t| t.to_string()).unwrap_or_default())
                .with("status", session.status.as_str())
                .with("name", session.name.as_str())
                .with("command", command.as_str()),
        ));
    }

    metrics
}
