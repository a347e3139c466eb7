use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An external tool invocation, kept as an argv list. Nothing here is ever
/// joined into a shell string.
#[derive(Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: &'static str,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    /// The only directory the program is resolved from; also its `PATH`.
    pub search_dir: PathBuf,
    pub timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: &'static str, search_dir: PathBuf) -> Self {
        let path = search_dir.display().to_string();
        Self {
            program,
            args: Vec::new(),
            envs: vec![("PATH".to_string(), path)],
            search_dir,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.envs.push((key.to_string(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full argv, program name first.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program)
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

// Environment values can hold credentials; only the keys are shown.
impl fmt::Debug for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.envs.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("ToolCommand")
            .field("argv", &self.argv())
            .field("env", &keys)
            .field("search_dir", &self.search_dir)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    /// Non-zero exit; `None` when the process was terminated by a signal.
    Failed(Option<i32>),
    TimedOut(Duration),
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolStatus::Success => write!(f, "exited successfully"),
            ToolStatus::Failed(Some(code)) => write!(f, "exited with status {}", code),
            ToolStatus::Failed(None) => write!(f, "terminated by signal"),
            ToolStatus::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs_f64()),
        }
    }
}

/// Runs a [`ToolCommand`] to completion. Swappable so drivers can be exercised
/// without the real binaries.
pub trait CommandRunner: Send {
    fn run(&mut self, command: &ToolCommand) -> Result<ToolStatus>;
}

/// Spawns the real process with a cleared environment and blocks until it exits.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &ToolCommand) -> Result<ToolStatus> {
        let search_dir = &command.search_dir;
        let program = which::which_in(command.program, Some(search_dir), search_dir)
            .with_context(|| {
                format!("'{}' not found in {}", command.program, search_dir.display())
            })?;
        debug!(program = %program.display(), args = ?command.args, "Spawning tool");

        let mut child = Command::new(&program)
            .args(&command.args)
            .env_clear()
            .envs(command.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to spawn '{}'", program.display()))?;

        let status = match command.timeout {
            None => child.wait().context("failed to wait for tool")?,
            Some(limit) => match wait_with_timeout(&mut child, limit)? {
                Some(status) => status,
                None => {
                    warn!(program = command.program, "Tool exceeded its time limit; killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(ToolStatus::TimedOut(limit));
                }
            },
        };

        Ok(if status.success() {
            ToolStatus::Success
        } else {
            ToolStatus::Failed(status.code())
        })
    }
}

fn wait_with_timeout(child: &mut Child, limit: Duration) -> Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait().context("failed to poll tool")? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
