//! Shell-command implementation of [`AgentControl`].
//!
//! - stop: configured stop command, then a `pkill -f` style fallback
//! - start: configured start command
//! - status: `pgrep -f <process_pattern>`
//! - logs: bounded tail of the configured log file
//!
//! Stop and start commands run through `sh -c` under `command_timeout`.
//! A command that exceeds the timeout is killed and reported as a failure;
//! nothing is retried, and a timed-out stop does not fall back to killing.
//! The fallback kill runs only after a non-zero exit or a spawn failure; it
//! resolves PIDs with `pgrep` and excludes the watcher's own PID.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};

use agentwatch_core::config::{AgentConfig, expand_home};
use agentwatch_core::metrics as m;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;
use tracing::{info, warn};

use crate::control::{AgentControl, AgentStatus, ControlOutcome};
use crate::error::AgentControlError;

/// Bytes read from the end of the log file when tailing.
pub const LOG_TAIL_WINDOW: u64 = 256 * 1024;

/// Maximum characters of stderr kept in error details.
const STDERR_PREVIEW_CHARS: usize = 200;

/// Settings for [`ShellAgentControl`].
#[derive(Debug, Clone)]
pub struct ShellControlConfig {
    /// Command that stops the agent gracefully.
    pub stop_command: String,
    /// Command that starts the agent.
    pub start_command: String,
    /// Pattern matched against full command lines (`pgrep -f`).
    pub process_pattern: String,
    /// Agent log file read by `/logs`.
    pub log_file: PathBuf,
    /// Upper bound for each stop/start command.
    pub command_timeout: Duration,
}

impl ShellControlConfig {
    /// Builds the shell settings from the `[agent]` config section.
    pub fn from_core(core: &AgentConfig) -> Self {
        Self {
            stop_command: core.stop_command.clone(),
            start_command: core.start_command.clone(),
            process_pattern: core.process_pattern.clone(),
            log_file: expand_home(&core.log_file),
            command_timeout: Duration::from_secs(core.command_timeout_secs),
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> Result<(), AgentControlError> {
        let required = [
            ("agent.stop_command", &self.stop_command),
            ("agent.start_command", &self.start_command),
            ("agent.process_pattern", &self.process_pattern),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AgentControlError::Config {
                    field: field.to_owned(),
                    reason: "must not be empty".to_owned(),
                });
            }
        }
        if self.command_timeout.is_zero() {
            return Err(AgentControlError::Config {
                field: "agent.command_timeout_secs".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        Ok(())
    }
}

/// Controls the agent through shell commands.
#[derive(Debug, Clone)]
pub struct ShellAgentControl {
    config: ShellControlConfig,
}

impl ShellAgentControl {
    /// Creates a controller after validating the settings.
    pub fn new(config: ShellControlConfig) -> Result<Self, AgentControlError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the active settings.
    pub fn config(&self) -> &ShellControlConfig {
        &self.config
    }

    /// Runs a program under the command timeout. The child is killed if the
    /// timeout fires.
    async fn run(&self, program: &str, args: &[&str], display: &str) -> Result<Output, AgentControlError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AgentControlError::Spawn {
                command: display.to_owned(),
                source,
            })?;

        match tokio::time::timeout(self.config.command_timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(AgentControlError::Spawn {
                command: display.to_owned(),
                source,
            }),
            Err(_elapsed) => Err(AgentControlError::Timeout {
                command: display.to_owned(),
                timeout: self.config.command_timeout,
            }),
        }
    }

    /// Runs a configured command line through `sh -c` and requires exit 0.
    async fn run_shell(&self, command: &str) -> Result<(), AgentControlError> {
        let output = self.run("sh", &["-c", command], command).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(AgentControlError::Failed {
                command: command.to_owned(),
                status: output.status.to_string(),
                stderr: stderr_preview(&output),
            })
        }
    }

    /// PIDs whose command line matches the process pattern, excluding ours.
    async fn matching_pids(&self) -> Result<Vec<u32>, AgentControlError> {
        let pattern = self.config.process_pattern.as_str();
        let display = format!("pgrep -f {pattern}");
        let output = self.run("pgrep", &["-f", pattern], &display).await?;

        match output.status.code() {
            Some(0) | Some(1) => {
                let own = std::process::id();
                Ok(String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .filter_map(|l| l.trim().parse::<u32>().ok())
                    .filter(|pid| *pid != own)
                    .collect())
            }
            _ => Err(AgentControlError::Failed {
                command: display,
                status: output.status.to_string(),
                stderr: stderr_preview(&output),
            }),
        }
    }

    /// Signals every matching process. Returns how many were signalled.
    async fn kill_matching(&self) -> Result<usize, AgentControlError> {
        let pids = self.matching_pids().await?;
        if pids.is_empty() {
            return Ok(0);
        }

        let pid_args: Vec<String> = pids.iter().map(u32::to_string).collect();
        let args: Vec<&str> = pid_args.iter().map(String::as_str).collect();
        let display = format!("kill {}", pid_args.join(" "));
        let output = self.run("kill", &args, &display).await?;
        if output.status.success() {
            Ok(pids.len())
        } else {
            Err(AgentControlError::Failed {
                command: display,
                status: output.status.to_string(),
                stderr: stderr_preview(&output),
            })
        }
    }
}

fn stderr_preview(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .trim()
        .chars()
        .take(STDERR_PREVIEW_CHARS)
        .collect()
}

fn record_duration(action: &'static str, started: Instant) {
    metrics::histogram!(m::AGENT_CONTROL_DURATION_SECONDS, m::LABEL_ACTION => action)
        .record(started.elapsed().as_secs_f64());
}

impl AgentControl for ShellAgentControl {
    async fn stop(&self) -> ControlOutcome {
        let started = Instant::now();
        let outcome = match self.run_shell(&self.config.stop_command).await {
            Ok(()) => {
                info!(command = self.config.stop_command.as_str(), "agent stopped");
                ControlOutcome::success("stop command completed")
            }
            Err(e @ AgentControlError::Timeout { .. }) => {
                warn!(error = %e, "stop command timed out");
                ControlOutcome::failure(e.to_string())
            }
            Err(e) => {
                warn!(error = %e, "stop command failed, falling back to process kill");
                match self.kill_matching().await {
                    Ok(0) => ControlOutcome::failure(format!(
                        "stop command failed ({e}); no process matching '{}' found",
                        self.config.process_pattern
                    )),
                    Ok(n) => {
                        info!(processes = n, "agent killed by fallback");
                        ControlOutcome::success(format!(
                            "stop command failed ({e}); killed {n} process(es) matching '{}'",
                            self.config.process_pattern
                        ))
                    }
                    Err(kill_err) => ControlOutcome::failure(format!(
                        "stop command failed ({e}); fallback kill failed ({kill_err})"
                    )),
                }
            }
        };
        record_duration("stop", started);
        outcome
    }

    async fn start(&self) -> ControlOutcome {
        let started = Instant::now();
        let outcome = match self.run_shell(&self.config.start_command).await {
            Ok(()) => {
                info!(command = self.config.start_command.as_str(), "agent started");
                ControlOutcome::success("start command completed")
            }
            Err(e) => {
                warn!(error = %e, "start command failed");
                ControlOutcome::failure(e.to_string())
            }
        };
        record_duration("start", started);
        outcome
    }

    async fn status(&self) -> AgentStatus {
        match self.matching_pids().await {
            Ok(pids) if pids.is_empty() => AgentStatus::Stopped,
            Ok(_) => AgentStatus::Running,
            Err(e) => AgentStatus::Unknown(e.to_string()),
        }
    }

    async fn tail_logs(&self, lines: usize) -> Result<String, AgentControlError> {
        let path = &self.config.log_file;
        let log_err = |source| AgentControlError::LogRead {
            path: path.display().to_string(),
            source,
        };

        let mut file = tokio::fs::File::open(path).await.map_err(log_err)?;
        let len = file.metadata().await.map_err(log_err)?.len();
        let start = len.saturating_sub(LOG_TAIL_WINDOW);
        file.seek(SeekFrom::Start(start)).await.map_err(log_err)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await.map_err(log_err)?;

        let mut window = buf.as_slice();
        if start > 0 {
            file.seek(SeekFrom::Start(start - 1)).await.map_err(log_err)?;
            let at_boundary = file.read_u8().await.map_err(log_err)? == b'\n';
            if !at_boundary {
                // partial line at the window boundary
                window = match window.iter().position(|&b| b == b'\n') {
                    Some(end) => &window[end + 1..],
                    None => &[],
                };
            }
        }

        let text = String::from_utf8_lossy(window);
        let all: Vec<&str> = text.lines().collect();
        let skip = all.len().saturating_sub(lines);
        Ok(all[skip..].join("\n"))
    }
}
