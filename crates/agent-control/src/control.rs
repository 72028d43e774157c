//! Agent process control abstraction.
//!
//! The [`AgentControl`] trait abstracts how the monitored agent is stopped,
//! started and inspected, so the command surface can be tested against a mock
//! while production uses [`ShellAgentControl`](crate::shell::ShellAgentControl).
//!
//! ```text
//! ┌────────────────┐
//! │ command worker │
//! └───────┬────────┘
//!         ▼
//!  ┌──────────────┐
//!  │ AgentControl │ (trait)
//!  └──────────────┘
//!      │       │
//!      ▼       ▼
//!  ┌───────┐ ┌──────┐
//!  │ Shell │ │ Mock │
//!  └───┬───┘ └──────┘
//!      ▼
//!  sh -c / pgrep / pkill
//! ```

use std::fmt;
use std::future::Future;

use crate::error::AgentControlError;

/// Result of a stop or start request.
///
/// Failures are reported through `ok = false` with a human-readable detail
/// rather than an error, because the operator always gets a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlOutcome {
    /// Whether the request achieved its goal.
    pub ok: bool,
    /// What happened, suitable for an operator reply.
    pub detail: String,
}

impl ControlOutcome {
    /// Successful outcome.
    pub fn success(detail: impl Into<String>) -> Self {
        Self {
            ok: true,
            detail: detail.into(),
        }
    }

    /// Failed outcome.
    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Observed agent process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// At least one matching process is running.
    Running,
    /// No matching process.
    Stopped,
    /// The probe itself failed.
    Unknown(String),
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Unknown(reason) => write!(f, "unknown ({reason})"),
        }
    }
}

/// Operations the command surface can perform on the agent.
///
/// The trait is `Send + Sync + 'static` so a single instance can be shared
/// through `Arc` with the tasks that run slow commands off the worker.
pub trait AgentControl: Send + Sync + 'static {
    /// Stops the agent. Implementations may fall back to a harder kill.
    fn stop(&self) -> impl Future<Output = ControlOutcome> + Send;

    /// Starts the agent.
    fn start(&self) -> impl Future<Output = ControlOutcome> + Send;

    /// Reports whether the agent is running.
    fn status(&self) -> impl Future<Output = AgentStatus> + Send;

    /// Returns the last `lines` lines of the agent's log.
    fn tail_logs(
        &self,
        lines: usize,
    ) -> impl Future<Output = Result<String, AgentControlError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(AgentStatus::Running.to_string(), "running");
        assert_eq!(AgentStatus::Stopped.to_string(), "stopped");
        assert_eq!(
            AgentStatus::Unknown("pgrep missing".to_owned()).to_string(),
            "unknown (pgrep missing)"
        );
    }

    #[test]
    fn outcome_constructors() {
        assert!(ControlOutcome::success("done").ok);
        assert!(!ControlOutcome::failure("nope").ok);
    }
}
