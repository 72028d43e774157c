//! Operator command authorization and parsing.
//!
//! Authorization comes first: a caller other than the configured chat gets
//! `Unauthorized` for every command name, known or not, and nothing else
//! happens.

use agentwatch_core::transport::InboundCommand;

/// Mute length when `/mute` has no argument.
pub const DEFAULT_MUTE_MINUTES: u64 = 30;

/// Lines returned by `/logs` without an argument.
pub const DEFAULT_LOG_LINES: usize = 20;

/// Upper bound for `/logs`.
pub const MAX_LOG_LINES: usize = 200;

/// Ring entries shown by `/recent`.
pub const RECENT_SHOWN: usize = 5;

pub const UNAUTHORIZED_REPLY: &str = "Unauthorized";
pub const MUTE_USAGE_REPLY: &str = "Invalid minutes. Usage: /mute [minutes]";
pub const LOGS_USAGE_REPLY: &str = "Invalid line count. Usage: /logs [lines]";

/// An authorized, parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Status,
    Kill,
    StartAgent,
    Mute { minutes: u64 },
    Unmute,
    Recent,
    Logs { lines: usize },
    Help,
}

impl Command {
    /// Metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Kill => "kill",
            Self::StartAgent => "start_agent",
            Self::Mute { .. } => "mute",
            Self::Unmute => "unmute",
            Self::Recent => "recent",
            Self::Logs { .. } => "logs",
            Self::Help => "help",
        }
    }
}

/// Why a command was not executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Unauthorized,
    Unknown(String),
    InvalidArgument(&'static str),
}

impl Rejection {
    /// Reply sent to the caller.
    pub fn reply(&self) -> String {
        match self {
            Self::Unauthorized => UNAUTHORIZED_REPLY.to_owned(),
            Self::Unknown(name) => format!("Unknown command /{name}. Send /help for the list."),
            Self::InvalidArgument(usage) => (*usage).to_owned(),
        }
    }

    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Unknown(_) => "unknown",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Checks the caller against `operator` and parses the command.
pub fn authorize(cmd: &InboundCommand, operator: &str) -> Result<Command, Rejection> {
    if cmd.caller.trim() != operator.trim() {
        return Err(Rejection::Unauthorized);
    }

    let first = cmd.args.first().map(String::as_str);
    match cmd.name.as_str() {
        "status" => Ok(Command::Status),
        "kill" => Ok(Command::Kill),
        "start_agent" => Ok(Command::StartAgent),
        "mute" => match first {
            None => Ok(Command::Mute {
                minutes: DEFAULT_MUTE_MINUTES,
            }),
            Some(arg) => match arg.parse::<u64>() {
                Ok(minutes) if minutes > 0 => Ok(Command::Mute { minutes }),
                _ => Err(Rejection::InvalidArgument(MUTE_USAGE_REPLY)),
            },
        },
        "unmute" => Ok(Command::Unmute),
        "recent" => Ok(Command::Recent),
        "logs" => match first {
            None => Ok(Command::Logs {
                lines: DEFAULT_LOG_LINES,
            }),
            Some(arg) => match arg.parse::<usize>() {
                Ok(lines) if lines > 0 => Ok(Command::Logs {
                    lines: lines.min(MAX_LOG_LINES),
                }),
                _ => Err(Rejection::InvalidArgument(LOGS_USAGE_REPLY)),
            },
        },
        // Telegram clients send /start when a chat with the bot is opened
        "help" | "start" => Ok(Command::Help),
        other => Err(Rejection::Unknown(other.to_owned())),
    }
}
