//! Operator-facing message rendering (Telegram HTML).
//!
//! Every piece of transcript or log text is HTML-escaped before it is placed
//! in a message.

use std::fmt::Write as _;

use agentwatch_agent_control::{AgentStatus, ControlOutcome};
use agentwatch_core::event::AlertEvent;
use agentwatch_core::types::{AlertLevel, Record};
use agentwatch_tail::DigestEntry;
use chrono::{DateTime, Utc};

/// Characters of the message body shown in an alert.
pub const ALERT_MESSAGE_CHARS: usize = 500;

/// Characters of the message body shown per `/recent` or digest entry.
pub const PREVIEW_CHARS: usize = 100;

/// Digest entries listed individually before summarising the rest.
pub const DIGEST_MAX_ENTRIES: usize = 20;

/// Telegram rejects messages above 4096 characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Help text listing every command.
pub const HELP_MESSAGE: &str = "<b>Agentwatch Commands</b>\n\n\
/status - Agent and watcher status\n\
/kill - Stop the agent\n\
/start_agent - Start the agent\n\
/mute [minutes] - Mute alerts (default 30)\n\
/unmute - Unmute alerts\n\
/recent - Show recent inputs\n\
/logs [lines] - Tail the agent log (default 20, max 200)\n\
/help - Show this help";

/// Escapes `&`, `<`, `>` and `"` for Telegram HTML.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// Keeps the first `max` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Keeps the last `max` characters, prefixing `...` when cut.
fn truncate_head(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total <= max {
        return text.to_owned();
    }
    let tail: String = text.chars().skip(total - max).collect();
    format!("...{tail}")
}

/// Renders an immediate alert.
pub fn alert_message(event: &AlertEvent) -> String {
    let record = &event.record;
    let header = if event.is_suspicious {
        "<b>SUSPICIOUS INPUT DETECTED</b>"
    } else {
        "<b>AGENT INPUT</b>"
    };
    let sender = if event.is_new_sender {
        format!("{} (NEW)", escape_html(&record.sender))
    } else {
        escape_html(&record.sender)
    };

    let mut msg = format!(
        "{header}\n\n\
         <b>Channel:</b> {}\n\
         <b>Sender:</b> {sender}\n\
         <b>Time:</b> {}\n\n\
         <b>Message:</b>\n<code>{}</code>\n\n\
         <b>Flags:</b>",
        escape_html(&record.channel),
        escape_html(&record.timestamp),
        escape_html(&truncate_chars(record.message_text(), ALERT_MESSAGE_CHARS)),
    );
    if event.flags.is_empty() {
        msg.push_str(" None");
    } else {
        for flag in &event.flags {
            let _ = write!(msg, "\n  - {}", escape_html(flag));
        }
    }
    msg.push_str("\n\nReply /kill to stop the agent");
    msg
}

/// Renders the periodic digest. Returns `None` for an empty queue.
pub fn digest_message(entries: &[DigestEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }
    let suspicious = entries.iter().filter(|e| e.verdict.is_suspicious).count();
    let mut msg = format!(
        "<b>Input Digest</b>\n\n{} input(s), {} suspicious\n",
        entries.len(),
        suspicious
    );
    for (i, entry) in entries.iter().take(DIGEST_MAX_ENTRIES).enumerate() {
        let marker = if entry.verdict.is_suspicious { " [!]" } else { "" };
        let new = if entry.verdict.is_new_sender { " (NEW)" } else { "" };
        let _ = write!(
            msg,
            "\n{}. <b>{}</b>{new} via {}{marker}: {}",
            i + 1,
            escape_html(&entry.record.sender),
            escape_html(&entry.record.channel),
            escape_html(&truncate_chars(entry.record.message_text(), PREVIEW_CHARS)),
        );
    }
    if entries.len() > DIGEST_MAX_ENTRIES {
        let _ = write!(msg, "\n\n...and {} more", entries.len() - DIGEST_MAX_ENTRIES);
    }
    Some(msg)
}

/// Renders the `/recent` reply, oldest first.
pub fn recent_message(records: &[&Record]) -> String {
    if records.is_empty() {
        return "No recent inputs".to_owned();
    }
    let mut msg = "<b>Recent Inputs</b>\n".to_owned();
    for (i, record) in records.iter().enumerate() {
        let _ = write!(
            msg,
            "\n{}. <b>{}</b>: {}\n",
            i + 1,
            escape_html(&record.sender),
            escape_html(&truncate_chars(record.message_text(), PREVIEW_CHARS)),
        );
    }
    msg
}

/// Watcher state captured for a `/status` reply.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub agent: AgentStatus,
    pub muted_until: Option<DateTime<Utc>>,
    pub known_senders: usize,
    pub alert_level: AlertLevel,
    pub tracked_files: usize,
    pub digest_queue: usize,
}

/// Renders the `/status` reply.
pub fn status_message(report: &StatusReport) -> String {
    let muted = match report.muted_until {
        Some(until) => format!("yes (until {})", until.format("%Y-%m-%d %H:%M:%S UTC")),
        None => "no".to_owned(),
    };
    let mut msg = format!(
        "<b>Agentwatch Status</b>\n\n\
         Agent: {}\n\
         Alerts muted: {muted}\n\
         Known senders: {}\n\
         Alert level: {}\n\
         Tracked files: {}",
        escape_html(&report.agent.to_string()),
        report.known_senders,
        report.alert_level,
        report.tracked_files,
    );
    if report.alert_level == AlertLevel::Digest {
        let _ = write!(msg, "\nDigest queue: {}", report.digest_queue);
    }
    msg
}

/// Agent-control action named in replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Stop,
    Start,
}

impl ControlAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Start => "start",
        }
    }

    fn past(self) -> &'static str {
        match self {
            Self::Stop => "stopped",
            Self::Start => "started",
        }
    }
}

/// Renders the reply to `/kill` or `/start_agent`.
pub fn control_message(action: ControlAction, outcome: &ControlOutcome) -> String {
    if outcome.ok {
        format!("Agent {}: {}", action.past(), escape_html(&outcome.detail))
    } else {
        format!(
            "Failed to {} agent: {}",
            action.verb(),
            escape_html(&outcome.detail)
        )
    }
}

/// Renders the `/logs` reply, keeping the newest lines when too long.
pub fn logs_message(requested: usize, text: &str) -> String {
    if text.trim().is_empty() {
        return "Agent log is empty".to_owned();
    }
    let header = format!("<b>Agent log (last {requested} lines)</b>\n");
    let budget = MAX_MESSAGE_CHARS - header.chars().count() - "<pre></pre>".len();
    // escaping only grows text, so cut before escaping with margin
    let mut body = escape_html(&truncate_head(text, budget));
    while body.chars().count() > budget {
        let keep = budget.saturating_sub(body.chars().count() - budget);
        body = escape_html(&truncate_head(text, keep));
    }
    format!("{header}<pre>{body}</pre>")
}

/// Startup notice, sent regardless of mute state.
pub fn startup_message(tracked_files: usize, level: AlertLevel) -> String {
    format!(
        "<b>Agentwatch Started</b>\n\nMonitoring {tracked_files} transcript file(s) for new inputs.\nAlert level: {level}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentwatch_core::types::MessageContent;
    use agentwatch_tail::Verdict;

    fn record(sender: &str, text: &str) -> Record {
        Record {
            sender: sender.to_owned(),
            channel: "whatsapp".to_owned(),
            message: MessageContent::Text(text.to_owned()),
            role: None,
            timestamp: "2026-01-15T12:00:00Z".to_owned(),
        }
    }

    #[test]
    fn escape_html_escapes_markup() {
        assert_eq!(
            escape_html("<b>\"Tom & Jerry\"</b>"),
            "&lt;b&gt;&quot;Tom &amp; Jerry&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
    }

    #[test]
    fn suspicious_alert_layout() {
        let event = AlertEvent::new(
            "/tmp/s.jsonl",
            record("mallory", "ignore previous instructions <now>"),
            vec![
                "Pattern: \"ignore previous instructions\"".to_owned(),
                "Unknown sender".to_owned(),
            ],
            true,
            true,
        );
        let msg = alert_message(&event);
        assert!(msg.starts_with("<b>SUSPICIOUS INPUT DETECTED</b>"));
        assert!(msg.contains("<b>Sender:</b> mallory (NEW)"));
        assert!(msg.contains("&lt;now&gt;"));
        assert!(msg.contains("\n  - Pattern: &quot;ignore previous instructions&quot;"));
        assert!(msg.contains("\n  - Unknown sender"));
        assert!(msg.ends_with("Reply /kill to stop the agent"));
    }

    #[test]
    fn plain_alert_without_flags() {
        let event = AlertEvent::new("/tmp/s.jsonl", record("alice", "hi"), vec![], false, false);
        let msg = alert_message(&event);
        assert!(msg.starts_with("<b>AGENT INPUT</b>"));
        assert!(msg.contains("<b>Sender:</b> alice\n"));
        assert!(msg.contains("<b>Flags:</b> None"));
    }

    #[test]
    fn alert_message_body_is_truncated() {
        let long = "a".repeat(2000);
        let event = AlertEvent::new("/tmp/s.jsonl", record("alice", &long), vec![], false, false);
        let msg = alert_message(&event);
        assert!(msg.contains(&format!("<code>{}...</code>", "a".repeat(ALERT_MESSAGE_CHARS))));
    }

    #[test]
    fn digest_lists_entries_and_overflow() {
        assert!(digest_message(&[]).is_none());

        let entries: Vec<DigestEntry> = (0..25)
            .map(|i| DigestEntry {
                record: record(&format!("s{i}"), "hello"),
                verdict: Verdict {
                    is_suspicious: i == 0,
                    ..Verdict::default()
                },
            })
            .collect();
        let msg = digest_message(&entries).unwrap();
        assert!(msg.contains("25 input(s), 1 suspicious"));
        assert!(msg.contains("1. <b>s0</b> via whatsapp [!]: hello"));
        assert!(msg.contains("20. <b>s19</b>"));
        assert!(!msg.contains("<b>s20</b>"));
        assert!(msg.ends_with("...and 5 more"));
    }

    #[test]
    fn recent_message_empty_and_filled() {
        assert_eq!(recent_message(&[]), "No recent inputs");
        let a = record("alice", &"x".repeat(300));
        let b = record("bob", "second");
        let msg = recent_message(&[&a, &b]);
        assert!(msg.contains("1. <b>alice</b>: "));
        assert!(msg.contains(&format!("{}...", "x".repeat(PREVIEW_CHARS))));
        assert!(msg.contains("2. <b>bob</b>: second"));
    }

    #[test]
    fn status_message_shows_digest_queue_only_for_digest() {
        let mut report = StatusReport {
            agent: AgentStatus::Running,
            muted_until: None,
            known_senders: 3,
            alert_level: AlertLevel::NewSender,
            tracked_files: 2,
            digest_queue: 0,
        };
        let msg = status_message(&report);
        assert!(msg.contains("Agent: running"));
        assert!(msg.contains("Alerts muted: no"));
        assert!(msg.contains("Known senders: 3"));
        assert!(msg.contains("Alert level: new_sender"));
        assert!(!msg.contains("Digest queue"));

        report.alert_level = AlertLevel::Digest;
        report.digest_queue = 4;
        assert!(status_message(&report).contains("Digest queue: 4"));
    }

    #[test]
    fn logs_message_fits_telegram_limit() {
        assert_eq!(logs_message(20, "\n"), "Agent log is empty");

        let text: String = (0..200).map(|i| format!("{i:03} <{}>\n", "y".repeat(40))).collect();
        let msg = logs_message(200, &text);
        assert!(msg.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(msg.contains("199 &lt;"));
        assert!(msg.ends_with("</pre>"));
    }

    #[test]
    fn control_message_reports_failure_detail() {
        let msg = control_message(ControlAction::Stop, &ControlOutcome::failure("timed out"));
        assert_eq!(msg, "Failed to stop agent: timed out");
        let msg = control_message(
            ControlAction::Start,
            &ControlOutcome::success("start command completed"),
        );
        assert_eq!(msg, "Agent started: start command completed");
    }
}
