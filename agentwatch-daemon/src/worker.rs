//! The single worker task that owns all watcher state.
//!
//! File events, operator commands, the digest timer and the read backlog are
//! multiplexed with `tokio::select!` so cursors, known senders, the mute
//! window, the recent ring and the digest queue are only ever touched here.
//! Agent-control commands run in spawned tasks holding `Arc` handles, so a
//! slow `/kill` never stalls tailing.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use agentwatch_agent_control::AgentControl;
use agentwatch_core::event::AlertEvent;
use agentwatch_core::metrics as m;
use agentwatch_core::transport::{InboundCommand, MessageFormat, MessageSink};
use agentwatch_core::types::AlertLevel;
use agentwatch_tail::{FileEvent, MuteGate, TailEngine};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{self, Command, RECENT_SHOWN, Rejection};
use crate::format::{self, ControlAction, StatusReport};

const KNOWN_COMMANDS: [&str; 9] = [
    "status",
    "kill",
    "start_agent",
    "mute",
    "unmute",
    "recent",
    "logs",
    "help",
    "start",
];

/// Watcher state plus the handles it needs to talk to the outside.
pub struct Worker<S, A> {
    engine: TailEngine,
    mute: MuteGate,
    sink: Arc<S>,
    agent: Arc<A>,
    operator_chat: String,
    digest_interval: Duration,
    backlog: VecDeque<PathBuf>,
}

impl<S: MessageSink, A: AgentControl> Worker<S, A> {
    pub fn new(
        engine: TailEngine,
        sink: Arc<S>,
        agent: Arc<A>,
        operator_chat: impl Into<String>,
        digest_interval: Duration,
    ) -> Self {
        Self {
            engine,
            mute: MuteGate::new(),
            sink,
            agent,
            operator_chat: operator_chat.into(),
            digest_interval,
            backlog: VecDeque::new(),
        }
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Commands are served before file events. Paths that hit the per-event
    /// read cap are revisited only when no other event is ready.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<FileEvent>,
        mut commands: mpsc::Receiver<InboundCommand>,
        shutdown: CancellationToken,
    ) {
        let digest_enabled = self.engine.policy().level() == AlertLevel::Digest;
        let mut digest_tick = tokio::time::interval_at(
            tokio::time::Instant::now() + self.digest_interval,
            self.digest_interval,
        );
        digest_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            level = %self.engine.policy().level(),
            tracked_files = self.engine.cursors().len(),
            "worker started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(cmd) = commands.recv() => self.handle_command(cmd).await,
                Some(event) = events.recv() => self.handle_file_event(event).await,
                _ = digest_tick.tick(), if digest_enabled => self.flush_digest().await,
                _ = std::future::ready(()), if !self.backlog.is_empty() => {
                    if let Some(path) = self.backlog.pop_front() {
                        self.handle_file_event(FileEvent::Modified(path)).await;
                    }
                }
            }
        }

        info!("worker stopped");
    }

    /// Tails one file event and delivers the resulting alerts in line order.
    pub async fn handle_file_event(&mut self, event: FileEvent) {
        let batch = match self.engine.handle_event(&event) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(path = %event.path().display(), error = %e, "transcript read failed, cursor unchanged");
                return;
            }
        };

        if batch.parse_errors > 0 {
            debug!(path = %event.path().display(), errors = batch.parse_errors, "skipped malformed lines");
        }

        for alert in &batch.alerts {
            self.deliver(alert).await;
        }

        if batch.more_pending {
            let path = event.path().to_path_buf();
            if !self.backlog.contains(&path) {
                self.backlog.push_back(path);
            }
        }
    }

    async fn deliver(&mut self, alert: &AlertEvent) {
        let text = format::alert_message(alert);
        let outcome = self
            .mute
            .emit(&*self.sink, &self.operator_chat, &text, MessageFormat::Html)
            .await;
        if outcome.is_delivered() {
            debug!(alert = %alert, "alert delivered");
        }
    }

    /// Sends the queued digest entries as one message. Empty queues send nothing.
    pub async fn flush_digest(&mut self) {
        let entries = self.engine.policy_mut().drain_digest();
        let Some(text) = format::digest_message(&entries) else {
            return;
        };
        info!(entries = entries.len(), "flushing digest");
        self.mute
            .emit(&*self.sink, &self.operator_chat, &text, MessageFormat::Html)
            .await;
    }

    /// Authorizes and executes one operator command.
    pub async fn handle_command(&mut self, cmd: InboundCommand) {
        let command = match commands::authorize(&cmd, &self.operator_chat) {
            Ok(command) => command,
            Err(rejection) => {
                if rejection == Rejection::Unauthorized {
                    warn!(caller = cmd.caller.as_str(), command = %cmd, "unauthorized command rejected");
                }
                metrics::counter!(
                    m::COMMANDS_TOTAL,
                    m::LABEL_COMMAND => command_label(&cmd.name),
                    m::LABEL_RESULT => rejection.label()
                )
                .increment(1);
                send_reply(&*self.sink, &cmd.chat, &rejection.reply(), MessageFormat::Plain).await;
                return;
            }
        };

        info!(command = command.name(), "operator command");
        metrics::counter!(
            m::COMMANDS_TOTAL,
            m::LABEL_COMMAND => command.name(),
            m::LABEL_RESULT => "accepted"
        )
        .increment(1);

        let chat = cmd.chat;
        match command {
            Command::Status => {
                let muted_until = if self.mute.is_muted() {
                    self.mute.muted_until()
                } else {
                    None
                };
                let policy = self.engine.policy();
                let known_senders = policy.known_sender_count();
                let alert_level = policy.level();
                let digest_queue = policy.digest_len();
                let tracked_files = self.engine.cursors().len();
                let agent = Arc::clone(&self.agent);
                self.spawn_reply(chat, async move {
                    let report = StatusReport {
                        agent: agent.status().await,
                        muted_until,
                        known_senders,
                        alert_level,
                        tracked_files,
                        digest_queue,
                    };
                    (format::status_message(&report), MessageFormat::Html)
                });
            }
            Command::Kill => {
                let agent = Arc::clone(&self.agent);
                self.spawn_reply(chat, async move {
                    let outcome = agent.stop().await;
                    (format::control_message(ControlAction::Stop, &outcome), MessageFormat::Html)
                });
            }
            Command::StartAgent => {
                let agent = Arc::clone(&self.agent);
                self.spawn_reply(chat, async move {
                    let outcome = agent.start().await;
                    (format::control_message(ControlAction::Start, &outcome), MessageFormat::Html)
                });
            }
            Command::Logs { lines } => {
                let agent = Arc::clone(&self.agent);
                self.spawn_reply(chat, async move {
                    match agent.tail_logs(lines).await {
                        Ok(text) => (format::logs_message(lines, &text), MessageFormat::Html),
                        Err(e) => (format!("Failed to read agent log: {e}"), MessageFormat::Plain),
                    }
                });
            }
            Command::Mute { minutes } => {
                let until = self
                    .mute
                    .set_mute(Duration::from_secs(minutes.saturating_mul(60)));
                let text = format!(
                    "Alerts muted for {minutes} minutes (until {})",
                    until.format("%Y-%m-%d %H:%M:%S UTC")
                );
                send_reply(&*self.sink, &chat, &text, MessageFormat::Plain).await;
            }
            Command::Unmute => {
                self.mute.clear_mute();
                send_reply(&*self.sink, &chat, "Alerts unmuted", MessageFormat::Plain).await;
            }
            Command::Recent => {
                let records = self.engine.policy().recent_last(RECENT_SHOWN);
                let text = format::recent_message(&records);
                send_reply(&*self.sink, &chat, &text, MessageFormat::Html).await;
            }
            Command::Help => {
                send_reply(&*self.sink, &chat, format::HELP_MESSAGE, MessageFormat::Html).await;
            }
        }
    }

    /// Runs `reply` off the worker and sends its text to `chat`.
    fn spawn_reply<F>(&self, chat: String, reply: F)
    where
        F: Future<Output = (String, MessageFormat)> + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let (text, kind) = reply.await;
            send_reply(&*sink, &chat, &text, kind).await;
        });
    }

    pub fn engine(&self) -> &TailEngine {
        &self.engine
    }

    pub fn mute_gate(&mut self) -> &mut MuteGate {
        &mut self.mute
    }

    /// Paths waiting for another read after hitting the read cap.
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}

async fn send_reply<S: MessageSink>(sink: &S, chat: &str, text: &str, format: MessageFormat) {
    if let Err(e) = sink.send(chat, text, format).await {
        warn!(error = %e, "failed to send command reply");
    }
}

fn command_label(name: &str) -> &'static str {
    KNOWN_COMMANDS
        .iter()
        .find(|known| **known == name)
        .copied()
        .unwrap_or("other")
}
