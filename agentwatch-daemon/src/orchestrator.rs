//! Daemon assembly, channel wiring and lifecycle management.
//!
//! The [`Orchestrator`] loads configuration, builds the tail engine, the
//! Telegram transport and the agent controller, wires them to the worker and
//! runs until a shutdown signal arrives.
//!
//! # Startup order
//!
//! 1. Scan existing transcripts (cursor per `watch.existing_files`)
//! 2. Start the file-system watcher (producer of `FileEvent`s)
//! 3. Send the startup notice
//! 4. Start the command poller (producer of `InboundCommand`s)
//! 5. Start the worker (single consumer)
//!
//! # Shutdown
//!
//! SIGTERM or SIGINT cancels a shared `CancellationToken`; the poller and the
//! worker exit their loops and the watcher is dropped.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agentwatch_agent_control::{ShellAgentControl, ShellControlConfig};
use agentwatch_core::config::AgentwatchConfig;
use agentwatch_core::metrics as m;
use agentwatch_core::transport::{MessageFormat, MessageSink};
use agentwatch_tail::{FsWatcher, TailConfig, TailEngine};

use crate::format;
use crate::metrics_server;
use crate::telegram::{self, TelegramClient};
use crate::worker::Worker;

/// Inbound command channel capacity.
const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Interval for refreshing the uptime gauge.
const UPTIME_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: AgentwatchConfig,
    /// Tail engine settings derived from `config`.
    tail_config: TailConfig,
    /// Cancelled on shutdown; observed by every background task.
    shutdown: CancellationToken,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read, parsed or
    /// validated.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = AgentwatchConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    ///
    /// Validates the configuration and the derived tail settings, including
    /// compiling every suspicious pattern, so bad input fails before anything
    /// is started.
    pub fn build_from_config(config: AgentwatchConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let tail_config = TailConfig::from_core(&config);
        tail_config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid watch configuration: {}", e))?;
        agentwatch_tail::PatternClassifier::new(&tail_config.suspicious_patterns)
            .map_err(|e| anyhow::anyhow!("invalid suspicious pattern: {}", e))?;
        ShellControlConfig::from_core(&config.agent)
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid agent configuration: {}", e))?;

        Ok(Self {
            config,
            tail_config,
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        })
    }

    /// Token cancelled when the daemon shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &AgentwatchConfig {
        &self.config
    }

    /// Start every component and block until a shutdown signal.
    pub async fn run(&mut self) -> Result<()> {
        if self.config.metrics.enabled {
            metrics_server::install_metrics_recorder(&self.config.metrics)?;
            record_build_info();
        }

        let client = Arc::new(
            TelegramClient::new(&self.config.telegram)
                .map_err(|e| anyhow::anyhow!("failed to build Telegram client: {}", e))?,
        );
        let agent = Arc::new(
            ShellAgentControl::new(ShellControlConfig::from_core(&self.config.agent))
                .map_err(|e| anyhow::anyhow!("failed to build agent control: {}", e))?,
        );

        let mut engine = TailEngine::new(self.tail_config.clone())
            .map_err(|e| anyhow::anyhow!("failed to build tail engine: {}", e))?;
        let tracked = engine.scan_existing();

        let (event_tx, event_rx) = mpsc::channel(self.tail_config.event_channel_capacity);
        let watcher = FsWatcher::start(engine.patterns(), event_tx)
            .map_err(|e| anyhow::anyhow!("failed to start file watcher: {}", e))?;
        for root in watcher.roots() {
            tracing::info!(root = %root.display(), "watching directory");
        }

        let chat = self.config.telegram.chat_id.trim().to_owned();
        let notice = format::startup_message(tracked, engine.policy().level());
        if let Err(e) = client.send(&chat, &notice, MessageFormat::Html).await {
            tracing::error!(error = %e, "failed to send startup message");
        }

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let poller = tokio::spawn(telegram::poll_commands(
            Arc::clone(&client),
            command_tx,
            self.shutdown.clone(),
        ));

        let digest_interval =
            Duration::from_secs(self.config.watch.digest_interval_minutes.saturating_mul(60));
        let worker = Worker::new(engine, client, agent, chat, digest_interval);
        let worker_task = tokio::spawn(worker.run(event_rx, command_rx, self.shutdown.clone()));

        let uptime_task = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown.clone()));

        tracing::info!("agentwatch running");
        let signal = tokio::select! {
            signal = wait_for_shutdown_signal() => signal?,
            _ = self.shutdown.cancelled() => "cancelled",
        };
        tracing::info!(signal = signal, "shutdown signal received");

        self.shutdown.cancel();
        drop(watcher);

        if let Err(e) = worker_task.await {
            tracing::error!(error = %e, "worker task failed");
        }
        if let Err(e) = poller.await {
            tracing::error!(error = %e, "command poller failed");
        }
        if let Some(task) = uptime_task {
            let _ = task.await;
        }

        tracing::info!("agentwatch shut down");
        Ok(())
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
///
/// Returns the name of the signal that triggered the shutdown.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Build info gauge (always 1, with version label).
fn record_build_info() {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Periodically refreshes the uptime gauge until `shutdown` is cancelled.
fn spawn_uptime_updater(
    start_time: Instant,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPTIME_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    #[allow(clippy::cast_precision_loss)]
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown.cancelled() => {
                    tracing::debug!("uptime updater shutting down");
                    break;
                }
            }
        }
    })
}
