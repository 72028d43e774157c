//! Telegram Bot API transport.
//!
//! [`TelegramClient`] implements [`MessageSink`] with `sendMessage` and
//! receives operator commands by long-polling `getUpdates`. Updates that were
//! queued while the daemon was down are dropped at startup so a stale `/kill`
//! is never replayed.

use std::sync::Arc;
use std::time::Duration;

use agentwatch_core::config::TelegramConfig;
use agentwatch_core::error::TransportError;
use agentwatch_core::transport::{InboundCommand, MessageFormat, MessageSink};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extra slack on top of the long-poll timeout for the HTTP request timeout.
const HTTP_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Delay before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Bot API envelope: `{"ok": true, "result": ...}` or
/// `{"ok": false, "error_code": 401, "description": "..."}`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<u16>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, http_status: u16) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(TransportError::MalformedResponse(
                "ok response without result".to_owned(),
            )),
            (false, _) => Err(TransportError::Api {
                status: self.error_code.unwrap_or(http_status),
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_owned()),
            }),
        }
    }
}

/// One entry from `getUpdates`.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Converts a text message starting with `/` into a command.
    ///
    /// The chat id is the caller identity checked against
    /// `telegram.chat_id`.
    pub fn into_command(self) -> Option<InboundCommand> {
        let message = self.message?;
        let text = message.text?;
        let chat = message.chat.id.to_string();
        InboundCommand::from_text(chat.clone(), chat, &text)
    }
}

/// Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    /// Builds a client for the configured bot.
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + HTTP_TIMEOUT_SLACK)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token.trim()
            ),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, TransportError> {
        // reqwest errors can include the URL, which carries the bot token
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TransportError::MalformedResponse(e.without_url().to_string()))?;
        envelope.into_result(status)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    /// Skips every pending update. Returns the offset to poll from next.
    pub async fn drop_pending_updates(&self) -> Result<Option<i64>, TransportError> {
        let last = self.get_updates(Some(-1), 0).await?;
        Ok(last.last().map(|u| u.update_id + 1))
    }
}

impl MessageSink for TelegramClient {
    async fn send(&self, chat: &str, text: &str, format: MessageFormat) -> Result<(), TransportError> {
        let mut body = json!({
            "chat_id": chat,
            "text": text,
            "disable_web_page_preview": true,
        });
        if format == MessageFormat::Html {
            body["parse_mode"] = json!("HTML");
        }
        self.call::<serde_json::Value>("sendMessage", &body)
            .await
            .map(|_| ())
    }
}

/// Polls for operator commands until `shutdown` is cancelled.
///
/// Commands are forwarded to the worker in arrival order. Poll failures are
/// logged and retried after a short delay.
pub async fn poll_commands(
    client: Arc<TelegramClient>,
    tx: mpsc::Sender<InboundCommand>,
    shutdown: CancellationToken,
) {
    let mut offset = match client.drop_pending_updates().await {
        Ok(offset) => offset,
        Err(e) => {
            warn!(error = %e, "failed to drop pending updates");
            None
        }
    };
    info!("command polling started");

    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = client.get_updates(offset, client.poll_timeout_secs) => result,
        };

        match result {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    let Some(command) = update.into_command() else {
                        continue;
                    };
                    debug!(command = %command, caller = command.caller.as_str(), "command received");
                    if tx.send(command).await.is_err() {
                        debug!("command channel closed, stopping poller");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "getUpdates failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(POLL_RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("command polling stopped");
}
