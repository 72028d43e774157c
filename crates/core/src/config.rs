//! 설정 관리: agentwatch.toml 파싱 및 런타임 설정
//!
//! [`AgentwatchConfig`]는 모든 구성 요소의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`AGENTWATCH_TELEGRAM_BOT_TOKEN=...` 형식)
//! 3. 설정 파일 (`agentwatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), agentwatch_core::error::AgentwatchError> {
//! use agentwatch_core::config::AgentwatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드 + 검증
//! let config = AgentwatchConfig::load("agentwatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱 (검증 없음)
//! let config = AgentwatchConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{AgentwatchError, ConfigError};
use crate::types::{AlertLevel, InitialCursor};

/// 설정 파일 경로를 지정하는 환경변수
pub const CONFIG_PATH_ENV: &str = "AGENTWATCH_CONFIG";

/// 예제 설정에 들어 있는 봇 토큰 자리표시자
pub const PLACEHOLDER_BOT_TOKEN: &str = "YOUR_BOT_TOKEN";

/// 예제 설정에 들어 있는 chat ID 자리표시자
pub const PLACEHOLDER_CHAT_ID: &str = "YOUR_CHAT_ID";

/// agentwatch 통합 설정
///
/// `agentwatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentwatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Telegram 전송 설정
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// 트랜스크립트 감시 설정
    #[serde(default)]
    pub watch: WatchConfig,
    /// 의심 패턴 및 차단 목록
    #[serde(default)]
    pub patterns: PatternsConfig,
    /// 에이전트 제어 설정
    #[serde(default)]
    pub agent: AgentConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl AgentwatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용한 뒤 검증합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AgentwatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 및 검증 없음).
    ///
    /// 자격 증명을 환경변수로만 주입하는 배포도 있으므로
    /// 검증은 오버라이드 이후 [`load`](Self::load)에서 수행합니다.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AgentwatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AgentwatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                AgentwatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, AgentwatchError> {
        toml::from_str(toml_str).map_err(|e| {
            AgentwatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 기본 설정 파일 경로 (`~/.config/agentwatch/agentwatch.toml`)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("agentwatch")
            .join("agentwatch.toml")
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `AGENTWATCH_{SECTION}_{FIELD}`
    /// 예: `AGENTWATCH_TELEGRAM_BOT_TOKEN=123:abc`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "AGENTWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "AGENTWATCH_GENERAL_LOG_FORMAT");

        // Telegram
        override_string(&mut self.telegram.bot_token, "AGENTWATCH_TELEGRAM_BOT_TOKEN");
        override_string(&mut self.telegram.chat_id, "AGENTWATCH_TELEGRAM_CHAT_ID");
        override_string(&mut self.telegram.api_base, "AGENTWATCH_TELEGRAM_API_BASE");

        // Watch
        override_csv(&mut self.watch.paths, "AGENTWATCH_WATCH_PATHS");
        override_parsed(&mut self.watch.alert_level, "AGENTWATCH_WATCH_ALERT_LEVEL");
        override_parsed(
            &mut self.watch.digest_interval_minutes,
            "AGENTWATCH_WATCH_DIGEST_INTERVAL_MINUTES",
        );
        override_parsed(&mut self.watch.existing_files, "AGENTWATCH_WATCH_EXISTING_FILES");
        override_parsed(&mut self.watch.new_files, "AGENTWATCH_WATCH_NEW_FILES");
        override_parsed(
            &mut self.watch.user_input_only,
            "AGENTWATCH_WATCH_USER_INPUT_ONLY",
        );

        // Patterns
        override_csv(
            &mut self.patterns.blocked_senders,
            "AGENTWATCH_PATTERNS_BLOCKED_SENDERS",
        );

        // Agent
        override_string(&mut self.agent.stop_command, "AGENTWATCH_AGENT_STOP_COMMAND");
        override_string(&mut self.agent.start_command, "AGENTWATCH_AGENT_START_COMMAND");
        override_string(
            &mut self.agent.process_pattern,
            "AGENTWATCH_AGENT_PROCESS_PATTERN",
        );
        override_string(&mut self.agent.log_file, "AGENTWATCH_AGENT_LOG_FILE");
        override_parsed(
            &mut self.agent.command_timeout_secs,
            "AGENTWATCH_AGENT_COMMAND_TIMEOUT_SECS",
        );

        // Metrics
        override_parsed(&mut self.metrics.enabled, "AGENTWATCH_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "AGENTWATCH_METRICS_LISTEN_ADDR");
        override_parsed(&mut self.metrics.port, "AGENTWATCH_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 자격 증명이 비어 있거나 예제 자리표시자 그대로면 시작 단계에서 실패합니다.
    pub fn validate(&self) -> Result<(), AgentwatchError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let token = self.telegram.bot_token.trim();
        if token.is_empty() || token == PLACEHOLDER_BOT_TOKEN {
            return Err(invalid(
                "telegram.bot_token",
                "bot token must be configured (placeholder or empty value found)",
            ));
        }

        let chat_id = self.telegram.chat_id.trim();
        if chat_id.is_empty() || chat_id == PLACEHOLDER_CHAT_ID {
            return Err(invalid(
                "telegram.chat_id",
                "authorized chat id must be configured (placeholder or empty value found)",
            ));
        }

        if self.telegram.api_base.trim().is_empty() {
            return Err(invalid("telegram.api_base", "must not be empty"));
        }

        if self.watch.paths.iter().all(|p| p.trim().is_empty()) {
            return Err(invalid(
                "watch.paths",
                "at least one watch pattern is required",
            ));
        }

        if self.watch.digest_interval_minutes == 0 {
            return Err(invalid("watch.digest_interval_minutes", "must be greater than 0"));
        }

        if self.watch.max_read_bytes == 0 {
            return Err(invalid("watch.max_read_bytes", "must be greater than 0"));
        }

        if self.watch.max_line_bytes == 0 {
            return Err(invalid("watch.max_line_bytes", "must be greater than 0"));
        }

        if self.watch.event_channel_capacity == 0 {
            return Err(invalid("watch.event_channel_capacity", "must be greater than 0"));
        }

        if self.agent.stop_command.trim().is_empty() {
            return Err(invalid("agent.stop_command", "must not be empty"));
        }

        if self.agent.start_command.trim().is_empty() {
            return Err(invalid("agent.start_command", "must not be empty"));
        }

        if self.agent.command_timeout_secs == 0 {
            return Err(invalid("agent.command_timeout_secs", "must be greater than 0"));
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// Telegram 전송 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot API 토큰
    pub bot_token: String,
    /// 알림 대상이자 유일하게 허가된 명령 호출자
    #[serde(deserialize_with = "string_or_integer")]
    pub chat_id: String,
    /// Bot API 기본 URL
    pub api_base: String,
    /// getUpdates 롱폴링 타임아웃 (초)
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: "https://api.telegram.org".to_owned(),
            poll_timeout_secs: 30,
        }
    }
}

/// 트랜스크립트 감시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// 감시할 glob 패턴 (`~` 확장 지원)
    pub paths: Vec<String>,
    /// 알림 수준
    pub alert_level: AlertLevel,
    /// 다이제스트 전송 주기 (분)
    pub digest_interval_minutes: u64,
    /// 시작 시점에 이미 존재하는 파일의 커서 초기 위치
    pub existing_files: InitialCursor,
    /// 실행 중 새로 생성된 파일의 커서 초기 위치
    pub new_files: InitialCursor,
    /// 사용자 발화만 평가할지 여부
    pub user_input_only: bool,
    /// 이벤트 한 번에 읽을 최대 바이트 수
    pub max_read_bytes: u64,
    /// 레코드 한 줄의 최대 바이트 수
    pub max_line_bytes: usize,
    /// 파일 시스템 이벤트 채널 용량
    pub event_channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: vec!["~/.moltbot/agents/*/sessions/*.jsonl".to_owned()],
            alert_level: AlertLevel::NewSender,
            digest_interval_minutes: 15,
            existing_files: InitialCursor::End,
            new_files: InitialCursor::Start,
            user_input_only: false,
            max_read_bytes: 1024 * 1024,  // 1MB
            max_line_bytes: 1024 * 1024,  // 1MB
            event_channel_capacity: 1024,
        }
    }
}

impl WatchConfig {
    /// `~`를 확장한 감시 패턴 목록을 반환합니다.
    pub fn expanded_paths(&self) -> Vec<String> {
        self.paths
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(|p| expand_home(p).to_string_lossy().into_owned())
            .collect()
    }
}

/// 의심 패턴 및 차단 발신자 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternsConfig {
    /// 대소문자 무시 정규식 목록 (설정 순서대로 평가)
    pub suspicious: Vec<String>,
    /// 알림과 추적에서 완전히 제외할 발신자
    pub blocked_senders: Vec<String>,
}

/// 에이전트 제어 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// 에이전트 정지 명령
    pub stop_command: String,
    /// 에이전트 시작 명령
    pub start_command: String,
    /// `pgrep`/`pkill -f`에 사용할 프로세스 패턴
    pub process_pattern: String,
    /// `/logs` 명령이 읽을 에이전트 로그 파일
    pub log_file: String,
    /// 정지/시작 명령 타임아웃 (초)
    pub command_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            stop_command: "moltbot gateway stop".to_owned(),
            start_command: "moltbot gateway start".to_owned(),
            process_pattern: "moltbot".to_owned(),
            log_file: "/tmp/moltbot/gateway.log".to_owned(),
            command_timeout_secs: 10,
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 메트릭 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인드 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9464,
        }
    }
}

/// 경로 앞의 `~`를 홈 디렉토리로 확장합니다.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

fn invalid(field: &str, reason: impl Into<String>) -> AgentwatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.into(),
    }
    .into()
}

/// chat ID는 TOML에서 문자열과 정수 모두 허용합니다.
fn string_or_integer<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrInteger {
        Str(String),
        Int(i64),
    }

    Ok(match StringOrInteger::deserialize(deserializer)? {
        StringOrInteger::Str(s) => s,
        StringOrInteger::Int(n) => n.to_string(),
    })
}

impl FromStr for AlertLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "new_sender" => Ok(Self::NewSender),
            "suspicious" => Ok(Self::Suspicious),
            "digest" => Ok(Self::Digest),
            other => Err(format!("unknown alert level '{other}'")),
        }
    }
}

impl FromStr for InitialCursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            other => Err(format!("unknown cursor policy '{other}'")),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_parsed<T>(target: &mut T, env_key: &str)
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(e) => warn!(
                env_key,
                value = val.as_str(),
                error = %e,
                "failed to parse env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
