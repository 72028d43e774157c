//! 테일 엔진 설정
//!
//! [`TailConfig`]는 core의 [`AgentwatchConfig`]에서 감시/패턴 섹션을 모아
//! 엔진 전용 설정으로 변환한 것입니다.
//!
//! # 사용 예시
//! ```ignore
//! use agentwatch_core::config::AgentwatchConfig;
//! use agentwatch_tail::config::TailConfig;
//!
//! let core_config = AgentwatchConfig::default();
//! let config = TailConfig::from_core(&core_config);
//! ```

use std::path::{Component, Path};

use agentwatch_core::config::AgentwatchConfig;
use agentwatch_core::types::{AlertLevel, InitialCursor};

use crate::error::TailError;

/// 최근 알림 링 기본 용량
pub const DEFAULT_RECENT_CAPACITY: usize = 10;

/// 테일 엔진 설정
#[derive(Debug, Clone)]
pub struct TailConfig {
    /// `~`가 확장된 감시 glob 패턴
    pub watch_paths: Vec<String>,
    /// 알림 수준
    pub alert_level: AlertLevel,
    /// 시작 시 존재하던 파일의 커서 초기 위치
    pub existing_files: InitialCursor,
    /// 새로 생성된 파일의 커서 초기 위치
    pub new_files: InitialCursor,
    /// 사용자 발화만 평가할지 여부
    pub user_input_only: bool,
    /// 이벤트 한 번에 읽을 최대 바이트 수
    pub max_read_bytes: u64,
    /// 레코드 한 줄의 최대 바이트 수
    pub max_line_bytes: usize,
    /// 의심 패턴 (설정 순서 유지)
    pub suspicious_patterns: Vec<String>,
    /// 차단 발신자
    pub blocked_senders: Vec<String>,
    /// 파일 시스템 이벤트 채널 용량
    pub event_channel_capacity: usize,

    // --- 확장 설정 (core에 없는 추가 필드) ---
    /// 최근 알림 링 용량
    pub recent_capacity: usize,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self::from_core(&AgentwatchConfig::default())
    }
}

impl TailConfig {
    /// core 설정에서 테일 엔진 설정을 생성합니다.
    ///
    /// core 설정에 없는 확장 필드는 기본값이 적용됩니다.
    pub fn from_core(core: &AgentwatchConfig) -> Self {
        Self {
            watch_paths: core.watch.expanded_paths(),
            alert_level: core.watch.alert_level,
            existing_files: core.watch.existing_files,
            new_files: core.watch.new_files,
            user_input_only: core.watch.user_input_only,
            max_read_bytes: core.watch.max_read_bytes,
            max_line_bytes: core.watch.max_line_bytes,
            suspicious_patterns: core.patterns.suspicious.clone(),
            blocked_senders: core.patterns.blocked_senders.clone(),
            event_channel_capacity: core.watch.event_channel_capacity,
            recent_capacity: DEFAULT_RECENT_CAPACITY,
        }
    }

    /// 감시 패턴이 안전한지 검증합니다.
    ///
    /// # 검증 규칙
    /// - 비어 있지 않아야 함
    /// - `..` 컴포넌트를 포함하지 않아야 함
    /// - 절대 경로여야 함 (`~`는 이미 확장된 상태)
    fn validate_watch_path(pattern: &str) -> Result<(), TailError> {
        if pattern.is_empty() {
            return Err(TailError::Config {
                field: "watch.paths".to_owned(),
                reason: "watch pattern must not be empty".to_owned(),
            });
        }

        let path = Path::new(pattern);

        if path.components().any(|c| c == Component::ParentDir) {
            return Err(TailError::Config {
                field: "watch.paths".to_owned(),
                reason: format!("watch pattern '{pattern}' contains path traversal pattern '..'"),
            });
        }

        if !path.is_absolute() {
            return Err(TailError::Config {
                field: "watch.paths".to_owned(),
                reason: format!("watch pattern '{pattern}' must be an absolute path"),
            });
        }

        glob::Pattern::new(pattern).map_err(|e| TailError::Config {
            field: "watch.paths".to_owned(),
            reason: format!("invalid glob '{pattern}': {e}"),
        })?;

        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), TailError> {
        if self.watch_paths.is_empty() {
            return Err(TailError::Config {
                field: "watch.paths".to_owned(),
                reason: "at least one watch pattern is required".to_owned(),
            });
        }

        for pattern in &self.watch_paths {
            Self::validate_watch_path(pattern)?;
        }

        if self.max_read_bytes == 0 {
            return Err(TailError::Config {
                field: "watch.max_read_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.max_line_bytes == 0 {
            return Err(TailError::Config {
                field: "watch.max_line_bytes".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.event_channel_capacity == 0 {
            return Err(TailError::Config {
                field: "watch.event_channel_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        if self.recent_capacity == 0 {
            return Err(TailError::Config {
                field: "recent_capacity".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// 테일 설정 빌더
#[derive(Default)]
pub struct TailConfigBuilder {
    config: TailConfig,
}

impl TailConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 감시 패턴을 설정합니다.
    pub fn watch_paths(mut self, paths: Vec<String>) -> Self {
        self.config.watch_paths = paths;
        self
    }

    /// 알림 수준을 설정합니다.
    pub fn alert_level(mut self, level: AlertLevel) -> Self {
        self.config.alert_level = level;
        self
    }

    /// 기존 파일의 커서 초기 위치를 설정합니다.
    pub fn existing_files(mut self, policy: InitialCursor) -> Self {
        self.config.existing_files = policy;
        self
    }

    /// 새 파일의 커서 초기 위치를 설정합니다.
    pub fn new_files(mut self, policy: InitialCursor) -> Self {
        self.config.new_files = policy;
        self
    }

    /// 사용자 발화만 평가할지 설정합니다.
    pub fn user_input_only(mut self, enabled: bool) -> Self {
        self.config.user_input_only = enabled;
        self
    }

    /// 이벤트당 최대 읽기 바이트를 설정합니다.
    pub fn max_read_bytes(mut self, bytes: u64) -> Self {
        self.config.max_read_bytes = bytes;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_bytes(mut self, bytes: usize) -> Self {
        self.config.max_line_bytes = bytes;
        self
    }

    /// 의심 패턴을 설정합니다.
    pub fn suspicious_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.suspicious_patterns = patterns;
        self
    }

    /// 차단 발신자를 설정합니다.
    pub fn blocked_senders(mut self, senders: Vec<String>) -> Self {
        self.config.blocked_senders = senders;
        self
    }

    /// 최근 알림 링 용량을 설정합니다.
    pub fn recent_capacity(mut self, capacity: usize) -> Self {
        self.config.recent_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `TailConfig`를 생성합니다.
    pub fn build(self) -> Result<TailConfig, TailError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
