//! 테일 엔진 에러 타입
//!
//! [`TailError`]는 트랜스크립트 감시, 파싱, 분류 과정에서 발생하는 에러를 표현합니다.
//! `From<TailError> for AgentwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 전파할 수 있습니다.

use std::path::PathBuf;

use agentwatch_core::error::{AgentwatchError, ConfigError};

/// 테일 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// 레코드 파싱 실패
    #[error("parse error: {reason} (line: {preview:?})")]
    Parse {
        /// 문제 라인의 앞부분 (최대 50자)
        preview: String,
        /// 실패 사유
        reason: String,
    },

    /// 의심 패턴 컴파일 실패
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern {
        /// 설정된 패턴 원문
        pattern: String,
        /// 컴파일 실패 사유
        reason: String,
    },

    /// 트랜스크립트 파일 I/O 실패
    #[error("io error on {}: {source}", path.display())]
    Io {
        /// 대상 파일
        path: PathBuf,
        /// 원본 에러
        source: std::io::Error,
    },

    /// 파일 시스템 감시 설정 실패
    #[error("watch error: {0}")]
    Watch(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),
}

impl From<notify::Error> for TailError {
    fn from(err: notify::Error) -> Self {
        TailError::Watch(err.to_string())
    }
}

impl From<TailError> for AgentwatchError {
    fn from(err: TailError) -> Self {
        match err {
            TailError::Pattern { pattern, reason } => {
                AgentwatchError::Config(ConfigError::InvalidValue {
                    field: "patterns.suspicious".to_owned(),
                    reason: format!("'{pattern}': {reason}"),
                })
            }
            TailError::Config { field, reason } => {
                AgentwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            TailError::Io { source, .. } => AgentwatchError::Io(source),
            other => AgentwatchError::Tail(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_preview() {
        let err = TailError::Parse {
            preview: "{not json".to_owned(),
            reason: "expected value".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("{not json"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn pattern_error_becomes_config_error() {
        let err = TailError::Pattern {
            pattern: "(unclosed".to_owned(),
            reason: "unclosed group".to_owned(),
        };
        let top: AgentwatchError = err.into();
        assert!(matches!(
            top,
            AgentwatchError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "patterns.suspicious"
        ));
    }

    #[test]
    fn channel_error_becomes_tail_error() {
        let top: AgentwatchError = TailError::Channel("receiver closed".to_owned()).into();
        assert!(matches!(top, AgentwatchError::Tail(_)));
    }

    #[test]
    fn io_error_display_includes_path() {
        let err = TailError::Io {
            path: PathBuf::from("/tmp/session.jsonl"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/session.jsonl"));
    }
}
