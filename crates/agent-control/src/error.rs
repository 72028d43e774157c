//! 에이전트 제어 에러 타입
//!
//! `From<AgentControlError> for AgentwatchError` 변환이 구현되어 있습니다.

use agentwatch_core::error::{AgentwatchError, ConfigError};

/// 에이전트 제어 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum AgentControlError {
    /// 명령 프로세스를 띄우지 못함
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// 실행하려던 명령
        command: String,
        /// 원본 에러
        source: std::io::Error,
    },

    /// 명령이 제한 시간 안에 끝나지 않음
    #[error("'{command}' timed out after {timeout:?}")]
    Timeout {
        /// 실행한 명령
        command: String,
        /// 제한 시간
        timeout: std::time::Duration,
    },

    /// 명령이 실패 상태로 종료
    #[error("'{command}' exited with {status}: {stderr}")]
    Failed {
        /// 실행한 명령
        command: String,
        /// 종료 상태
        status: String,
        /// 표준 에러 출력 (앞부분)
        stderr: String,
    },

    /// 에이전트 로그 파일 읽기 실패
    #[error("cannot read agent log {path}: {source}")]
    LogRead {
        /// 로그 파일 경로
        path: String,
        /// 원본 에러
        source: std::io::Error,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl From<AgentControlError> for AgentwatchError {
    fn from(err: AgentControlError) -> Self {
        match err {
            AgentControlError::Config { field, reason } => {
                AgentwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => AgentwatchError::AgentControl(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display() {
        let err = AgentControlError::Timeout {
            command: "moltbot gateway stop".to_owned(),
            timeout: std::time::Duration::from_secs(10),
        };
        let msg = err.to_string();
        assert!(msg.contains("moltbot gateway stop"));
        assert!(msg.contains("10s"));
    }

    #[test]
    fn sub_second_timeout_display() {
        let err = AgentControlError::Timeout {
            command: "sleep 5".to_owned(),
            timeout: std::time::Duration::from_millis(300),
        };
        assert!(err.to_string().ends_with("timed out after 300ms"));
    }

    #[test]
    fn converts_to_agentwatch_error() {
        let err = AgentControlError::Failed {
            command: "false".to_owned(),
            status: "exit status: 1".to_owned(),
            stderr: String::new(),
        };
        let top: AgentwatchError = err.into();
        assert!(matches!(top, AgentwatchError::AgentControl(_)));
    }

    #[test]
    fn config_error_stays_config() {
        let top: AgentwatchError = AgentControlError::Config {
            field: "agent.stop_command".to_owned(),
            reason: "empty".to_owned(),
        }
        .into();
        assert!(matches!(top, AgentwatchError::Config(_)));
    }
}
