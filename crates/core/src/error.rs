//! 에러 타입: 도메인별 에러 정의

/// agentwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AgentwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 메시지 전송 에러
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// 트랜스크립트 감시 에러
    #[error("tail error: {0}")]
    Tail(String),

    /// 에이전트 제어 에러
    #[error("agent control error: {0}")]
    AgentControl(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 메시지 전송 에러
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 요청 자체가 실패함 (연결, 타임아웃 등)
    #[error("request failed: {0}")]
    Request(String),

    /// 원격 API가 실패 응답을 반환함
    #[error("api error (status {status}): {description}")]
    Api { status: u16, description: String },

    /// 응답 본문을 해석할 수 없음
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: AgentwatchError = ConfigError::InvalidValue {
            field: "telegram.bot_token".to_owned(),
            reason: "placeholder".to_owned(),
        }
        .into();
        assert!(matches!(err, AgentwatchError::Config(_)));
        assert!(err.to_string().contains("telegram.bot_token"));
    }

    #[test]
    fn api_error_display_includes_status() {
        let err = TransportError::Api {
            status: 401,
            description: "Unauthorized".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("401"));
        assert!(msg.contains("Unauthorized"));
    }
}
