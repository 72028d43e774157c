//! 도메인 타입: 트랜스크립트 레코드와 메시지 본문
//!
//! 에이전트 트랜스크립트의 한 줄은 [`Record`] 하나로 파싱됩니다.
//! 선택 필드의 기본값은 파싱 시점에 한 번만 결정되며,
//! 이후 소비자는 항상 채워진 값을 봅니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 발신자가 없을 때 사용하는 기본 식별자
pub const UNKNOWN_SENDER: &str = "unknown";

/// 채널이 없을 때 사용하는 기본 값
pub const UNKNOWN_CHANNEL: &str = "unknown";

/// 트랜스크립트 레코드: 파싱된 항목 하나
///
/// 생성 이후에는 변경하지 않습니다. 분류와 정책 판단은
/// 레코드와 워커 상태 스냅샷에 대한 순수 함수입니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// 발신자 식별자 (없으면 `"unknown"`)
    pub sender: String,
    /// 유입 채널 (없으면 `"unknown"`)
    pub channel: String,
    /// 메시지 본문
    pub message: MessageContent,
    /// 발화 주체 (선택)
    pub role: Option<Role>,
    /// 타임스탬프 문자열 (없으면 파싱 시각, RFC 3339)
    pub timestamp: String,
}

impl Record {
    /// 분류에 사용할 메시지 텍스트를 반환합니다.
    ///
    /// 텍스트를 추출할 수 없으면 빈 문자열입니다.
    pub fn message_text(&self) -> &str {
        self.message.text().unwrap_or("")
    }

    /// 사용자 발화인지 여부
    ///
    /// role이 없는 레코드는 사용자 입력으로 간주합니다.
    pub fn is_user_input(&self) -> bool {
        matches!(self.role, None | Some(Role::User))
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}@{}: {}",
            self.timestamp,
            self.sender,
            self.channel,
            self.message_text(),
        )
    }
}

/// 메시지 본문: 평문 문자열 또는 타입이 지정된 블록 목록
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    /// 단순 문자열
    Text(String),
    /// 콘텐츠 블록 목록 (`{"type": "text", "text": "..."}` 등)
    Blocks(Vec<ContentBlock>),
    /// 본문 없음 또는 인식할 수 없는 형태
    #[default]
    Empty,
}

impl MessageContent {
    /// 본문 텍스트를 추출합니다.
    ///
    /// 블록 목록이면 첫 번째 `text` 타입 블록의 텍스트를 사용합니다.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Blocks(blocks) => blocks
                .iter()
                .find(|block| block.kind == "text")
                .and_then(|block| block.text.as_deref()),
            Self::Empty => None,
        }
    }
}

/// 타입이 지정된 콘텐츠 블록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    /// 블록 타입 (`text`, `image`, `tool_use` ...)
    pub kind: String,
    /// 텍스트 블록의 본문
    pub text: Option<String>,
}

impl ContentBlock {
    /// 텍스트 블록을 생성합니다.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_owned(),
            text: Some(text.into()),
        }
    }
}

/// 발화 주체
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// 사용자 입력
    User,
    /// 에이전트 응답
    Assistant,
    /// 그 밖의 역할 (system, tool ...)
    Other(String),
}

impl Role {
    /// 문자열에서 역할을 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "user" | "human" => Self::User,
            "assistant" | "agent" => Self::Assistant,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Other(other) => write!(f, "{other}"),
        }
    }
}

/// 알림 수준: 어떤 레코드가 즉시 알림을 발생시키는지 결정합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// 모든 입력을 알림
    All,
    /// 새 발신자 또는 의심 패턴일 때 알림
    #[default]
    NewSender,
    /// 의심 패턴일 때만 알림
    Suspicious,
    /// 즉시 알림 대신 다이제스트 큐에 적재
    Digest,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::NewSender => write!(f, "new_sender"),
            Self::Suspicious => write!(f, "suspicious"),
            Self::Digest => write!(f, "digest"),
        }
    }
}

/// 커서 초기 위치 정책
///
/// 처음 관측한 파일을 처음부터 읽을지(`start`), 현재 끝에서부터
/// 읽을지(`end`) 결정합니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialCursor {
    /// 오프셋 0: 기존 내용을 모두 재생
    #[default]
    Start,
    /// 현재 파일 크기: 기존 내용은 건너뜀
    End,
}

impl fmt::Display for InitialCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(message: MessageContent, role: Option<Role>) -> Record {
        Record {
            sender: "alice".to_owned(),
            channel: "telegram".to_owned(),
            message,
            role,
            timestamp: "2026-01-15T12:00:00Z".to_owned(),
        }
    }

    #[test]
    fn text_content_extracts_directly() {
        let content = MessageContent::Text("hello".to_owned());
        assert_eq!(content.text(), Some("hello"));
    }

    #[test]
    fn blocks_take_first_text_block() {
        let content = MessageContent::Blocks(vec![
            ContentBlock {
                kind: "image".to_owned(),
                text: None,
            },
            ContentBlock::text("first"),
            ContentBlock::text("second"),
        ]);
        assert_eq!(content.text(), Some("first"));
    }

    #[test]
    fn blocks_without_text_yield_none() {
        let content = MessageContent::Blocks(vec![ContentBlock {
            kind: "tool_use".to_owned(),
            text: None,
        }]);
        assert_eq!(content.text(), None);
        assert_eq!(MessageContent::Empty.text(), None);
    }

    #[test]
    fn message_text_defaults_to_empty() {
        let record = record_with(MessageContent::Empty, None);
        assert_eq!(record.message_text(), "");
    }

    #[test]
    fn missing_role_counts_as_user_input() {
        assert!(record_with(MessageContent::Empty, None).is_user_input());
        assert!(record_with(MessageContent::Empty, Some(Role::User)).is_user_input());
        assert!(!record_with(MessageContent::Empty, Some(Role::Assistant)).is_user_input());
    }

    #[test]
    fn role_from_str_loose() {
        assert_eq!(Role::from_str_loose("USER"), Role::User);
        assert_eq!(Role::from_str_loose("assistant"), Role::Assistant);
        assert_eq!(
            Role::from_str_loose("tool"),
            Role::Other("tool".to_owned())
        );
    }

    #[test]
    fn alert_level_serde_uses_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: AlertLevel,
        }
        let parsed: Wrapper = toml::from_str("level = \"new_sender\"").unwrap();
        assert_eq!(parsed.level, AlertLevel::NewSender);
        assert_eq!(AlertLevel::Digest.to_string(), "digest");
    }

    #[test]
    fn record_display_contains_sender_and_text() {
        let record = record_with(MessageContent::Text("hi there".to_owned()), None);
        let shown = record.to_string();
        assert!(shown.contains("alice@telegram"));
        assert!(shown.contains("hi there"));
    }
}
