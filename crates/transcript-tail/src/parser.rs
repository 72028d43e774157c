//! 트랜스크립트 레코드 파서
//!
//! JSONL 한 줄을 [`Record`] 하나로 변환합니다. 선택 필드의 기본값
//! (`"unknown"` 발신자/채널, 현재 시각 타임스탬프)은 여기서 한 번만 결정됩니다.
//!
//! # 지원 형식
//! - `"message": "text"`
//! - `"message": [{"type": "text", "text": "..."}, ...]`
//! - `"message": {"role": "...", "content": "text" | [blocks]}`
//! - `"message"`가 없으면 최상위 `"content"`
//!
//! # 사용 예시
//! ```
//! use agentwatch_tail::parser::RecordParser;
//!
//! let parser = RecordParser::default();
//! let line = br#"{"type":"input","sender":"alice","channel":"telegram","message":"hi"}"#;
//! let record = parser.parse_line(line).unwrap().unwrap();
//! assert_eq!(record.sender, "alice");
//! ```

use agentwatch_core::types::{
    ContentBlock, MessageContent, Record, Role, UNKNOWN_CHANNEL, UNKNOWN_SENDER,
};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::TailError;

/// 파싱 에러 미리보기 최대 문자 수
pub const PREVIEW_CHARS: usize = 50;

/// 기본 최대 라인 길이 (바이트)
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// 한 줄을 레코드로 해석할 수 없음
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} (line: {preview:?})")]
pub struct ParseError {
    /// 문제 라인의 앞부분
    pub preview: String,
    /// 실패 사유
    pub reason: String,
}

impl ParseError {
    fn new(raw: &[u8], reason: impl Into<String>) -> Self {
        Self {
            preview: preview(raw),
            reason: reason.into(),
        }
    }
}

impl From<ParseError> for TailError {
    fn from(err: ParseError) -> Self {
        TailError::Parse {
            preview: err.preview,
            reason: err.reason,
        }
    }
}

/// 라인 앞부분을 최대 [`PREVIEW_CHARS`]자로 잘라 반환합니다.
pub fn preview(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).chars().take(PREVIEW_CHARS).collect()
}

/// JSONL 레코드 파서
#[derive(Debug, Clone)]
pub struct RecordParser {
    max_line_bytes: usize,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl RecordParser {
    /// 최대 라인 길이를 지정해 파서를 생성합니다.
    pub fn new(max_line_bytes: usize) -> Self {
        Self { max_line_bytes }
    }

    /// 라인 하나를 파싱합니다.
    ///
    /// - 빈 줄 → `Ok(None)`
    /// - 입력 항목이 아님 (`message` 없음, `type != "input"`) → `Ok(None)`
    /// - 형식 오류, 길이 초과 → `Err(ParseError)`
    pub fn parse_line(&self, raw: &[u8]) -> Result<Option<Record>, ParseError> {
        if raw.len() > self.max_line_bytes {
            return Err(ParseError::new(
                raw,
                format!(
                    "line length {} exceeds maximum {}",
                    raw.len(),
                    self.max_line_bytes
                ),
            ));
        }

        let trimmed = raw.trim_ascii();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let entry: WireEntry =
            serde_json::from_slice(trimmed).map_err(|e| ParseError::new(trimmed, e.to_string()))?;

        if entry.kind.as_deref() != Some("input") && entry.message.is_none() {
            return Ok(None);
        }

        Ok(Some(entry.into_record()))
    }
}

// --- 와이어 형식 ---

#[derive(Debug, Deserialize)]
struct WireEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    sender: Option<Value>,
    #[serde(default)]
    channel: Option<Value>,
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    content: Option<WireContent>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireMessage {
    Text(String),
    Blocks(Vec<WireBlock>),
    Envelope {
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        content: Option<WireContent>,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Blocks(Vec<WireBlock>),
    Other(Value),
}

#[derive(Debug, Deserialize)]
struct WireBlock {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl WireEntry {
    fn into_record(self) -> Record {
        let (message, envelope_role) = match self.message {
            Some(WireMessage::Text(text)) => (MessageContent::Text(text), None),
            Some(WireMessage::Blocks(blocks)) => (blocks_content(blocks), None),
            Some(WireMessage::Envelope { role, content }) => (content_of(content), role),
            Some(WireMessage::Other(_)) => (MessageContent::Empty, None),
            None => (content_of(self.content), None),
        };

        let role = self
            .role
            .or(envelope_role)
            .map(|r| Role::from_str_loose(&r));

        Record {
            sender: scalar_string(self.sender).unwrap_or_else(|| UNKNOWN_SENDER.to_owned()),
            channel: scalar_string(self.channel).unwrap_or_else(|| UNKNOWN_CHANNEL.to_owned()),
            message,
            role,
            timestamp: scalar_string(self.timestamp)
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

fn content_of(content: Option<WireContent>) -> MessageContent {
    match content {
        Some(WireContent::Text(text)) => MessageContent::Text(text),
        Some(WireContent::Blocks(blocks)) => blocks_content(blocks),
        Some(WireContent::Other(_)) | None => MessageContent::Empty,
    }
}

fn blocks_content(blocks: Vec<WireBlock>) -> MessageContent {
    MessageContent::Blocks(
        blocks
            .into_iter()
            .map(|b| ContentBlock {
                kind: b.kind.unwrap_or_default(),
                text: b.text,
            })
            .collect(),
    )
}

/// 문자열/숫자/불리언 값을 문자열로 변환합니다. 비어 있으면 None.
fn scalar_string(value: Option<Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if s.trim().is_empty() { None } else { Some(s) }
}
