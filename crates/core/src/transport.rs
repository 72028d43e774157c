//! 전송 trait: 운영자 메시징 채널과의 경계
//!
//! 알림 발송과 명령 응답은 모두 [`MessageSink`]를 통해 나갑니다.
//! 수신 명령은 [`InboundCommand`]로 정규화되어 워커에 전달됩니다.

use std::fmt;
use std::future::Future;

use crate::error::TransportError;

/// 메시지 형식 힌트
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageFormat {
    /// 일반 텍스트
    #[default]
    Plain,
    /// HTML 마크업 (Telegram `parse_mode=HTML`)
    Html,
}

/// 운영자에게 메시지를 보내는 전송 계층
///
/// 발송은 fire-and-forget입니다. 호출자는 실패를 로깅만 하고
/// 재시도하지 않습니다.
pub trait MessageSink: Send + Sync + 'static {
    /// `chat` 대상으로 메시지를 전송합니다.
    fn send(
        &self,
        chat: &str,
        text: &str,
        format: MessageFormat,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// 원격에서 수신한 운영자 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCommand {
    /// 호출자 식별자 (권한 검사 대상)
    pub caller: String,
    /// 응답을 보낼 대화 ID
    pub chat: String,
    /// 명령 이름 (`/` 및 `@bot` 접미사 제거됨)
    pub name: String,
    /// 공백으로 구분된 인자
    pub args: Vec<String>,
}

impl InboundCommand {
    /// 명령 텍스트(`/mute 10`)를 파싱합니다.
    ///
    /// `/`로 시작하지 않으면 `None`을 반환합니다.
    pub fn from_text(caller: impl Into<String>, chat: impl Into<String>, text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            caller: caller.into(),
            chat: chat.into(),
            name,
            args: parts.map(str::to_owned).collect(),
        })
    }
}

impl fmt::Display for InboundCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_args() {
        let cmd = InboundCommand::from_text("42", "42", "/mute 10").unwrap();
        assert_eq!(cmd.name, "mute");
        assert_eq!(cmd.args, vec!["10"]);
        assert_eq!(cmd.to_string(), "/mute 10");
    }

    #[test]
    fn strips_bot_suffix() {
        let cmd = InboundCommand::from_text("42", "42", "/Status@agentwatch_bot").unwrap();
        assert_eq!(cmd.name, "status");
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn plain_text_is_not_a_command() {
        assert!(InboundCommand::from_text("42", "42", "hello").is_none());
        assert!(InboundCommand::from_text("42", "42", "").is_none());
        assert!(InboundCommand::from_text("42", "42", "/").is_none());
    }
}
