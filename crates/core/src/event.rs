//! 알림 이벤트: 테일 엔진이 워커에 넘기는 기본 단위
//!
//! [`AlertEvent`]는 알림 정책을 통과한 레코드 하나와 판단 근거(플래그)를 담습니다.
//! 뮤트 게이트를 거쳐 전송 계층으로 넘어갑니다.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::Record;

/// 새 발신자 플래그 문구
pub const FLAG_UNKNOWN_SENDER: &str = "Unknown sender";

/// 정책이 알림을 결정한 레코드
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    /// 이벤트 고유 ID (UUID v4)
    pub id: String,
    /// 레코드를 읽은 트랜스크립트 파일
    pub source: PathBuf,
    /// 원본 레코드
    pub record: Record,
    /// 사람이 읽을 수 있는 플래그 목록 (패턴 매칭, 새 발신자)
    pub flags: Vec<String>,
    /// 의심 패턴 매칭 여부
    pub is_suspicious: bool,
    /// 평가 시점 기준 처음 본 발신자인지 여부
    pub is_new_sender: bool,
    /// 생성 시각
    pub created_at: SystemTime,
}

impl AlertEvent {
    /// 새 알림 이벤트를 생성합니다.
    pub fn new(
        source: impl Into<PathBuf>,
        record: Record,
        flags: Vec<String>,
        is_suspicious: bool,
        is_new_sender: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            record,
            flags,
            is_suspicious,
            is_new_sender,
            created_at: SystemTime::now(),
        }
    }
}

impl fmt::Display for AlertEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AlertEvent[{}] sender={} suspicious={} flags={}",
            &self.id[..8.min(self.id.len())],
            self.record.sender,
            self.is_suspicious,
            self.flags.len(),
        )
    }
}
