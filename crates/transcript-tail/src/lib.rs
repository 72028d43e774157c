#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`watch`]: glob 감시 패턴과 `notify` 기반 파일 이벤트 수집
//! - [`cursor`]: 파일별 읽기 오프셋, 잘림/교체 감지
//! - [`parser`]: JSONL 트랜스크립트 레코드 파서
//! - [`classifier`]: 대소문자 무시 의심 패턴 분류기
//! - [`policy`]: 알림 수준, 발신자 추적, 최근 알림 링, 다이제스트 큐
//! - [`engine`]: 이벤트 단위 증분 테일링 (위 구성 요소 조합)
//! - [`mute`]: 시간 제한 알림 억제
//! - [`config`]: 엔진 설정 (core 설정에서 파생)
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! notify -> FsWatcher -> mpsc -> TailEngine -> RecordParser -> AlertPolicy -> MuteGate -> sink
//!                                    |                             |
//!                               CursorStore                PatternClassifier
//! ```

pub mod classifier;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod mute;
pub mod parser;
pub mod policy;
pub mod watch;

// --- 주요 타입 re-export ---

pub use classifier::PatternClassifier;
pub use config::{TailConfig, TailConfigBuilder};
pub use cursor::{CursorStore, FileSnapshot, Reconcile};
pub use engine::{TailBatch, TailEngine};
pub use error::TailError;
pub use mute::{EmitOutcome, MuteGate};
pub use parser::{ParseError, RecordParser};
pub use policy::{AlertPolicy, Decision, DigestEntry, SuppressReason, Verdict};
pub use watch::{FileEvent, FsWatcher, WatchPatterns};
