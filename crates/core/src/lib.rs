#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod transport;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{AgentwatchError, ConfigError, TransportError};

// 설정
pub use config::AgentwatchConfig;

// 이벤트
pub use event::AlertEvent;

// 전송 trait
pub use transport::{InboundCommand, MessageFormat, MessageSink};

// 도메인 타입
pub use types::{AlertLevel, ContentBlock, InitialCursor, MessageContent, Record, Role};
