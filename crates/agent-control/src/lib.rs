#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`control`]: [`AgentControl`] trait, 결과/상태 타입
//! - [`shell`]: 셸 명령 기반 구현 (`sh -c`, `pgrep`, `kill`)
//! - [`error`]: 도메인 에러 타입

pub mod control;
pub mod error;
pub mod shell;

pub use control::{AgentControl, AgentStatus, ControlOutcome};
pub use error::AgentControlError;
pub use shell::{ShellAgentControl, ShellControlConfig};
