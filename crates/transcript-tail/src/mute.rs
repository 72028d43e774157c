//! 뮤트 게이트 -- 시간 제한이 있는 알림 억제
//!
//! 뮤트 중에도 정책 판단과 상태 갱신은 그대로 진행되고, 전송만 건너뜁니다.
//! 만료는 조회 시점에 지연 처리됩니다 (만료 후 첫 조회에서 상태를 비움).

use std::time::Duration;

use agentwatch_core::error::TransportError;
use agentwatch_core::metrics as m;
use agentwatch_core::transport::{MessageFormat, MessageSink};
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

/// 전송 시도 결과
#[derive(Debug)]
pub enum EmitOutcome {
    /// 전송 성공
    Delivered,
    /// 뮤트 중이라 전송하지 않음
    Muted,
    /// 전송 실패 (재시도하지 않음)
    Failed(TransportError),
}

impl EmitOutcome {
    /// 전송에 성공했는지 여부
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// 뮤트 상태
#[derive(Debug, Clone, Default)]
pub struct MuteGate {
    until: Option<DateTime<Utc>>,
}

impl MuteGate {
    /// 활성 상태(뮤트 아님)로 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금부터 `duration` 동안 뮤트합니다. 만료 시각을 반환합니다.
    pub fn set_mute(&mut self, duration: Duration) -> DateTime<Utc> {
        self.set_mute_at(Utc::now(), duration)
    }

    /// `now` 기준으로 뮤트합니다.
    pub fn set_mute_at(&mut self, now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
        let until = TimeDelta::from_std(duration)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.until = Some(until);
        info!(until = %until, "alerts muted");
        until
    }

    /// 뮤트를 해제합니다.
    pub fn clear_mute(&mut self) {
        if self.until.take().is_some() {
            info!("alerts unmuted");
        }
    }

    /// 현재 뮤트 중인지 확인합니다.
    pub fn is_muted(&mut self) -> bool {
        self.is_muted_at(Utc::now())
    }

    /// `now` 기준으로 뮤트 여부를 확인합니다. 만료되었으면 상태를 비웁니다.
    pub fn is_muted_at(&mut self, now: DateTime<Utc>) -> bool {
        match self.until {
            Some(until) if now < until => true,
            Some(_) => {
                debug!("mute window expired");
                self.until = None;
                false
            }
            None => false,
        }
    }

    /// 저장된 만료 시각 (지연 만료 전 값일 수 있음)
    pub fn muted_until(&self) -> Option<DateTime<Utc>> {
        self.until
    }

    /// 뮤트 중이 아니면 메시지를 전송합니다.
    pub async fn emit<S: MessageSink>(
        &mut self,
        sink: &S,
        chat: &str,
        text: &str,
        format: MessageFormat,
    ) -> EmitOutcome {
        if self.is_muted() {
            debug!(chars = text.chars().count(), "alert dropped while muted");
            metrics::counter!(m::ALERTS_MUTED_TOTAL).increment(1);
            return EmitOutcome::Muted;
        }

        match sink.send(chat, text, format).await {
            Ok(()) => {
                metrics::counter!(m::ALERTS_DELIVERED_TOTAL).increment(1);
                EmitOutcome::Delivered
            }
            Err(e) => {
                warn!(error = %e, "failed to deliver alert");
                metrics::counter!(m::ALERTS_FAILED_TOTAL).increment(1);
                EmitOutcome::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    impl MessageSink for RecordingSink {
        async fn send(
            &self,
            _chat: &str,
            text: &str,
            _format: MessageFormat,
        ) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Request("connection refused".to_owned()));
            }
            self.sent.lock().unwrap().push(text.to_owned());
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn lazy_expiry_clears_state() {
        let mut gate = MuteGate::new();
        gate.set_mute_at(t0(), Duration::from_secs(5 * 60));

        assert!(gate.is_muted_at(t0() + TimeDelta::seconds(1)));
        assert!(gate.muted_until().is_some());

        assert!(!gate.is_muted_at(t0() + TimeDelta::minutes(5)));
        assert!(gate.muted_until().is_none());
    }

    #[test]
    fn clear_mute_unmutes_immediately() {
        let mut gate = MuteGate::new();
        gate.set_mute(Duration::from_secs(3600));
        assert!(gate.is_muted());
        gate.clear_mute();
        assert!(!gate.is_muted());
    }

    #[test]
    fn huge_duration_saturates() {
        let mut gate = MuteGate::new();
        let until = gate.set_mute_at(t0(), Duration::from_secs(u64::MAX));
        assert_eq!(until, DateTime::<Utc>::MAX_UTC);
        assert!(gate.is_muted_at(t0()));
    }

    #[tokio::test]
    async fn emit_forwards_when_active() {
        let sink = RecordingSink::default();
        let mut gate = MuteGate::new();
        let outcome = gate.emit(&sink, "42", "alert", MessageFormat::Html).await;
        assert!(outcome.is_delivered());
        assert_eq!(sink.sent.lock().unwrap().as_slice(), ["alert"]);
    }

    #[tokio::test]
    async fn emit_drops_when_muted() {
        let sink = RecordingSink::default();
        let mut gate = MuteGate::new();
        gate.set_mute(Duration::from_secs(600));
        let outcome = gate.emit(&sink, "42", "alert", MessageFormat::Plain).await;
        assert!(matches!(outcome, EmitOutcome::Muted));
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn emit_reports_transport_failure() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let mut gate = MuteGate::new();
        let outcome = gate.emit(&sink, "42", "alert", MessageFormat::Plain).await;
        assert!(matches!(outcome, EmitOutcome::Failed(TransportError::Request(_))));
    }
}
