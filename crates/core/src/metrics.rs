//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `agentwatch_`
//! - 구성 요소: `tail_`, `policy_`, `alerts_`, `commands_`, `agent_control_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(agentwatch_core::metrics::TAIL_RECORDS_PARSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 정책 판단 레이블 키 (alert, enqueue, suppress)
pub const LABEL_DECISION: &str = "decision";

/// 억제 사유 레이블 키 (blocked, not_user_input, below_threshold)
pub const LABEL_REASON: &str = "reason";

/// 명령 이름 레이블 키
pub const LABEL_COMMAND: &str = "command";

/// 에이전트 제어 액션 레이블 키 (stop, start)
pub const LABEL_ACTION: &str = "action";

/// 결과 레이블 키 (success, failure, unauthorized)
pub const LABEL_RESULT: &str = "result";

// ─── Tail Engine 메트릭 ─────────────────────────────────────────────

/// Tail: 읽은 완결 라인 수 (counter)
pub const TAIL_LINES_READ_TOTAL: &str = "agentwatch_tail_lines_read_total";

/// Tail: 파싱된 레코드 수 (counter)
pub const TAIL_RECORDS_PARSED_TOTAL: &str = "agentwatch_tail_records_parsed_total";

/// Tail: 파싱 실패 수 (counter)
pub const TAIL_PARSE_ERRORS_TOTAL: &str = "agentwatch_tail_parse_errors_total";

/// Tail: 읽기 I/O 실패 수 (counter)
pub const TAIL_IO_ERRORS_TOTAL: &str = "agentwatch_tail_io_errors_total";

/// Tail: 잘림/교체로 인한 커서 리셋 수 (counter)
pub const TAIL_CURSOR_RESETS_TOTAL: &str = "agentwatch_tail_cursor_resets_total";

/// Tail: 길이 제한 초과로 버려진 라인 수 (counter)
pub const TAIL_LINES_DISCARDED_TOTAL: &str = "agentwatch_tail_lines_discarded_total";

/// Tail: 추적 중인 파일 수 (gauge)
pub const TAIL_TRACKED_FILES: &str = "agentwatch_tail_tracked_files";

// ─── Alert Policy 메트릭 ────────────────────────────────────────────

/// Policy: 판단 결과별 레코드 수 (counter, label: decision)
pub const POLICY_DECISIONS_TOTAL: &str = "agentwatch_policy_decisions_total";

/// Policy: 알려진 발신자 수 (gauge)
pub const POLICY_KNOWN_SENDERS: &str = "agentwatch_policy_known_senders";

/// Policy: 다이제스트 큐 길이 (gauge)
pub const POLICY_DIGEST_QUEUE_LENGTH: &str = "agentwatch_policy_digest_queue_length";

// ─── 알림 전송 메트릭 ───────────────────────────────────────────────

/// Alerts: 전송 성공 수 (counter)
pub const ALERTS_DELIVERED_TOTAL: &str = "agentwatch_alerts_delivered_total";

/// Alerts: 뮤트로 버려진 수 (counter)
pub const ALERTS_MUTED_TOTAL: &str = "agentwatch_alerts_muted_total";

/// Alerts: 전송 실패 수 (counter)
pub const ALERTS_FAILED_TOTAL: &str = "agentwatch_alerts_failed_total";

// ─── 명령 / 에이전트 제어 메트릭 ────────────────────────────────────

/// Commands: 수신 명령 수 (counter, labels: command, result)
pub const COMMANDS_TOTAL: &str = "agentwatch_commands_total";

/// Agent Control: 정지/시작 명령 소요 시간 (histogram, 초, label: action)
pub const AGENT_CONTROL_DURATION_SECONDS: &str = "agentwatch_agent_control_duration_seconds";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "agentwatch_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "agentwatch_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 에이전트 제어 소요 시간 히스토그램 버킷 (초)
///
/// 10ms ~ 30s 범위 (명령 타임아웃 기본값 10초 포함)
pub const AGENT_CONTROL_DURATION_BUCKETS: [f64; 9] =
    [0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `agentwatch-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Tail Engine
    describe_counter!(
        TAIL_LINES_READ_TOTAL,
        "Total number of complete transcript lines read"
    );
    describe_counter!(
        TAIL_RECORDS_PARSED_TOTAL,
        "Total number of transcript records parsed"
    );
    describe_counter!(
        TAIL_PARSE_ERRORS_TOTAL,
        "Total number of transcript lines that failed to parse"
    );
    describe_counter!(
        TAIL_IO_ERRORS_TOTAL,
        "Total number of I/O failures while reading transcripts"
    );
    describe_counter!(
        TAIL_CURSOR_RESETS_TOTAL,
        "Total number of cursor resets caused by truncation or replacement"
    );
    describe_counter!(
        TAIL_LINES_DISCARDED_TOTAL,
        "Total number of lines discarded for exceeding the read cap"
    );
    describe_gauge!(TAIL_TRACKED_FILES, "Number of transcript files with a cursor");

    // Alert Policy
    describe_counter!(
        POLICY_DECISIONS_TOTAL,
        "Policy decisions by outcome (alert, enqueue, suppress)"
    );
    describe_gauge!(POLICY_KNOWN_SENDERS, "Number of senders seen so far");
    describe_gauge!(
        POLICY_DIGEST_QUEUE_LENGTH,
        "Number of records waiting for the next digest flush"
    );

    // Alerts
    describe_counter!(
        ALERTS_DELIVERED_TOTAL,
        "Total number of alerts delivered to the operator"
    );
    describe_counter!(
        ALERTS_MUTED_TOTAL,
        "Total number of alerts dropped while muted"
    );
    describe_counter!(
        ALERTS_FAILED_TOTAL,
        "Total number of alerts the transport failed to deliver"
    );

    // Commands
    describe_counter!(
        COMMANDS_TOTAL,
        "Operator commands received by name and authorization result"
    );
    describe_histogram!(
        AGENT_CONTROL_DURATION_SECONDS,
        "Time spent running agent stop/start commands in seconds"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "agentwatch daemon uptime in seconds");
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
