//! 테일 엔진 -- 파일 이벤트 하나를 처리해 알림 이벤트를 만듭니다.
//!
//! # 처리 순서
//! ```text
//! FileEvent -> 커서 등록/조정 -> 커서부터 읽기 (max_read_bytes 상한)
//!           -> 완결 라인 분리 -> RecordParser -> AlertPolicy -> AlertEvent
//! ```
//!
//! 개행으로 끝나지 않은 마지막 조각은 소비하지 않고 다음 읽기로 남깁니다.
//! 같은 경로의 이벤트는 엔진을 소유한 단일 워커가 순서대로 처리하므로
//! 읽기가 겹치지 않고, 중복 이벤트가 와도 레코드는 한 번만 평가됩니다.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use agentwatch_core::event::AlertEvent;
use agentwatch_core::metrics as m;
use tracing::{debug, info, warn};

use crate::config::TailConfig;
use crate::cursor::{CursorStore, FileSnapshot};
use crate::error::TailError;
use crate::parser::RecordParser;
use crate::policy::{AlertPolicy, Decision};
use crate::watch::{FileEvent, WatchPatterns};

/// 이벤트 하나를 처리한 결과
#[derive(Debug, Default)]
pub struct TailBatch {
    /// 즉시 전송할 알림
    pub alerts: Vec<AlertEvent>,
    /// 파싱된 레코드 수
    pub records: usize,
    /// 다이제스트 큐에 적재된 레코드 수
    pub enqueued: usize,
    /// 파싱 실패 라인 수
    pub parse_errors: usize,
    /// 읽기 상한에 걸려 아직 읽지 않은 데이터가 남았는지 여부
    pub more_pending: bool,
}

/// 증분 테일링 엔진
#[derive(Debug)]
pub struct TailEngine {
    config: TailConfig,
    patterns: WatchPatterns,
    cursors: CursorStore,
    parser: RecordParser,
    policy: AlertPolicy,
}

impl TailEngine {
    /// 설정으로 엔진을 생성합니다.
    ///
    /// 설정 검증, 감시 패턴과 의심 패턴 컴파일이 여기서 이루어집니다.
    pub fn new(config: TailConfig) -> Result<Self, TailError> {
        config.validate()?;
        let patterns = WatchPatterns::new(&config.watch_paths)?;
        let policy = AlertPolicy::from_config(&config)?;
        Ok(Self {
            patterns,
            cursors: CursorStore::new(config.existing_files, config.new_files),
            parser: RecordParser::new(config.max_line_bytes),
            policy,
            config,
        })
    }

    /// 시작 시점에 이미 존재하는 파일을 등록합니다. 등록한 파일 수를 반환합니다.
    pub fn scan_existing(&mut self) -> usize {
        let mut registered = 0;
        for path in self.patterns.existing_files() {
            match FileSnapshot::of(&path) {
                Ok(snapshot) => {
                    let offset = self.cursors.register_existing(&path, snapshot);
                    debug!(path = %path.display(), offset, "registered existing transcript");
                    registered += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cannot stat transcript"),
            }
        }
        metrics::gauge!(m::TAIL_TRACKED_FILES).set(self.cursors.len() as f64);
        info!(files = registered, "initial transcript scan complete");
        registered
    }

    /// 파일 이벤트 하나를 처리합니다.
    ///
    /// I/O 에러가 나면 커서는 움직이지 않으며, 다음 이벤트에서 다시 시도합니다.
    pub fn handle_event(&mut self, event: &FileEvent) -> Result<TailBatch, TailError> {
        let path = event.path();
        if !self.patterns.matches(path) {
            return Ok(TailBatch::default());
        }

        self.process(path, matches!(event, FileEvent::Created(_)))
            .inspect_err(|_| metrics::counter!(m::TAIL_IO_ERRORS_TOTAL).increment(1))
    }

    fn process(&mut self, path: &Path, created: bool) -> Result<TailBatch, TailError> {
        let io_err = |source| TailError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_err)?;
        let metadata = file.metadata().map_err(io_err)?;
        if !metadata.is_file() {
            return Ok(TailBatch::default());
        }
        let snapshot = FileSnapshot::from_metadata(&metadata);

        if created || self.cursors.entry(path).is_none() {
            let offset = self.cursors.register_new_file(path, snapshot);
            debug!(path = %path.display(), offset, "tracking transcript");
            metrics::gauge!(m::TAIL_TRACKED_FILES).set(self.cursors.len() as f64);
        } else if self.cursors.reconcile(path, snapshot).is_reset() {
            metrics::counter!(m::TAIL_CURSOR_RESETS_TOTAL).increment(1);
        }

        let offset = self.cursors.offset_of(path);
        if snapshot.len <= offset {
            return Ok(TailBatch::default());
        }

        let available = snapshot.len - offset;
        let want = available.min(self.config.max_read_bytes);
        file.seek(SeekFrom::Start(offset)).map_err(io_err)?;
        let mut buf = Vec::with_capacity(usize::try_from(want).unwrap_or(0));
        (&mut file).take(want).read_to_end(&mut buf).map_err(io_err)?;

        let capped = (buf.len() as u64) < available;
        let mut batch = TailBatch {
            more_pending: capped,
            ..TailBatch::default()
        };

        let mut consumed = 0usize;
        let discarding = self
            .cursors
            .entry(path)
            .is_some_and(|entry| entry.discard_partial);

        if discarding {
            match buf.iter().position(|&b| b == b'\n') {
                Some(end) => {
                    consumed = end + 1;
                    self.cursors.set_discard_partial(path, false);
                    debug!(path = %path.display(), "finished discarding oversized line");
                }
                None => {
                    // 긴 라인이 아직 끝나지 않음
                    self.cursors.advance(path, offset + buf.len() as u64);
                    return Ok(batch);
                }
            }
        }

        let rest = &buf[consumed..];
        match rest.iter().rposition(|&b| b == b'\n') {
            Some(last) => {
                self.consume_lines(path, &rest[..=last], &mut batch);
                consumed += last + 1;
            }
            None if capped && consumed == 0 && buf.len() as u64 >= self.config.max_read_bytes => {
                warn!(
                    path = %path.display(),
                    offset,
                    max_read_bytes = self.config.max_read_bytes,
                    "line longer than read cap, discarding up to next newline"
                );
                metrics::counter!(m::TAIL_LINES_DISCARDED_TOTAL).increment(1);
                self.cursors.set_discard_partial(path, true);
                consumed = buf.len();
            }
            None => {}
        }

        self.cursors.advance(path, offset + consumed as u64);
        Ok(batch)
    }

    fn consume_lines(&mut self, path: &Path, chunk: &[u8], batch: &mut TailBatch) {
        for raw in chunk.split(|&b| b == b'\n') {
            let line = raw.strip_suffix(b"\r").unwrap_or(raw);
            if line.is_empty() {
                continue;
            }
            metrics::counter!(m::TAIL_LINES_READ_TOTAL).increment(1);

            let record = match self.parser.parse_line(line) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unparseable transcript line");
                    metrics::counter!(m::TAIL_PARSE_ERRORS_TOTAL).increment(1);
                    batch.parse_errors += 1;
                    continue;
                }
            };
            metrics::counter!(m::TAIL_RECORDS_PARSED_TOTAL).increment(1);
            batch.records += 1;

            match self.policy.evaluate(&record) {
                Decision::Alert(verdict) => {
                    batch.alerts.push(AlertEvent::new(
                        path,
                        record,
                        verdict.flags,
                        verdict.is_suspicious,
                        verdict.is_new_sender,
                    ));
                }
                Decision::Enqueue => batch.enqueued += 1,
                Decision::Suppress(_) => {}
            }
        }
    }

    /// 알림 정책 (읽기 전용)
    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// 알림 정책 (다이제스트 비우기 등)
    pub fn policy_mut(&mut self) -> &mut AlertPolicy {
        &mut self.policy
    }

    /// 커서 저장소
    pub fn cursors(&self) -> &CursorStore {
        &self.cursors
    }

    /// 감시 패턴
    pub fn patterns(&self) -> &WatchPatterns {
        &self.patterns
    }

    /// 엔진 설정
    pub fn config(&self) -> &TailConfig {
        &self.config
    }
}
