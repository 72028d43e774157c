//! 파일별 읽기 커서
//!
//! [`CursorStore`]는 트랜스크립트 경로마다 마지막으로 소비한 바이트 오프셋을 기억합니다.
//!
//! # 불변 조건
//! - 오프셋은 프로세스 수명 동안 감소하지 않습니다.
//! - 예외: 디스크상 크기가 저장된 오프셋보다 작아졌거나(truncation),
//!   파일 식별자(inode)가 바뀐 경우(교체) 0으로 리셋됩니다.
//! - 엔트리는 처음 관측될 때 생성되며 삭제되지 않습니다.

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use agentwatch_core::types::InitialCursor;
use tracing::{debug, warn};

/// 커서 판단에 필요한 파일 상태 스냅샷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    /// 현재 파일 크기
    pub len: u64,
    /// 파일 식별자 (Unix inode, 그 외 플랫폼은 None)
    pub file_id: Option<u64>,
}

impl FileSnapshot {
    /// 메타데이터에서 스냅샷을 만듭니다.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            len: metadata.len(),
            file_id: file_id(metadata),
        }
    }

    /// 경로의 현재 상태를 읽습니다.
    pub fn of(path: &Path) -> std::io::Result<Self> {
        std::fs::metadata(path).map(|m| Self::from_metadata(&m))
    }
}

#[cfg(unix)]
fn file_id(metadata: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_id(_metadata: &Metadata) -> Option<u64> {
    None
}

/// 파일 하나의 커서 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorEntry {
    /// 마지막으로 소비한 바이트 오프셋
    pub offset: u64,
    /// 커서를 만든 시점의 파일 식별자
    pub file_id: Option<u64>,
    /// 읽기 상한보다 긴 라인을 버리는 중인지 여부
    ///
    /// 설정되어 있으면 다음 개행까지의 바이트는 파싱 없이 소비합니다.
    pub discard_partial: bool,
}

/// 디스크 상태와 커서를 맞춘 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// 아직 추적하지 않는 파일
    Untracked,
    /// 변화 없음 (또는 append만 발생)
    Unchanged,
    /// 파일이 저장된 오프셋보다 작아짐 -- 0으로 리셋
    Truncated { previous: u64 },
    /// 같은 경로에 다른 파일이 놓임 -- 0으로 리셋
    Replaced { previous: u64 },
}

impl Reconcile {
    /// 커서가 리셋되었는지 여부
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::Replaced { .. })
    }
}

/// 경로별 커서 저장소
#[derive(Debug, Clone, Default)]
pub struct CursorStore {
    entries: HashMap<PathBuf, CursorEntry>,
    existing_files: InitialCursor,
    new_files: InitialCursor,
}

impl CursorStore {
    /// 초기 위치 정책을 지정해 저장소를 생성합니다.
    pub fn new(existing_files: InitialCursor, new_files: InitialCursor) -> Self {
        Self {
            entries: HashMap::new(),
            existing_files,
            new_files,
        }
    }

    /// 경로의 현재 오프셋 (처음 보는 경로는 0)
    pub fn offset_of(&self, path: &Path) -> u64 {
        self.entries.get(path).map_or(0, |e| e.offset)
    }

    /// 경로의 커서 엔트리
    pub fn entry(&self, path: &Path) -> Option<&CursorEntry> {
        self.entries.get(path)
    }

    /// 시작 시 스캔에서 발견한 파일을 등록합니다.
    ///
    /// 이미 추적 중이면 기존 오프셋을 유지합니다.
    pub fn register_existing(&mut self, path: &Path, snapshot: FileSnapshot) -> u64 {
        if let Some(entry) = self.entries.get(path) {
            return entry.offset;
        }
        let offset = initial_offset(self.existing_files, snapshot);
        self.insert(path, offset, snapshot);
        offset
    }

    /// 생성 이벤트로 관측한 파일을 등록합니다.
    ///
    /// 같은 식별자이고 잘리지 않은 파일에 대한 중복 생성 이벤트는
    /// 기존 오프셋을 유지합니다. 식별자가 다르거나 잘린 경우에는
    /// 새 파일로 보고 `new_files` 정책으로 다시 시작합니다.
    pub fn register_new_file(&mut self, path: &Path, snapshot: FileSnapshot) -> u64 {
        if let Some(entry) = self.entries.get(path)
            && entry.file_id == snapshot.file_id
            && snapshot.len >= entry.offset
        {
            debug!(path = %path.display(), offset = entry.offset, "duplicate create event, keeping cursor");
            return entry.offset;
        }

        let offset = initial_offset(self.new_files, snapshot);
        if let Some(previous) = self.entries.get(path) {
            warn!(
                path = %path.display(),
                previous = previous.offset,
                offset,
                "file recreated, restarting cursor"
            );
        }
        self.insert(path, offset, snapshot);
        offset
    }

    /// 디스크 상태와 커서를 비교해 잘림/교체를 처리합니다.
    pub fn reconcile(&mut self, path: &Path, snapshot: FileSnapshot) -> Reconcile {
        let Some(entry) = self.entries.get_mut(path) else {
            return Reconcile::Untracked;
        };

        let previous = entry.offset;
        let outcome = if entry.file_id != snapshot.file_id {
            Reconcile::Replaced { previous }
        } else if snapshot.len < entry.offset {
            Reconcile::Truncated { previous }
        } else {
            return Reconcile::Unchanged;
        };

        warn!(
            path = %path.display(),
            previous,
            size = snapshot.len,
            outcome = ?outcome,
            "transcript truncated or replaced, resetting cursor to 0"
        );
        entry.offset = 0;
        entry.file_id = snapshot.file_id;
        entry.discard_partial = false;
        outcome
    }

    /// 커서를 전진시킵니다.
    ///
    /// 뒤로 가는 요청은 거부하고 `false`를 반환합니다.
    pub fn advance(&mut self, path: &Path, new_offset: u64) -> bool {
        let Some(entry) = self.entries.get_mut(path) else {
            warn!(path = %path.display(), new_offset, "advance on untracked file ignored");
            return false;
        };

        if new_offset < entry.offset {
            warn!(
                path = %path.display(),
                current = entry.offset,
                requested = new_offset,
                "refusing to move cursor backward"
            );
            return false;
        }

        entry.offset = new_offset;
        true
    }

    /// 긴 라인 폐기 상태를 설정합니다.
    pub fn set_discard_partial(&mut self, path: &Path, discard: bool) {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.discard_partial = discard;
        }
    }

    /// 추적 중인 파일 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 추적 중인 파일이 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, path: &Path, offset: u64, snapshot: FileSnapshot) {
        self.entries.insert(
            path.to_path_buf(),
            CursorEntry {
                offset,
                file_id: snapshot.file_id,
                discard_partial: false,
            },
        );
    }
}

fn initial_offset(policy: InitialCursor, snapshot: FileSnapshot) -> u64 {
    match policy {
        InitialCursor::Start => 0,
        InitialCursor::End => snapshot.len,
    }
}
