//! 파일 시스템 감시
//!
//! [`WatchPatterns`]는 glob 감시 패턴을 해석하고, [`FsWatcher`]는 `notify`
//! 콜백에서 패턴에 맞는 이벤트만 bounded 채널로 넘깁니다.
//!
//! 콜백은 채널에 넣기만 합니다. 상태 변경은 모두 수신 측 워커에서 일어납니다.

use std::path::{Component, Path, PathBuf};

use glob::{MatchOptions, Pattern};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::TailError;

/// 테일 엔진이 처리하는 파일 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileEvent {
    /// 새 파일 (생성 또는 감시 경로로 이름 변경)
    Created(PathBuf),
    /// 내용 변경
    Modified(PathBuf),
}

impl FileEvent {
    /// 이벤트 대상 경로
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Modified(p) => p,
        }
    }

    /// `notify` 이벤트를 파일 이벤트로 변환합니다.
    ///
    /// 이름 변경은 도착 경로만 생성으로 취급하고, 메타데이터 변경과
    /// 삭제는 무시합니다.
    pub fn from_notify(event: &Event) -> Vec<FileEvent> {
        match &event.kind {
            EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
                .paths
                .iter()
                .cloned()
                .map(FileEvent::Created)
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event
                .paths
                .last()
                .cloned()
                .map(FileEvent::Created)
                .into_iter()
                .collect(),
            EventKind::Modify(ModifyKind::Name(_) | ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => event
                .paths
                .iter()
                .cloned()
                .map(FileEvent::Modified)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// glob 감시 패턴 집합
#[derive(Debug, Clone)]
pub struct WatchPatterns {
    patterns: Vec<Pattern>,
}

impl WatchPatterns {
    /// 패턴 문자열을 컴파일합니다.
    pub fn new<I, S>(patterns: I) -> Result<Self, TailError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|e| TailError::Config {
                    field: "watch.paths".to_owned(),
                    reason: format!("invalid glob '{p}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    fn match_options() -> MatchOptions {
        MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        }
    }

    /// 경로가 어느 패턴에든 맞는지 확인합니다.
    pub fn matches(&self, path: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(path, Self::match_options()))
    }

    /// 재귀 감시할 루트 디렉토리 목록
    ///
    /// 각 패턴에서 첫 번째 와일드카드 컴포넌트 이전까지를 루트로 씁니다.
    /// 와일드카드가 없으면 부모 디렉토리입니다. 다른 루트 아래에 있는 루트는 제외합니다.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self
            .patterns
            .iter()
            .map(|p| base_dir(p.as_str()))
            .collect();
        roots.sort();
        roots.dedup();

        let mut minimal: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !minimal.iter().any(|kept| root.starts_with(kept)) {
                minimal.push(root);
            }
        }
        minimal
    }

    /// 현재 디스크에 있는, 패턴에 맞는 파일 목록 (정렬, 중복 제거)
    pub fn existing_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for pattern in &self.patterns {
            match glob::glob_with(pattern.as_str(), Self::match_options()) {
                Ok(paths) => {
                    for entry in paths {
                        match entry {
                            Ok(path) if path.is_file() => files.push(path),
                            Ok(_) => {}
                            Err(e) => debug!(error = %e, "unreadable path during glob expansion"),
                        }
                    }
                }
                Err(e) => warn!(pattern = pattern.as_str(), error = %e, "glob expansion failed"),
            }
        }
        files.sort();
        files.dedup();
        files
    }
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

fn base_dir(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut saw_wildcard = false;
    for component in path.components() {
        if let Component::Normal(part) = component
            && has_glob_meta(&part.to_string_lossy())
        {
            saw_wildcard = true;
            break;
        }
        base.push(component);
    }

    if saw_wildcard {
        base
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or(base)
    }
}

/// `notify` 기반 파일 시스템 감시자
///
/// drop 되면 감시가 중단됩니다.
pub struct FsWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl FsWatcher {
    /// 감시 루트를 재귀 감시하고 패턴에 맞는 이벤트를 `tx`로 보냅니다.
    ///
    /// 감시 루트가 없으면 생성합니다. 채널이 가득 차면 notify 스레드가
    /// 블록되어 역압이 걸립니다.
    pub fn start(patterns: &WatchPatterns, tx: mpsc::Sender<FileEvent>) -> Result<Self, TailError> {
        let filter = patterns.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for file_event in FileEvent::from_notify(&event) {
                    if !filter.matches(file_event.path()) {
                        continue;
                    }
                    if tx.blocking_send(file_event).is_err() {
                        debug!("file event channel closed, dropping event");
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "file watch error"),
        })?;

        let roots = patterns.watch_roots();
        for root in &roots {
            if !root.exists() {
                if let Err(e) = std::fs::create_dir_all(root) {
                    warn!(root = %root.display(), error = %e, "failed to create watch root");
                    continue;
                }
                info!(root = %root.display(), "created missing watch root");
            }
            watcher.watch(root, RecursiveMode::Recursive)?;
            info!(root = %root.display(), "watching transcripts");
        }

        Ok(Self {
            _watcher: watcher,
            roots,
        })
    }

    /// 감시 중인 루트 디렉토리
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}
