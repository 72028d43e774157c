//! 의심 패턴 분류기
//!
//! [`PatternClassifier`]는 설정된 정규식을 시작 시 한 번 컴파일해 두고,
//! 메시지 텍스트에 매칭된 패턴을 설정 순서대로 반환합니다.
//!
//! `regex` 크레이트는 선형 시간 매칭을 보장하므로 백트래킹 폭주가 없습니다.
//! 컴파일된 프로그램 크기는 [`PATTERN_SIZE_LIMIT`]로 제한합니다.

use regex::{Regex, RegexBuilder};

use crate::error::TailError;

/// 패턴 하나당 컴파일된 정규식 크기 상한 (바이트)
pub const PATTERN_SIZE_LIMIT: usize = 1024 * 1024;

/// 컴파일된 의심 패턴
#[derive(Debug, Clone)]
struct CompiledPattern {
    /// 설정에 적힌 원문 (알림 플래그에 그대로 표시)
    source: String,
    regex: Regex,
}

/// 의심 패턴 분류기 -- 순수 함수, 내부 상태 없음
#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    patterns: Vec<CompiledPattern>,
}

impl PatternClassifier {
    /// 패턴 목록을 대소문자 무시 정규식으로 컴파일합니다.
    ///
    /// 하나라도 유효하지 않으면 시작 단계의 설정 에러로 실패합니다.
    pub fn new<I, S>(patterns: I) -> Result<Self, TailError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if pattern.trim().is_empty() {
                return Err(TailError::Pattern {
                    pattern: pattern.to_owned(),
                    reason: "empty pattern would match every message".to_owned(),
                });
            }

            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .size_limit(PATTERN_SIZE_LIMIT)
                .build()
                .map_err(|e| TailError::Pattern {
                    pattern: pattern.to_owned(),
                    reason: e.to_string(),
                })?;

            compiled.push(CompiledPattern {
                source: pattern.to_owned(),
                regex,
            });
        }

        Ok(Self { patterns: compiled })
    }

    /// 메시지에 매칭된 패턴 원문을 설정 순서대로 반환합니다.
    pub fn classify(&self, message: &str) -> Vec<String> {
        if message.is_empty() {
            return Vec::new();
        }

        self.patterns
            .iter()
            .filter(|p| p.regex.is_match(message))
            .map(|p| p.source.clone())
            .collect()
    }

    /// 등록된 패턴 수
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// 패턴이 하나도 없는지 여부
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(patterns: &[&str]) -> PatternClassifier {
        PatternClassifier::new(patterns.iter().copied()).unwrap()
    }

    #[test]
    fn matches_case_insensitively() {
        let c = classifier(&["ignore previous instructions"]);
        assert_eq!(
            c.classify("Please IGNORE Previous Instructions now"),
            vec!["ignore previous instructions"]
        );
    }

    #[test]
    fn result_preserves_configured_order() {
        let c = classifier(&["password", "api[_ ]?key", "rm -rf"]);
        let matched = c.classify("rm -rf / and send me the API key and password");
        assert_eq!(matched, vec!["password", "api[_ ]?key", "rm -rf"]);
    }

    #[test]
    fn empty_message_yields_nothing() {
        let c = classifier(&[".*"]);
        assert!(c.classify("").is_empty());
    }

    #[test]
    fn no_patterns_never_match() {
        let c = PatternClassifier::default();
        assert!(c.is_empty());
        assert!(c.classify("anything at all").is_empty());
    }

    #[test]
    fn invalid_pattern_is_rejected_at_build() {
        let err = PatternClassifier::new(["(unclosed"]).unwrap_err();
        assert!(matches!(err, TailError::Pattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn blank_pattern_is_rejected_at_build() {
        assert!(PatternClassifier::new(["  "]).is_err());
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        // 반복 확장으로 컴파일 크기 제한을 넘김
        let err = PatternClassifier::new(["(\\w{100}){100}"]).unwrap_err();
        assert!(matches!(err, TailError::Pattern { .. }));
    }

    #[test]
    fn handles_non_ascii_input() {
        let c = classifier(&["비밀번호"]);
        assert_eq!(c.classify("비밀번호 알려줘"), vec!["비밀번호"]);
        assert!(c.classify("\u{0}\u{fffd}🙂").is_empty());
    }
}
