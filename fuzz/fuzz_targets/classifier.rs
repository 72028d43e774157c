#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use agentwatch_tail::PatternClassifier;

/// 퍼저용 구조적 입력
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    /// 의심 패턴 (최대 8개로 제한)
    patterns: Vec<String>,
    /// 분류 대상 메시지
    message: String,
}

fuzz_target!(|input: FuzzInput| {
    let patterns: Vec<&str> = input.patterns.iter().take(8).map(String::as_str).collect();

    // 잘못된 패턴은 생성 단계에서 거부되어야 함
    let Ok(classifier) = PatternClassifier::new(&patterns) else {
        return;
    };

    let matched = classifier.classify(&input.message);
    assert!(matched.len() <= classifier.len());

    // 결과는 설정 순서를 유지
    let mut cursor = 0;
    for m in &matched {
        let pos = patterns[cursor..]
            .iter()
            .position(|p| p == m)
            .expect("matched pattern must come from configuration");
        cursor += pos + 1;
    }
});
