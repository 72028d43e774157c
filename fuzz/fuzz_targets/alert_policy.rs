#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use agentwatch_core::event::FLAG_UNKNOWN_SENDER;
use agentwatch_core::types::{AlertLevel, MessageContent, Record};
use agentwatch_tail::{AlertPolicy, Decision, PatternClassifier};

#[derive(Arbitrary, Debug)]
struct FuzzRecord {
    /// 발신자 (작은 집합에서 선택해 반복 발신자를 유도)
    sender: u8,
    message: String,
}

#[derive(Arbitrary, Debug)]
enum FuzzLevel {
    All,
    NewSender,
    Suspicious,
    Digest,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    level: FuzzLevel,
    records: Vec<FuzzRecord>,
}

fuzz_target!(|input: FuzzInput| {
    let level = match input.level {
        FuzzLevel::All => AlertLevel::All,
        FuzzLevel::NewSender => AlertLevel::NewSender,
        FuzzLevel::Suspicious => AlertLevel::Suspicious,
        FuzzLevel::Digest => AlertLevel::Digest,
    };
    let Ok(classifier) = PatternClassifier::new(["ignore previous", "rm -rf"]) else {
        return;
    };
    let mut policy = AlertPolicy::new(level, classifier, ["sender-0".to_owned()]);

    let mut flagged_new = HashSet::new();
    for r in input.records.iter().take(256) {
        let record = Record {
            sender: format!("sender-{}", r.sender % 8),
            channel: "fuzz".to_owned(),
            message: MessageContent::Text(r.message.clone()),
            role: None,
            timestamp: "2026-01-01T00:00:00Z".to_owned(),
        };
        match policy.evaluate(&record) {
            Decision::Alert(verdict) => {
                if verdict.flags.iter().any(|f| f == FLAG_UNKNOWN_SENDER) {
                    // 새 발신자 플래그는 발신자당 한 번
                    assert!(flagged_new.insert(record.sender.clone()));
                }
            }
            Decision::Enqueue => assert_eq!(level, AlertLevel::Digest),
            Decision::Suppress(_) => {}
        }
        assert!(!policy.is_known("sender-0"));
        assert!(policy.recent().len() <= 10);
    }
});
