//! Orchestrator construction tests.
//!
//! `build_from_config` must reject every startup configuration error before
//! any component is started.

use agentwatch_core::config::AgentwatchConfig;
use agentwatch_daemon::orchestrator::Orchestrator;

const EXAMPLE: &str = include_str!("../../agentwatch.toml.example");

/// Example config with the placeholder credentials filled in.
fn configured_example() -> AgentwatchConfig {
    let mut config = AgentwatchConfig::parse(EXAMPLE).expect("example config should parse");
    config.telegram.bot_token = "123456:test-token".to_owned();
    config.telegram.chat_id = "42".to_owned();
    config.watch.paths = vec!["/tmp/agentwatch-test/*/sessions/*.jsonl".to_owned()];
    config
}

#[test]
fn builds_from_completed_example() {
    let orchestrator = Orchestrator::build_from_config(configured_example())
        .expect("completed example config should build");
    assert_eq!(orchestrator.config().telegram.chat_id, "42");
    assert!(!orchestrator.shutdown_token().is_cancelled());
}

#[test]
fn placeholder_credentials_are_fatal() {
    let config = AgentwatchConfig::parse(EXAMPLE).unwrap();
    let err = Orchestrator::build_from_config(config)
        .err()
        .expect("placeholder token must be rejected");
    assert!(err.to_string().contains("telegram.bot_token"), "{err}");
}

#[test]
fn invalid_suspicious_pattern_is_fatal() {
    let mut config = configured_example();
    config.patterns.suspicious.push("(unclosed".to_owned());
    let err = Orchestrator::build_from_config(config)
        .err()
        .expect("bad regex must be rejected");
    assert!(err.to_string().contains("(unclosed"), "{err}");
}

#[test]
fn relative_watch_path_is_fatal() {
    let mut config = configured_example();
    config.watch.paths = vec!["sessions/*.jsonl".to_owned()];
    assert!(Orchestrator::build_from_config(config).is_err());
}

#[test]
fn empty_process_pattern_is_fatal() {
    let mut config = configured_example();
    config.agent.process_pattern = "  ".to_owned();
    let err = Orchestrator::build_from_config(config)
        .err()
        .expect("empty process pattern must be rejected");
    assert!(err.to_string().contains("agent.process_pattern"), "{err}");
}

#[tokio::test]
async fn build_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let err = Orchestrator::build(&missing)
        .await
        .err()
        .expect("missing file must fail");
    assert!(err.to_string().contains("not found"), "{err}");
}
