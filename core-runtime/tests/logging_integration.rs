//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{init_logging, redact_if_sensitive, strip_path, LogFormat, LoggingConfig};

#[test]
fn test_logging_initializes_once() {
    // Only one global subscriber per process, so both calls live in one test
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug);

    init_logging(config.clone()).expect("first initialization succeeds");
    tracing::info!(file_id = "abc123", "logging ready");

    let second = init_logging(config);
    assert!(second.is_err(), "second initialization must be rejected");
}

#[test]
fn test_pii_redaction_tokens() {
    assert_eq!(redact_if_sensitive("access_token", "ya29.a0"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("refresh_token", "1//0g"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("client_secret", "GOCSPX"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("authorization_code", "4/0A"), "[REDACTED]");
}

#[test]
fn test_pii_redaction_normal_values() {
    assert_eq!(redact_if_sensitive("file_id", "abc123"), "abc123");
    assert_eq!(redact_if_sensitive("mime_type", "application/pdf"), "application/pdf");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("exports/Quarterly Report.pdf"), "Quarterly Report.pdf");
    assert_eq!(strip_path("D:\\exports\\Notes.docx"), "Notes.docx");
    assert_eq!(strip_path(""), "");
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(true)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(config.display_target);
    assert!(config.display_thread_info);
}
