//! Tests for Sift error enums and error codes.

use sift_core::errors::error_code;
use sift_core::errors::{ConfigError, ModelError, SiftErrorCode};

#[test]
fn test_model_error_display() {
    let error = ModelError::PortOutOfBounds { index: 3, arity: 2 };
    let message = error.to_string();
    assert!(message.contains("argument 3"));
    assert!(message.contains("arity 2"));
}

#[test]
fn test_model_error_code() {
    let error = ModelError::Inconsistent("sink on void return".to_string());
    assert_eq!(error.error_code(), error_code::MODEL_ERROR);
    assert!(error.coded_string().starts_with("[MODEL_ERROR]"));
}

#[test]
fn test_invalid_rule_uses_rule_code() {
    let error = ModelError::InvalidRule {
        name: "BadRule".to_string(),
        reason: "multi-source rules require exactly two labels".to_string(),
    };
    assert_eq!(error.error_code(), error_code::RULE_ERROR);
}

#[test]
fn test_config_error_from_toml() {
    let parse_error = toml::from_str::<sift_core::config::Heuristics>("sink_max_port_size = \"x\"")
        .expect_err("type mismatch must fail");
    let error: ConfigError = parse_error.into();
    assert_eq!(error.error_code(), error_code::CONFIG_ERROR);
}

#[test]
fn test_invalid_access_path_message() {
    let error = ModelError::InvalidAccessPath {
        value: "Argument(x)".to_string(),
        reason: "index is not an integer".to_string(),
    };
    assert!(error.to_string().contains("Argument(x)"));
}
