//! Model consistency errors.
//!
//! Model inconsistencies never abort an analysis. The offending fragment is
//! dropped, the error is logged, and the analysis continues.

use super::error_code::{self, SiftErrorCode};

/// Errors raised while building or validating a per-method model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model consistency error: {0}")]
    Inconsistent(String),

    #[error("Port out of bounds: argument {index} on a method with arity {arity}")]
    PortOutOfBounds { index: u8, arity: u8 },

    #[error("Return port on a void method: {0}")]
    ReturnOnVoid(String),

    #[error("Invalid access path `{value}`: {reason}")]
    InvalidAccessPath { value: String, reason: String },

    #[error("Invalid rule `{name}`: {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("Invalid taint configuration: {0}")]
    InvalidTaintConfig(String),
}

impl SiftErrorCode for ModelError {
    fn error_code(&self) -> &'static str {
        match self {
            ModelError::InvalidRule { .. } => error_code::RULE_ERROR,
            _ => error_code::MODEL_ERROR,
        }
    }
}
