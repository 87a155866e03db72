//! SiftErrorCode trait for structured error reporting.

/// Trait for attaching stable code strings to Sift errors.
/// Every error enum implements this so logs and issue reports can key on a
/// structured code rather than a formatted message.
pub trait SiftErrorCode {
    /// Returns the error code string (e.g., "MODEL_ERROR").
    fn error_code(&self) -> &'static str;

    /// Returns the formatted error string: `[ERROR_CODE] message`.
    fn coded_string(&self) -> String
    where
        Self: std::fmt::Display,
    {
        format!("[{}] {}", self.error_code(), self)
    }
}

// Error code constants.
pub const MODEL_ERROR: &str = "MODEL_ERROR";
pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
pub const RULE_ERROR: &str = "RULE_ERROR";
