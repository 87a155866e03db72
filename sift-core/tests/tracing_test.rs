//! Tests for tracing initialization.

use sift_core::tracing::init_tracing;

#[test]
fn test_init_tracing_idempotent() {
    // Calling twice must not panic (the global subscriber is set once).
    init_tracing();
    init_tracing();
}

#[test]
fn test_tracing_macros_usable_after_init() {
    init_tracing();
    tracing::info!(target: "sift", "tracing initialized");
    tracing::debug!(target: "sift::transfer", instruction = 3, "transfer step");
}
