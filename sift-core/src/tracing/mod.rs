//! Tracing setup for Sift.

pub mod setup;

pub use setup::init_tracing;
