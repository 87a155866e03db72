//! Core types, traits, errors, config, and tracing for the Sift taint analyzer.
//!
//! This crate holds everything the analysis engine needs that is not analysis
//! logic: interning infrastructure, performance collections, error enums,
//! heuristic configuration, and tracing setup.

pub mod config;
pub mod constants;
pub mod errors;
pub mod tracing;
pub mod types;
