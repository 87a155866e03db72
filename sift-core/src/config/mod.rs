//! Configuration for the Sift analysis engine.

pub mod heuristics;

pub use heuristics::Heuristics;
