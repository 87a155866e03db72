//! Sift analysis core.
//!
//! A whole-program, inter-procedural taint-tracking engine for mobile
//! application bytecode, organized as:
//! - **Abstract domain**: path trees, frames, taint, taint trees, and the
//!   forward environment mapping memory locations to taint trees
//! - **Models**: per-method summaries (generations, parameter sources,
//!   sinks, propagations, sanitizers, modes)
//! - **Transfer**: the per-instruction forward transfer function, including
//!   call-site instantiation of callee models
//! - **Rules**: source/sink rule matching, multi-source partial rules, and
//!   exploitability rules producing issues
//!
//! The core is a library: bytecode loading, aliasing, call-graph resolution,
//! and fixed-point scheduling are external collaborators reached through the
//! traits in [`transfer::oracle`].

pub mod access_path;
pub mod domain;
pub mod environment;
pub mod factories;
pub mod feature;
pub mod interval;
pub mod kind;
pub mod model;
pub mod origin;
pub mod position;
pub mod rules;
pub mod taint;
pub mod transfer;
pub mod transforms;
pub mod tree;

pub use domain::AbstractDomain;
pub use factories::Factories;
