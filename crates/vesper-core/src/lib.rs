//! Vesper Core
//!
//! Shared plumbing for the Vesper renderer crates: logging and profiling setup,
//! plain-data math and geometry types, and engine-level configuration.

pub mod alloc;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod math;
pub mod profiling;
