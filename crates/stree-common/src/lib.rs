//! Common types and utilities for the stree state-tree engine.
//!
//! This crate provides foundational types used across all stree crates:
//! - Coded errors (`ModelError`)
//! - Shared constants (`DEFAULT_TYPE_TAG`)
//! - Centralized limits and thresholds

// Coded errors for the engine
pub mod diagnostics;
pub use diagnostics::ModelError;

// Shared constants - break circular dependencies between crates
pub mod common;
pub use common::DEFAULT_TYPE_TAG;

// Centralized limits and thresholds
pub mod limits;
