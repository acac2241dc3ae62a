//! Coded errors for the stree engine.
//!
//! The engine favors silent degradation for snapshot-level oddities
//! (unrecognized discriminator values, write-only accessors, late
//! registrations), so `ModelError` covers only the cases a caller can
//! actually mishandle: unknown names, writes outside the mutation channel,
//! malformed snapshots, and exceeded depth limits.

use serde_json::Value;
use std::fmt;

/// Stable numeric codes for every error variant.
pub mod error_codes {
    pub const UNKNOWN_MEMBER: u32 = 1001;
    pub const UNKNOWN_FIELD: u32 = 1002;
    pub const MUTATION_OUTSIDE_PROCEDURE: u32 = 1003;
    pub const SNAPSHOT_SHAPE: u32 = 1004;
    pub const MISSING_FIELD: u32 = 1005;
    pub const NON_PRIMITIVE_FIELD: u32 = 1006;
    pub const ANCESTOR_DEPTH_EXCEEDED: u32 = 1007;
    pub const NODE_DEPTH_EXCEEDED: u32 = 1008;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// No query, procedure, or accessor with this name exists on the type
    /// or any of its ancestors.
    UnknownMember { type_name: String, member: String },
    /// The schema declares no field with this name.
    UnknownField { type_name: String, field: String },
    /// A field or volatile write was attempted outside a procedure or
    /// accessor-setter invocation.
    MutationOutsideProcedure { member: String },
    /// A snapshot value does not match the declared field type.
    SnapshotShape {
        field: String,
        expected: &'static str,
        found: Value,
    },
    /// A required field is absent from the snapshot and declares no default.
    MissingField { type_name: String, field: String },
    /// The field holds a child node (or a list of them), not a primitive
    /// value; use the child accessors instead.
    NonPrimitiveField { type_name: String, field: String },
    /// An ancestor-chain walk exceeded `limits::MAX_ANCESTOR_DEPTH`.
    AncestorDepthExceeded { depth: u32 },
    /// Snapshot encode/decode recursed past `limits::MAX_NODE_DEPTH`.
    NodeDepthExceeded { depth: u32 },
}

impl ModelError {
    pub fn code(&self) -> u32 {
        use error_codes::*;
        match self {
            ModelError::UnknownMember { .. } => UNKNOWN_MEMBER,
            ModelError::UnknownField { .. } => UNKNOWN_FIELD,
            ModelError::MutationOutsideProcedure { .. } => MUTATION_OUTSIDE_PROCEDURE,
            ModelError::SnapshotShape { .. } => SNAPSHOT_SHAPE,
            ModelError::MissingField { .. } => MISSING_FIELD,
            ModelError::NonPrimitiveField { .. } => NON_PRIMITIVE_FIELD,
            ModelError::AncestorDepthExceeded { .. } => ANCESTOR_DEPTH_EXCEEDED,
            ModelError::NodeDepthExceeded { .. } => NODE_DEPTH_EXCEEDED,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownMember { type_name, member } => {
                write!(f, "S{}: unknown member '{member}' on type '{type_name}'", self.code())
            }
            ModelError::UnknownField { type_name, field } => {
                write!(f, "S{}: unknown field '{field}' on type '{type_name}'", self.code())
            }
            ModelError::MutationOutsideProcedure { member } => {
                write!(
                    f,
                    "S{}: '{member}' may only be written from a procedure or accessor setter",
                    self.code()
                )
            }
            ModelError::SnapshotShape {
                field,
                expected,
                found,
            } => {
                write!(
                    f,
                    "S{}: field '{field}' expected {expected}, found {found}",
                    self.code()
                )
            }
            ModelError::MissingField { type_name, field } => {
                write!(
                    f,
                    "S{}: snapshot for '{type_name}' is missing required field '{field}'",
                    self.code()
                )
            }
            ModelError::NonPrimitiveField { type_name, field } => {
                write!(
                    f,
                    "S{}: field '{field}' on type '{type_name}' holds child nodes, not a primitive",
                    self.code()
                )
            }
            ModelError::AncestorDepthExceeded { depth } => {
                write!(f, "S{}: ancestor chain deeper than {depth} levels", self.code())
            }
            ModelError::NodeDepthExceeded { depth } => {
                write!(f, "S{}: node tree deeper than {depth} levels", self.code())
            }
        }
    }
}

impl std::error::Error for ModelError {}
