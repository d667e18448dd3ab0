//! Crate-wide error taxonomy.
//!
//! Mirrors the way `forrustts` composes small, per-module `thiserror`
//! enums (`TablesError`, `NestedForwardListError`) into one top-level
//! error via `#[from]` conversions, rather than a single flat enum with
//! every possible variant spelled out by hand.

use crate::segment_pool::SegmentPoolError;
use crate::tables::TablesError;
use crate::tsdef::{IdType, Position};
use thiserror::Error;

/// Top-level error type returned by every fallible public operation in
/// this crate.
#[derive(Error, Debug, PartialEq)]
pub enum TsCoalError {
    /// The caller-supplied `sample` list is malformed: duplicates, or
    /// an id outside `0..num_nodes`.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The input tree sequence violates a structural invariant that
    /// [``crate::simplifier::Simplifier``] relies on.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    /// An arena or table allocation could not be satisfied.
    #[error("out of memory")]
    OutOfMemory,

    /// An invariant was violated that should never occur in a correct
    /// implementation (e.g. nonzero outstanding segments at the end of
    /// [``crate::simplifier::Simplifier::simplify``]).
    #[error("internal error: {reason}")]
    InternalError { reason: String },

    /// Forwarded from the table layer.
    #[error(transparent)]
    Tables(#[from] TablesError),

    /// Forwarded from the segment arena.
    #[error(transparent)]
    SegmentPool(#[from] SegmentPoolError),
}

impl TsCoalError {
    pub(crate) fn duplicate_sample(id: IdType) -> Self {
        TsCoalError::InvalidArgument {
            reason: format!("sample list contains duplicate id {}", id),
        }
    }

    pub(crate) fn sample_out_of_range(id: IdType, num_nodes: usize) -> Self {
        TsCoalError::InvalidArgument {
            reason: format!(
                "sample id {} is out of range for a tree sequence with {} nodes",
                id, num_nodes
            ),
        }
    }

    pub(crate) fn bad_edgeset(left: Position, right: Position) -> Self {
        TsCoalError::InvalidInput {
            reason: format!("edgeset has left={} >= right={}", left, right),
        }
    }

    pub(crate) fn empty_children(parent: IdType) -> Self {
        TsCoalError::InvalidInput {
            reason: format!("edgeset with parent {} has no children", parent),
        }
    }

    pub(crate) fn leaked_segments(outstanding: usize) -> Self {
        TsCoalError::InternalError {
            reason: format!(
                "{} segments remained allocated after simplify() returned",
                outstanding
            ),
        }
    }
}
