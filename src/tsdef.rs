//! Core type aliases shared by every module.
//!
//! These mirror the id/coordinate/time primitives used throughout the
//! tree sequence literature: node ids are signed so that `-1` can serve
//! as a null sentinel, positions and times are integers in the caller's
//! own units.

/// Index into a node table, or into the sample list. Signed so that
/// `-1` can be used as a null/"not found" sentinel where needed.
pub type IdType = i32;

/// A 32-bit identifier used by callers that distinguish it from
/// [``IdType``] for documentation purposes (e.g. deme ids).
pub type TsInt = i32;

/// A genomic coordinate. `left < right` for every interval using this type.
pub type Position = i64;

/// A node birth time, measured in the input tree sequence's own units.
pub type Time = i64;
