//! Arena allocation for [``crate::segment::Segment``].
//!
//! This plays the role that `forrustts::nested_forward_list` plays for
//! edge buffering: a flat `Vec`-backed store that avoids the cycles
//! and per-node heap allocation of a naive doubly-linked list. Unlike
//! `NestedForwardList`, individual segments here are freed and reused,
//! so the arena keeps its own free list rather than only ever growing.

use crate::segment::Segment;
use crate::tsdef::{IdType, Position};
use thiserror::Error;

/// Error type for [``SegmentPool``] operations.
#[derive(Error, Debug, PartialEq)]
pub enum SegmentPoolError {
    /// Used for invalid segment index values.
    #[error("invalid segment id")]
    InvalidId,
}

pub type Result<T> = std::result::Result<T, SegmentPoolError>;

/// An index into a [``SegmentPool``] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(u32);

/// Arena allocator for ancestry segments.
///
/// Tracks an "outstanding" counter that must return to zero once a
/// simplification run is finished: this is the leak-free invariant of
/// spec §8.
pub struct SegmentPool {
    slots: Vec<Option<Segment>>,
    free_list: Vec<SegmentId>,
    outstanding: usize,
}

impl SegmentPool {
    pub fn new() -> Self {
        SegmentPool {
            slots: Vec::new(),
            free_list: Vec::new(),
            outstanding: 0,
        }
    }

    /// Allocate a new segment with the given interval and output node,
    /// returning the id used to refer to it.
    pub fn alloc(&mut self, left: Position, right: Position, node: IdType) -> SegmentId {
        let seg = Segment::new(left, right, node);
        let id = if let Some(id) = self.free_list.pop() {
            self.slots[id.0 as usize] = Some(seg);
            id
        } else {
            self.slots.push(Some(seg));
            SegmentId((self.slots.len() - 1) as u32)
        };
        self.outstanding += 1;
        id
    }

    /// Free a previously-allocated segment. Each allocation must be
    /// freed exactly once.
    pub fn free(&mut self, id: SegmentId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(SegmentPoolError::InvalidId)?;
        if slot.take().is_none() {
            return Err(SegmentPoolError::InvalidId);
        }
        self.free_list.push(id);
        self.outstanding -= 1;
        Ok(())
    }

    pub fn get(&self, id: SegmentId) -> Result<&Segment> {
        self.slots
            .get(id.0 as usize)
            .and_then(|s| s.as_ref())
            .ok_or(SegmentPoolError::InvalidId)
    }

    pub fn get_mut(&mut self, id: SegmentId) -> Result<&mut Segment> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(|s| s.as_mut())
            .ok_or(SegmentPoolError::InvalidId)
    }

    /// Number of live (allocated, not yet freed) segments.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl Default for SegmentPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test_segment_pool {
    use super::*;

    #[test]
    fn test_alloc_free_roundtrip() {
        let mut pool = SegmentPool::new();
        let a = pool.alloc(0, 10, 0);
        assert_eq!(pool.outstanding(), 1);
        let b = pool.alloc(10, 20, 1);
        assert_eq!(pool.outstanding(), 2);
        pool.free(a).unwrap();
        assert_eq!(pool.outstanding(), 1);
        pool.free(b).unwrap();
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_free_reuses_slots() {
        let mut pool = SegmentPool::new();
        let a = pool.alloc(0, 1, 0);
        pool.free(a).unwrap();
        let b = pool.alloc(1, 2, 1);
        // The freed slot should be recycled rather than growing the arena.
        assert_eq!(pool.slots.len(), 1);
        assert_eq!(pool.get(b).unwrap().left, 1);
    }

    #[test]
    fn test_double_free_errors() {
        let mut pool = SegmentPool::new();
        let a = pool.alloc(0, 1, 0);
        pool.free(a).unwrap();
        assert!(pool.free(a).is_err());
    }

    #[test]
    fn test_get_after_free_errors() {
        let mut pool = SegmentPool::new();
        let a = pool.alloc(0, 1, 0);
        pool.free(a).unwrap();
        assert!(pool.get(a).is_err());
    }
}
