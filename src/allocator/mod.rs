//! Block allocators: sources of pre-reserved identifier ranges.

pub mod remote;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AllocationError, AllocationResult, SequenceError};
use crate::range::RangeSequence;
use crate::sequence::Sequence;

/// Reserves fresh identifier ranges on demand, potentially via I/O.
///
/// Every implementation hands out disjoint, consecutively increasing ranges:
/// a range's `upper` is the next range's `lower`, so the identifier space has
/// no holes between grants. The set of backing stores is open-ended (memory,
/// files, remote counter services); implementations carry the burden of I/O
/// so a [`BlockSequence`](crate::BlockSequence) in front of them does not.
#[async_trait]
pub trait BlockSequenceAllocator: Send + Sync {
    /// Reserves and returns the next contiguous range.
    ///
    /// # Errors
    ///
    /// Failure is recoverable: no identifiers are consumed, so the caller may
    /// retry without creating gaps or duplicates.
    async fn allocate(&self) -> AllocationResult<RangeSequence>;
}

/// Hands out consecutive fixed-size ranges with no persistence.
///
/// Call *k* (0-indexed) returns `[k * length, (k + 1) * length)`. Only useful
/// as a testing resource and as the reference semantics every other allocator
/// must match from the caller's point of view.
pub struct InMemoryBlockSequenceAllocator {
    length: u64,
    index: Mutex<u64>,
}

impl InMemoryBlockSequenceAllocator {
    /// Creates an allocator granting ranges of the given length.
    pub fn new(length: u64) -> Self {
        Self {
            length,
            index: Mutex::new(0),
        }
    }
}

#[async_trait]
impl BlockSequenceAllocator for InMemoryBlockSequenceAllocator {
    async fn allocate(&self) -> AllocationResult<RangeSequence> {
        let mut index = self
            .index
            .lock()
            .map_err(|e| AllocationError::Internal(format!("failed to acquire lock: {}", e)))?;

        let lower = *index;
        let upper = lower + self.length;
        *index = upper;
        Ok(RangeSequence::new(lower, upper))
    }
}

/// Adapts a unit-step [`Sequence`] into a block allocator.
///
/// Draws one value `v` from the underlying sequence per block and grants
/// `[v * block_size, (v + 1) * block_size)`. Pairing this with a persisted
/// counter (for example [`LockedFileSequence`](crate::LockedFileSequence))
/// yields a restart-safe allocator: one counter increment per block, and a
/// crashed process forfeits at most one block's unused tail.
///
/// The underlying sequence must advance by one per call; anything else
/// produces overlapping or disjoint grants.
pub struct SequenceBlockAllocator {
    sequence: Arc<dyn Sequence>,
    block_size: u64,
}

impl SequenceBlockAllocator {
    /// Creates an allocator drawing block starts from the given sequence.
    pub fn new(sequence: Arc<dyn Sequence>, block_size: u64) -> Self {
        Self {
            sequence,
            block_size,
        }
    }

    /// Returns the size of every granted block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}

#[async_trait]
impl BlockSequenceAllocator for SequenceBlockAllocator {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn allocate(&self) -> AllocationResult<RangeSequence> {
        let index = self
            .sequence
            .next()
            .await
            .map_err(|e| AllocationError::Sequence(Box::new(e)))?;

        let lower = index
            .checked_mul(self.block_size)
            .ok_or_else(|| AllocationError::Sequence(Box::new(SequenceError::Exhausted)))?;
        let upper = lower
            .checked_add(self.block_size)
            .ok_or_else(|| AllocationError::Sequence(Box::new(SequenceError::Exhausted)))?;

        Ok(RangeSequence::new(lower, upper))
    }
}
