pub mod allocator;
pub mod block;
pub mod config;
pub mod counter;
pub mod error;
pub mod range;
pub mod sequence;
pub mod serde;

pub use allocator::remote::{CounterService, InMemoryCounterService, RemoteBlockAllocator};
pub use allocator::{
    BlockSequenceAllocator, InMemoryBlockSequenceAllocator, SequenceBlockAllocator,
};
pub use block::{AllocationPolicy, BlockSequence};
pub use config::{CounterSpec, DEFAULT_CACHE_SIZE};
pub use counter::{FileSequence, LockedFileSequence};
pub use error::{
    AllocationError, AllocationResult, SequenceError, SequenceResult, ServiceError, ServiceResult,
};
pub use range::RangeSequence;
pub use sequence::{AtomicSequence, Sequence};
pub use serde::{CounterRecord, DeserializeError};
