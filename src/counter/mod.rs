//! Persisted counters backed by a fixed-width record in a file.
//!
//! Both counters store a single [`CounterRecord`](crate::serde::CounterRecord)
//! — the next value to issue — as 8 big-endian bytes at offset 0 of their
//! backing file, and advance it with a read-modify-write per call:
//!
//! ```text
//! | next value (u64 BE) |
//! ```
//!
//! [`FileSequence`] assumes one process owns the file and relies on its
//! internal mutex alone. [`LockedFileSequence`] additionally wraps every
//! read-modify-write in an exclusive advisory lock so independent processes
//! pointed at the same file share one counter without double-issuing.

pub mod file;
pub mod locked;

pub use file::FileSequence;
pub use locked::LockedFileSequence;
