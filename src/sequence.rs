//! The sequence capability and its in-memory implementation.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::error::{SequenceError, SequenceResult};

/// A source of strictly ascending `u64` identifiers.
///
/// Implementations may have gaps between issued values and may begin at
/// values other than zero; the only promise is that no value is ever issued
/// twice within one backing state, even across process restarts when the
/// implementation persists progress.
#[async_trait]
pub trait Sequence: Send + Sync {
    /// Issues the next identifier.
    ///
    /// # Errors
    ///
    /// Fails when no further value can be produced, for instance when the
    /// identifier space is spent or a backing resource is unavailable.
    async fn next(&self) -> SequenceResult<u64>;
}

/// Process-local sequence backed by an atomic counter.
///
/// Lock-free and safe to share across tasks, but holds no persistent state:
/// a restart begins again at the starting value. Useful for tests and for
/// hosts that scope identifier uniqueness to a single process lifetime.
pub struct AtomicSequence {
    counter: AtomicU64,
}

impl AtomicSequence {
    /// Creates a sequence starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a sequence starting at the given value.
    pub fn starting_at(value: u64) -> Self {
        Self {
            counter: AtomicU64::new(value),
        }
    }
}

impl Default for AtomicSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sequence for AtomicSequence {
    async fn next(&self) -> SequenceResult<u64> {
        // fetch_add returns the previous value; Relaxed is enough since only
        // atomicity matters here, not ordering against other memory.
        let value = self.counter.fetch_add(1, Ordering::Relaxed);
        if value == u64::MAX {
            // The counter wrapped; put it back so later calls keep failing
            // instead of reissuing values.
            self.counter.store(u64::MAX, Ordering::Relaxed);
            return Err(SequenceError::Exhausted);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn should_issue_ascending_values_from_zero() {
        // given
        let sequence = AtomicSequence::new();

        // then
        for expected in 0..1000 {
            assert_eq!(sequence.next().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn should_start_at_given_value() {
        // given
        let sequence = AtomicSequence::starting_at(100);

        // then
        assert_eq!(sequence.next().await.unwrap(), 100);
        assert_eq!(sequence.next().await.unwrap(), 101);
    }

    #[tokio::test]
    async fn should_fail_when_identifier_space_is_spent() {
        // given
        let sequence = AtomicSequence::starting_at(u64::MAX);

        // when
        let result = sequence.next().await;

        // then
        assert_eq!(result, Err(SequenceError::Exhausted));
        assert_eq!(sequence.next().await, Err(SequenceError::Exhausted));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_issue_unique_values_to_concurrent_tasks() {
        // given
        let sequence = Arc::new(AtomicSequence::new());

        // when
        let mut handles = Vec::new();
        for _ in 0..10 {
            let sequence = Arc::clone(&sequence);
            handles.push(tokio::spawn(async move {
                let mut values = Vec::with_capacity(100);
                for _ in 0..100 {
                    values.push(sequence.next().await.unwrap());
                }
                values
            }));
        }

        let mut all_values = Vec::new();
        for handle in handles {
            all_values.extend(handle.await.unwrap());
        }

        // then
        all_values.sort_unstable();
        all_values.dedup();
        assert_eq!(all_values.len(), 1000);
    }
}
