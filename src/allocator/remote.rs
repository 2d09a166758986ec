//! The remote counter service boundary and the block allocator built on it.
//!
//! A [`CounterService`] is any external store that can atomically hand out
//! the next unused counter value: bring a named counter up, advance it, tear
//! it down. Nothing else is assumed about the store. [`RemoteBlockAllocator`]
//! turns one such counter into a [`BlockSequenceAllocator`] by configuring
//! the counter to advance by a whole block per call, so each reservation
//! costs exactly one round trip.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::BlockSequenceAllocator;
use crate::config::CounterSpec;
use crate::error::{AllocationError, AllocationResult, ServiceError, ServiceResult};
use crate::range::RangeSequence;

/// External service holding named atomic counters.
///
/// The service is the single source of truth for each counter's progress;
/// callers keep no local counter state.
#[async_trait]
pub trait CounterService: Send + Sync {
    /// Brings up the counter described by `spec`.
    ///
    /// Implementations report [`ServiceError::AlreadyExists`] when a counter
    /// with this name was previously created; callers willing to adopt the
    /// existing counter treat that as success.
    async fn ensure_counter_exists(&self, spec: &CounterSpec) -> ServiceResult<()>;

    /// Atomically returns the counter's current value and advances it by the
    /// counter's configured increment.
    async fn next_value(&self, name: &str) -> ServiceResult<u64>;

    /// Tears the counter down.
    async fn drop_counter(&self, name: &str) -> ServiceResult<()>;
}

/// Reserves identifier blocks with one atomic fetch-and-advance per block.
///
/// The counter is configured to advance by `increment` (the block size), and
/// the value returned by each [`CounterService::next_value`] call becomes the
/// inclusive lower bound of a fresh block. Failed calls are never retried
/// here; retry policy belongs to the caller, which is safe because a failed
/// reservation consumes nothing.
pub struct RemoteBlockAllocator {
    service: Arc<dyn CounterService>,
    spec: CounterSpec,
}

impl RemoteBlockAllocator {
    /// Creates the allocator and brings up its backing counter.
    ///
    /// A counter that already exists is adopted as-is: the three-operation
    /// service boundary offers no way to read the existing configuration
    /// back, so it is assumed to match `spec` and the adoption is logged.
    /// All other setup failures propagate.
    pub async fn open(
        service: Arc<dyn CounterService>,
        spec: CounterSpec,
    ) -> AllocationResult<Self> {
        match service.ensure_counter_exists(&spec).await {
            Ok(()) => {}
            Err(ServiceError::AlreadyExists(_)) => {
                tracing::debug!(
                    counter = %spec.name,
                    increment = spec.increment,
                    "adopting existing counter, configuration assumed to match"
                );
            }
            Err(e) => return Err(AllocationError::Service(e)),
        }

        Ok(Self { service, spec })
    }

    /// Returns the size of every granted block.
    pub fn block_size(&self) -> u64 {
        self.spec.increment
    }

    /// Tears down the remote counter.
    ///
    /// A counter that is already gone counts as torn down.
    pub async fn close(&self) -> AllocationResult<()> {
        match self.service.drop_counter(&self.spec.name).await {
            Ok(()) | Err(ServiceError::NotFound(_)) => Ok(()),
            Err(e) => Err(AllocationError::Service(e)),
        }
    }
}

#[async_trait]
impl BlockSequenceAllocator for RemoteBlockAllocator {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn allocate(&self) -> AllocationResult<RangeSequence> {
        let lower = self
            .service
            .next_value(&self.spec.name)
            .await
            .map_err(AllocationError::Service)?;

        let upper = lower
            .checked_add(self.spec.increment)
            .ok_or_else(|| AllocationError::Internal("counter value space exhausted".to_string()))?;

        Ok(RangeSequence::new(lower, upper))
    }
}

struct CounterState {
    value: u64,
    increment: u64,
}

/// In-process [`CounterService`] for tests and single-process wiring.
pub struct InMemoryCounterService {
    counters: Mutex<HashMap<String, CounterState>>,
}

impl InMemoryCounterService {
    /// Creates a service with no counters.
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> ServiceResult<std::sync::MutexGuard<'_, HashMap<String, CounterState>>> {
        self.counters
            .lock()
            .map_err(|e| ServiceError::Unavailable(format!("failed to acquire lock: {}", e)))
    }
}

impl Default for InMemoryCounterService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterService for InMemoryCounterService {
    async fn ensure_counter_exists(&self, spec: &CounterSpec) -> ServiceResult<()> {
        let mut counters = self.lock()?;
        if counters.contains_key(&spec.name) {
            return Err(ServiceError::AlreadyExists(spec.name.clone()));
        }

        // The cache hint is meaningless in process; only the starting value
        // and step matter here.
        counters.insert(
            spec.name.clone(),
            CounterState {
                value: spec.initial,
                increment: spec.increment,
            },
        );
        Ok(())
    }

    async fn next_value(&self, name: &str) -> ServiceResult<u64> {
        let mut counters = self.lock()?;
        let state = counters
            .get_mut(name)
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))?;

        let value = state.value;
        state.value = value
            .checked_add(state.increment)
            .ok_or_else(|| ServiceError::Unavailable(format!("counter overflowed: {}", name)))?;
        Ok(value)
    }

    async fn drop_counter(&self, name: &str) -> ServiceResult<()> {
        let mut counters = self.lock()?;
        counters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    fn ids_spec(increment: u64) -> CounterSpec {
        CounterSpec {
            name: "ids".to_string(),
            increment,
            ..CounterSpec::default()
        }
    }

    /// Wraps a counter service and fails the next `next_value` call once.
    struct FailingCounterService {
        inner: InMemoryCounterService,
        fail_next: AtomicBool,
    }

    impl FailingCounterService {
        fn new() -> Self {
            Self {
                inner: InMemoryCounterService::new(),
                fail_next: AtomicBool::new(false),
            }
        }

        fn fail_once(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl CounterService for FailingCounterService {
        async fn ensure_counter_exists(&self, spec: &CounterSpec) -> ServiceResult<()> {
            self.inner.ensure_counter_exists(spec).await
        }

        async fn next_value(&self, name: &str) -> ServiceResult<u64> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(ServiceError::Unavailable("injected failure".to_string()));
            }
            self.inner.next_value(name).await
        }

        async fn drop_counter(&self, name: &str) -> ServiceResult<()> {
            self.inner.drop_counter(name).await
        }
    }

    #[tokio::test]
    async fn should_create_counter_once() {
        // given
        let service = InMemoryCounterService::new();

        // when
        let first = service.ensure_counter_exists(&ids_spec(10)).await;
        let second = service.ensure_counter_exists(&ids_spec(10)).await;

        // then
        assert_eq!(first, Ok(()));
        assert_eq!(second, Err(ServiceError::AlreadyExists("ids".to_string())));
    }

    #[tokio::test]
    async fn should_advance_counter_by_configured_increment() {
        // given
        let service = InMemoryCounterService::new();
        service.ensure_counter_exists(&ids_spec(10)).await.unwrap();

        // then
        assert_eq!(service.next_value("ids").await.unwrap(), 0);
        assert_eq!(service.next_value("ids").await.unwrap(), 10);
        assert_eq!(service.next_value("ids").await.unwrap(), 20);
    }

    #[tokio::test]
    async fn should_fail_next_value_for_unknown_counter() {
        // given
        let service = InMemoryCounterService::new();

        // when
        let result = service.next_value("missing").await;

        // then
        assert_eq!(result, Err(ServiceError::NotFound("missing".to_string())));
    }

    #[tokio::test]
    async fn should_start_at_configured_initial_value() {
        // given
        let service = InMemoryCounterService::new();
        let spec = CounterSpec {
            initial: 500,
            ..ids_spec(10)
        };
        service.ensure_counter_exists(&spec).await.unwrap();

        // then
        assert_eq!(service.next_value("ids").await.unwrap(), 500);
        assert_eq!(service.next_value("ids").await.unwrap(), 510);
    }

    #[tokio::test]
    async fn should_allocate_consecutive_blocks() {
        // given
        let service = Arc::new(InMemoryCounterService::new());
        let allocator = RemoteBlockAllocator::open(service, ids_spec(100))
            .await
            .unwrap();

        // when
        let first = allocator.allocate().await.unwrap();
        let second = allocator.allocate().await.unwrap();
        let third = allocator.allocate().await.unwrap();

        // then
        assert_eq!((first.lower(), first.upper()), (0, 100));
        assert_eq!((second.lower(), second.upper()), (100, 200));
        assert_eq!((third.lower(), third.upper()), (200, 300));
    }

    #[tokio::test]
    async fn should_adopt_existing_counter_on_open() {
        // given
        let service: Arc<dyn CounterService> = Arc::new(InMemoryCounterService::new());
        let first = RemoteBlockAllocator::open(Arc::clone(&service), ids_spec(100))
            .await
            .unwrap();
        first.allocate().await.unwrap();

        // when - a second process opens the same counter
        let second = RemoteBlockAllocator::open(Arc::clone(&service), ids_spec(100))
            .await
            .unwrap();
        let range = second.allocate().await.unwrap();

        // then - allocation continues where the first left off
        assert_eq!((range.lower(), range.upper()), (100, 200));
    }

    #[tokio::test]
    async fn should_surface_service_failure_without_advancing() {
        // given
        let service = Arc::new(FailingCounterService::new());
        let allocator = RemoteBlockAllocator::open(
            Arc::clone(&service) as Arc<dyn CounterService>,
            ids_spec(100),
        )
        .await
        .unwrap();

        // when
        service.fail_once();
        let failed = allocator.allocate().await;

        // then
        assert!(matches!(failed, Err(AllocationError::Service(_))));

        // and the retry reserves the block the failed call did not consume
        let range = allocator.allocate().await.unwrap();
        assert_eq!((range.lower(), range.upper()), (0, 100));
    }

    #[tokio::test]
    async fn should_tear_down_counter_idempotently() {
        // given
        let service = Arc::new(InMemoryCounterService::new());
        let allocator = RemoteBlockAllocator::open(service, ids_spec(100))
            .await
            .unwrap();

        // when
        let first = allocator.close().await;
        let second = allocator.close().await;

        // then - the second close sees the counter already gone
        assert_eq!(first, Ok(()));
        assert_eq!(second, Ok(()));
    }

    #[tokio::test]
    async fn should_fail_allocate_after_counter_dropped() {
        // given
        let service = Arc::new(InMemoryCounterService::new());
        let allocator = RemoteBlockAllocator::open(service, ids_spec(100))
            .await
            .unwrap();
        allocator.close().await.unwrap();

        // when
        let result = allocator.allocate().await;

        // then
        assert!(matches!(
            result,
            Err(AllocationError::Service(ServiceError::NotFound(_)))
        ));
    }
}
