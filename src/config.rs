//! Configuration for counter-backed allocation.

/// Default number of values a counter service may pre-reserve per round trip.
pub const DEFAULT_CACHE_SIZE: u32 = 100;

/// Describes a named counter held by a
/// [`CounterService`](crate::CounterService).
///
/// # Example
///
/// ```ignore
/// use open_sequence::CounterSpec;
///
/// let spec = CounterSpec {
///     name: "order-ids".to_string(),
///     increment: 1000,
///     ..CounterSpec::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    /// Name identifying the counter within the service.
    pub name: String,

    /// First value the counter will hand out.
    pub initial: u64,

    /// Amount the counter advances on every `next_value` call.
    ///
    /// A [`RemoteBlockAllocator`](crate::RemoteBlockAllocator) sets this to
    /// its block size, so a single fetch-and-advance reserves a whole block.
    pub increment: u64,

    /// Number of values the service may pre-reserve internally per round
    /// trip.
    ///
    /// Purely a hint; services without internal caching ignore it.
    pub cache_size: u32,
}

impl Default for CounterSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            initial: 0,
            increment: 1,
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}
