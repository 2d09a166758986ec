//! Error types for sequence and block allocation operations.

use crate::serde::DeserializeError;

/// Error type for sequence operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceError {
    /// A fully consumed range was asked for another value.
    Exhausted,

    /// A persisted counter was used before `open()`.
    NotOpen,

    /// The persisted counter record is shorter than the fixed record width.
    TruncatedRecord(String),

    /// The backing file could not be opened, read, or written.
    Io(String),

    /// Refilling a block sequence failed.
    Allocation(AllocationError),
}

impl std::error::Error for SequenceError {}

impl std::fmt::Display for SequenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SequenceError::Exhausted => write!(f, "range exhausted"),
            SequenceError::NotOpen => write!(f, "sequence is not open"),
            SequenceError::TruncatedRecord(msg) => write!(f, "truncated counter record: {}", msg),
            SequenceError::Io(msg) => write!(f, "I/O error: {}", msg),
            SequenceError::Allocation(e) => write!(f, "allocation error: {}", e),
        }
    }
}

impl SequenceError {
    /// Converts an I/O failure to SequenceError::Io.
    pub fn from_io(e: impl std::fmt::Display) -> Self {
        SequenceError::Io(e.to_string())
    }
}

impl From<AllocationError> for SequenceError {
    fn from(err: AllocationError) -> Self {
        SequenceError::Allocation(err)
    }
}

impl From<DeserializeError> for SequenceError {
    fn from(err: DeserializeError) -> Self {
        SequenceError::TruncatedRecord(err.message)
    }
}

/// Result type alias for sequence operations.
pub type SequenceResult<T> = std::result::Result<T, SequenceError>;

/// Error type for block allocation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// The backing counter service rejected or failed the call.
    Service(ServiceError),

    /// Drawing the block start from an underlying sequence failed.
    Sequence(Box<SequenceError>),

    /// Internal errors indicating bugs or invariant violations.
    Internal(String),
}

impl std::error::Error for AllocationError {}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllocationError::Service(e) => write!(f, "counter service error: {}", e),
            AllocationError::Sequence(e) => write!(f, "sequence error: {}", e),
            AllocationError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl From<ServiceError> for AllocationError {
    fn from(err: ServiceError) -> Self {
        AllocationError::Service(err)
    }
}

/// Result type alias for block allocation operations.
pub type AllocationResult<T> = std::result::Result<T, AllocationError>;

/// Error type for counter service operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// A counter with this name already exists.
    AlreadyExists(String),

    /// No counter with this name exists.
    NotFound(String),

    /// The service could not be reached or failed internally.
    Unavailable(String),
}

impl std::error::Error for ServiceError {}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::AlreadyExists(name) => write!(f, "counter already exists: {}", name),
            ServiceError::NotFound(name) => write!(f, "no such counter: {}", name),
            ServiceError::Unavailable(msg) => write!(f, "counter service unavailable: {}", msg),
        }
    }
}

/// Result type alias for counter service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
