//! The one error enum crossing every component boundary. Every kind named
//! in the error-handling design is an explicit variant — callers match on
//! `CoreError`, never on a formatted message.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("concurrency conflict on trip {trip_id}: expected version {expected_version}, found {found_version}")]
    ConcurrencyConflict {
        trip_id: String,
        expected_version: u64,
        found_version: u64,
    },

    #[error("reservation expired for driver {0}")]
    ReservationExpired(String),

    #[error("no drivers available: {0}")]
    NoDrivers(String),

    #[error("subscription terminated: slow consumer ({dropped} dropped)")]
    SlowConsumer { dropped: u64 },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("unavailable after retries: {0}")]
    Unavailable(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Whether this error is safe to retry internally (transient), per the
    /// propagation policy: concurrency conflicts get one reload-and-retry,
    /// `unavailable` is itself the terminal shape of an exhausted retry loop,
    /// and everything else surfaces immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. } | Self::Unavailable(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
