//! Unified error types for the MELD node firmware.
//!
//! Every variant is `Copy` so it can cross the HAL boundary and be logged
//! without allocation.  None of these are fatal: the business layer logs
//! them and keeps the node on a usable ready screen.

use core::fmt;

// ---------------------------------------------------------------------------
// HAL errors
// ---------------------------------------------------------------------------

/// Failure reported by a HAL read path.
///
/// "Nothing to read right now" is **not** an error: polls return
/// `Ok(None)` (or a zero length) for that case.  `HalError` is reserved for
/// a backend that cannot answer at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// The subsystem's `init` has not been called on this backend.
    NotInitialized,
    /// The underlying driver or host relay failed.
    Io,
    /// The backend does not implement this operation.
    Unsupported,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "subsystem not initialized"),
            Self::Io => write!(f, "I/O error"),
            Self::Unsupported => write!(f, "operation unsupported"),
        }
    }
}

// ---------------------------------------------------------------------------
// Key-value engine errors
// ---------------------------------------------------------------------------

/// Errors from a [`KvStore`](crate::app::ports::KvStore) engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    Io,
    /// Key is empty or contains non-ASCII bytes.
    InvalidKey,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::Io => write!(f, "I/O error"),
            Self::InvalidKey => write!(f, "invalid key"),
        }
    }
}

impl From<StorageError> for HalError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidKey => Self::Unsupported,
            StorageError::NotFound | StorageError::Full | StorageError::Io => Self::Io,
        }
    }
}

// ---------------------------------------------------------------------------
// Scenario parser errors (simulation harness)
// ---------------------------------------------------------------------------

/// Why a scenario line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioErrorKind {
    MissingTime,
    BadNumber,
    BadHex,
    UidTooLong,
    UnknownDirective,
    BadTouchKind,
    BadConfig,
}

/// A rejected scenario line, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioError {
    pub line: usize,
    pub kind: ScenarioErrorKind,
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.kind {
            ScenarioErrorKind::MissingTime => "expected `at <ms>` or `run <ms>`",
            ScenarioErrorKind::BadNumber => "invalid number",
            ScenarioErrorKind::BadHex => "uid must be an even number of hex digits",
            ScenarioErrorKind::UidTooLong => "uid longer than 7 bytes",
            ScenarioErrorKind::UnknownDirective => "unknown directive",
            ScenarioErrorKind::BadTouchKind => "touch kind must be down, move or up",
            ScenarioErrorKind::BadConfig => "config is not a valid ritual config",
        };
        write!(f, "scenario line {}: {}", self.line, reason)
    }
}

impl std::error::Error for ScenarioError {}
