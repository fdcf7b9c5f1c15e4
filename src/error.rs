//! Error types for the phase orchestration core.
//!
//! Only [`FlowError`] is ever surfaced to callers as a hard failure: it marks
//! a caller bug (a transition with no target).  Every other condition in this
//! module is absorbed where it is detected, logged, and degrades gracefully.
//!
//! ## Usage
//!
//! ```rust
//! use gameflow::error::{FlowError, FlowResult};
//!
//! fn require_target(target: Option<u32>) -> FlowResult<u32> {
//!     target.ok_or(FlowError::MissingTarget)
//! }
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::mode::ModeKind;

/// Hard failures of the phase state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// `change_state` was called without a target phase.
    MissingTarget,
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowError::MissingTarget => {
                write!(f, "invalid argument: change_state requires a target phase")
            }
        }
    }
}

impl std::error::Error for FlowError {}

/// Convenience alias: a `Result` using `FlowError` as the error type.
pub type FlowResult<T> = Result<T, FlowError>;

/// Failures reported by a storage backend.
///
/// A missing record is *not* an error; backends report it as `Ok(None)`.
#[derive(Debug)]
pub enum PersistenceError {
    /// Reading or writing the durable blob failed.
    Io {
        /// Location of the blob being accessed.
        path: PathBuf,
        source: std::io::Error,
    },
    /// The in-memory record could not be serialized.
    Encode(String),
    /// The stored blob exists but could not be decoded into a record.
    Decode(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io { path, source } => {
                write!(f, "storage i/o failed at {}: {}", path.display(), source)
            }
            PersistenceError::Encode(msg) => write!(f, "failed to encode record: {msg}"),
            PersistenceError::Decode(msg) => write!(f, "failed to decode record: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// An overlay was handed a pause context it does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayError {
    ContextMismatch {
        /// Mode the overlay was built for.
        expected: ModeKind,
        /// Mode of the context it actually received.
        found: ModeKind,
    },
}

impl fmt::Display for OverlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverlayError::ContextMismatch { expected, found } => write!(
                f,
                "overlay expects a {} pause context but received {}",
                expected.label(),
                found.label()
            ),
        }
    }
}

impl std::error::Error for OverlayError {}
