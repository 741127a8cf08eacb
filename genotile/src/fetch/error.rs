//! Fetch errors.

use thiserror::Error;

/// Failure reported by a [`TileSource`](super::TileSource).
///
/// These never propagate past the coordinator: the tile reverts to `Empty`
/// and the failure is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The source could not be reached.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The source has no data for the range.
    #[error("No data for range {start}..{end}")]
    NotFound { start: u64, end: u64 },

    /// The source answered with something unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The source dropped the request without answering.
    #[error("Request dropped by source")]
    Dropped,
}
