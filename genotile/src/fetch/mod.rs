//! Asynchronous tile fetching.
//!
//! - [`TileSource`] - injected per data source, produces payload futures
//! - [`FetchCoordinator`] - at most one fetch per tile, applies results
//! - [`FetchError`] - source failures (logged, never propagated)

mod coordinator;
mod error;
mod source;

pub use coordinator::{Completion, FetchCoordinator, FetchOutcome, FetchStats};
pub use error::FetchError;
pub use source::{BoxFuture, FetchRequest, FnSource, TileSource};
