//! Approximate lookups.
//!
//! When exact data for a range is missing, the best committed data at other
//! resolutions stands in. [`ApproximateIndex`] answers "what covers this
//! range", [`RangeCache`] layers exact keys, request deduplication and a
//! rate-limited `get` on top.

mod cache;
mod index;
mod range_set;
mod throttle;

pub use cache::{RangeCache, RangeHit};
pub use index::{ApproximateIndex, ApproximateMatch, RangeKey};
pub use range_set::RangeSet;
pub use throttle::Throttle;
