//! Feed payload model and normalization.
//!
//! - [`payload`] - Typed, lenient view of the upstream centers/events JSON
//! - [`normalizer`] - Depth-3 flatten into [`DisplayItem`]s
//! - [`item`] - The normalized display unit

mod item;
mod normalizer;
mod payload;

pub use item::DisplayItem;
pub use normalizer::normalize;
pub use payload::{Center, Event, EventGroup, FeedPayload, PayloadError};
