//! Document store access layer
//!
//! Wraps one MongoDB client/database pair and exposes the fixed set of
//! operations the command dispatcher needs, including the three cached
//! aggregation pipeline slots.

pub mod adapter;
pub mod codec;
pub mod pipeline;
pub mod store;

pub use adapter::{CollectionEntry, DataAccess};
pub use pipeline::{PipelineSlot, SlotId};
pub use store::StoreHandle;
