//! Content-addressed, disk-backed cache of analyzer results.

pub mod frame;
pub mod store;

pub use frame::{FrameError, STATUS_AGGREGATE_SCHEMA_TAG};
pub use store::{CacheError, EntryRecord, PersistedOrientation, PersistedSort, ResultCache, StatusAggregate};
