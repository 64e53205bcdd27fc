//! Sysmon event collections
//!
//! - `event`: raw rows, canonical events and the two named collections
//! - `normalizer`: alias-driven mapping from raw rows to events
//! - `store`: CSV-backed, read-only loading of each collection

pub mod event;
pub mod normalizer;
pub mod store;

pub use event::{Collection, Event, RawRow, UnknownCollection, MISSING_MESSAGE, UNKNOWN_PROCESS};
pub use normalizer::normalize;
pub use store::{read_events, EventStore, StoreError};
