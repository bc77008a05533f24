//! Strip layout persistence
//!
//! The router publishes a [`LayoutSnapshot`] after every binding or colour
//! change; the [`PersistenceActor`] coalesces them into sled writes.

mod persistence;
pub mod persistence_actor;

pub use persistence::{LayoutSnapshot, StripConfig};
pub use persistence_actor::{PersistenceActor, PersistenceActorHandle, DEFAULT_DEBOUNCE_MS};
