//! shiosai-store — the portal's predictable state container.
//!
//! A single `AppState` snapshot, a reducer as the only mutation path, and a
//! store that serializes dispatches and publishes the action stream to
//! subscribers.

pub mod reducer;
pub mod state;
pub mod store;

pub use reducer::{reduce, CacheTtls};
pub use state::{AppState, CachedRecord, DataState};
pub use store::Store;
