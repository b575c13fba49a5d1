//! shiosai-core — domain vocabulary of the portal client.
//!
//! Action kinds and their three-phase protocol, working-state keys, the
//! error taxonomy and its fixed message catalog, cache validity policy, and
//! the datum/window arithmetic behind patient-data fetches. No I/O lives
//! here.

pub mod action;
pub mod cache;
pub mod clock;
pub mod datum;
pub mod error;
pub mod messages;
pub mod resource;
pub mod working;

pub use action::{Action, ActionKind, Capability, Meta, Phase};
pub use cache::{should_fetch, CacheEntry, CacheOptions};
pub use clock::{Clock, FixedClock, SystemClock};
pub use datum::{format_utc, FetchWindow};
pub use error::{ApiError, ApiResult, ErrorInfo};
pub use messages::map_error;
pub use working::{WorkingKey, WorkingState};
