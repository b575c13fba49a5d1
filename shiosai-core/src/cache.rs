//! Cache validity policy for previously fetched records.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// View over one cached resource: the stored record plus the instant the
/// entry stops being trusted.
#[derive(Debug, Clone, Copy)]
pub struct CacheEntry<'a> {
    pub record: Option<&'a Value>,
    pub cache_until: Option<DateTime<Utc>>,
}

impl<'a> CacheEntry<'a> {
    pub fn empty() -> Self {
        CacheEntry {
            record: None,
            cache_until: None,
        }
    }
}

/// Caller requirements for a read.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions<'a> {
    /// `false` forces a network fetch regardless of freshness.
    pub use_cache: bool,
    /// Fields that must be present and non-null on the cached record for the
    /// cache to satisfy the read (e.g. `settings` for a complete patient).
    pub required_fields: &'a [&'a str],
}

impl Default for CacheOptions<'_> {
    fn default() -> Self {
        CacheOptions {
            use_cache: true,
            required_fields: &[],
        }
    }
}

/// Decide whether a network fetch is required. Returns `false` (skip the
/// fetch) only when the entry exists, is unexpired, the caller did not opt
/// out of the cache, and every required field is present.
pub fn should_fetch(entry: CacheEntry<'_>, options: CacheOptions<'_>, now: DateTime<Utc>) -> bool {
    if !options.use_cache {
        return true;
    }
    let Some(record) = entry.record else {
        return true;
    };
    let Some(cache_until) = entry.cache_until else {
        return true;
    };
    if now >= cache_until {
        return true;
    }
    options
        .required_fields
        .iter()
        .any(|field| record.get(field).is_none_or(Value::is_null))
}
