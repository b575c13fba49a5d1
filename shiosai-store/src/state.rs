//! Application state snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use shiosai_core::cache::CacheEntry;
use shiosai_core::working::{WorkingKey, WorkingState};

/// A cached user/patient record plus its freshness stamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedRecord {
    pub record: Value,
    pub cache_until: Option<DateTime<Utc>>,
}

/// Freshness bookkeeping for the patient-data slice. The datum sequences
/// themselves live in the background data worker; the store only tracks
/// which patient was fetched and until when the fetch is trusted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataState {
    pub cache_until: Option<DateTime<Utc>>,
    pub fetched_patient_id: Option<String>,
}

/// One synchronized snapshot of client state. Mutated exclusively by the
/// reducer in response to dispatched actions.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub logged_in_user_id: Option<String>,
    /// Every user/patient record seen so far, keyed by id.
    pub all_users: HashMap<String, CachedRecord>,
    pub pending_sent_invites: Vec<Value>,
    pub pending_received_invites: Vec<Value>,
    pub associated_accounts: Option<Value>,
    pub prescriptions: Vec<Value>,
    pub devices: Vec<Value>,
    pub data_sources: Vec<Value>,
    pub data: DataState,
    pub working: HashMap<WorkingKey, WorkingState>,
    /// Mirror of the navigation layer's current path, updated by `Navigate`
    /// actions. Read for stale-response detection.
    pub pathname: String,
}

impl AppState {
    pub fn working(&self, key: WorkingKey) -> WorkingState {
        self.working.get(&key).cloned().unwrap_or_default()
    }

    /// Whether the given patient is the one currently in view, judged from
    /// the path mirror at the moment of the call.
    pub fn viewing_patient(&self, patient_id: &str) -> bool {
        self.pathname
            .split('/')
            .any(|segment| segment == patient_id)
    }

    pub fn cached_user(&self, user_id: &str) -> CacheEntry<'_> {
        match self.all_users.get(user_id) {
            Some(cached) => CacheEntry {
                record: Some(&cached.record),
                cache_until: cached.cache_until,
            },
            None => CacheEntry::empty(),
        }
    }

    pub fn logged_in_user(&self) -> Option<&Value> {
        let id = self.logged_in_user_id.as_deref()?;
        self.all_users.get(id).map(|cached| &cached.record)
    }
}
