//! Injectable time source.
//!
//! Cache stamping and fetch-window math depend on "now"; tests substitute a
//! fixed clock instead of patching internals.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to one instant, for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    pub fn at_rfc3339(raw: &str) -> Self {
        let time = DateTime::parse_from_rfc3339(raw)
            .expect("valid RFC 3339 timestamp")
            .with_timezone(&Utc);
        FixedClock(time)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
