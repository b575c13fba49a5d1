//! Async coordinators, grouped by backend capability.
//!
//! Each module extends [`crate::portal::Portal`] with the coordinator
//! methods for one area of the portal.

pub mod auth;
pub mod data;
pub mod invites;
pub mod patient;
pub mod prescriptions;
pub mod user;

#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use tokio::sync::mpsc::UnboundedReceiver;

    use shiosai_core::action::Action;
    use shiosai_core::clock::FixedClock;
    use shiosai_store::{AppState, Store};

    use crate::api::mock::MockApi;
    use crate::metrics::RecordingMetrics;
    use crate::portal::Portal;

    pub(crate) const ORIGIN: &str = "http://origin.test";
    pub(crate) const NOW: &str = "2018-02-01T00:00:00.000Z";

    pub(crate) fn portal() -> (
        Portal<MockApi, RecordingMetrics>,
        UnboundedReceiver<Action>,
    ) {
        portal_with_state(AppState::default())
    }

    pub(crate) fn portal_with_state(
        state: AppState,
    ) -> (
        Portal<MockApi, RecordingMetrics>,
        UnboundedReceiver<Action>,
    ) {
        let clock = Arc::new(FixedClock::at_rfc3339(NOW));
        let store = Arc::new(Store::with_state(clock, state));
        let actions = store.subscribe();
        let portal = Portal::new(MockApi::new(), store, RecordingMetrics::default(), ORIGIN);
        (portal, actions)
    }

    /// Collect every action dispatched so far without yielding to spawned
    /// tasks, so fire-and-forget sub-flows stay out of the picture exactly
    /// like a never-resolving stub would.
    pub(crate) fn drain(rx: &mut UnboundedReceiver<Action>) -> Vec<Action> {
        let mut actions = Vec::new();
        while let Ok(action) = rx.try_recv() {
            actions.push(action);
        }
        actions
    }

    pub(crate) fn kinds(actions: &[Action]) -> Vec<String> {
        actions.iter().map(|a| a.kind.to_string()).collect()
    }

    pub(crate) fn assert_kinds(actions: &[Action], expected: &[&str]) {
        assert_eq!(kinds(actions), expected);
    }
}
