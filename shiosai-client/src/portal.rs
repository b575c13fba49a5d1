//! The coordinator host.
//!
//! [`Portal`] owns the injected API collaborator, the state container and
//! the metrics sink; every async coordinator is a method on it (see the
//! `coordinators` modules). Coordinators follow one discipline: dispatch the
//! REQUEST before any network call, dispatch exactly one terminal SUCCESS or
//! FAILURE per logical operation, and never mutate state directly.

use std::sync::Arc;

use shiosai_core::action::{Action, Capability};
use shiosai_core::error::ApiError;
use shiosai_core::messages::map_error;
use shiosai_store::Store;

use crate::api::PortalApi;
use crate::metrics::Metrics;

pub struct Portal<A, M> {
    pub(crate) api: Arc<A>,
    pub(crate) store: Arc<Store>,
    pub(crate) metrics: Arc<M>,
    pub(crate) origin: String,
}

impl<A, M> Clone for Portal<A, M> {
    fn clone(&self) -> Self {
        Portal {
            api: Arc::clone(&self.api),
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
            origin: self.origin.clone(),
        }
    }
}

impl<A: PortalApi, M: Metrics + 'static> Portal<A, M> {
    pub fn new(api: A, store: Arc<Store>, metrics: M, origin: impl Into<String>) -> Self {
        Portal {
            api: Arc::new(api),
            store,
            metrics: Arc::new(metrics),
            origin: origin.into(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    pub(crate) fn dispatch(&self, action: Action) {
        self.store.dispatch(action);
    }

    pub(crate) fn navigate(&self, path: &str) {
        self.dispatch(Action::navigate(path));
    }

    pub(crate) fn track(&self, event: &str) {
        self.metrics.track(event, None);
    }

    /// Map a collaborator error through the taxonomy and dispatch the
    /// capability's FAILURE action.
    pub(crate) fn fail(&self, capability: Capability, err: &ApiError) {
        let error = map_error(capability, Some(err));
        if let Some(error) = &error {
            tracing::warn!(
                capability = capability.as_str(),
                status = err.status,
                "{}",
                error.message
            );
        }
        self.dispatch(Action::failure(capability, error, Some(err.to_value())));
    }
}
