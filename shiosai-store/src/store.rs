//! The state container.
//!
//! Coordinators never touch state directly: they dispatch actions, the store
//! reduces them synchronously under a writer lock, and interested parties
//! (the UI layer, tests) observe the action stream through a subscription
//! channel.

use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::mpsc;

use shiosai_core::action::Action;
use shiosai_core::clock::Clock;

use crate::reducer::{reduce, CacheTtls};
use crate::state::AppState;

pub struct Store {
    state: RwLock<AppState>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Action>>>,
    clock: Arc<dyn Clock>,
    ttls: CacheTtls,
}

impl Store {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Store::with_state(clock, AppState::default())
    }

    /// Start from a pre-populated snapshot (application boot, tests).
    pub fn with_state(clock: Arc<dyn Clock>, state: AppState) -> Self {
        Store {
            state: RwLock::new(state),
            subscribers: Mutex::new(Vec::new()),
            clock,
            ttls: CacheTtls::default(),
        }
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Reduce the action into state, then fan it out to subscribers.
    /// Dispatches are serialized by the writer lock and observed in arrival
    /// order.
    pub fn dispatch(&self, action: Action) {
        {
            let mut state = match self.state.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            reduce(&mut state, &action, self.clock.now(), self.ttls);
        }
        tracing::debug!(kind = %action.kind, "dispatched");

        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers.retain(|tx| tx.send(action.clone()).is_ok());
    }

    /// Observe every dispatched action from this point on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Action> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut guard) => guard.push(tx),
            Err(poisoned) => poisoned.into_inner().push(tx),
        }
        rx
    }

    /// A point-in-time snapshot of state.
    pub fn state(&self) -> AppState {
        match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
