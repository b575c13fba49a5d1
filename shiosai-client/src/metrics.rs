//! Metrics side-channel fired after specific coordinator successes.

use serde_json::Value;
use std::sync::Mutex;

pub trait Metrics: Send + Sync {
    fn track(&self, event: &str, properties: Option<&Value>);
}

/// Emits tracking events as structured log records.
#[derive(Debug, Default)]
pub struct TracingMetrics;

impl Metrics for TracingMetrics {
    fn track(&self, event: &str, properties: Option<&Value>) {
        match properties {
            Some(properties) => tracing::info!(event, %properties, "metric"),
            None => tracing::info!(event, "metric"),
        }
    }
}

/// Swallows all events.
#[derive(Debug, Default)]
pub struct NullMetrics;

impl Metrics for NullMetrics {
    fn track(&self, _event: &str, _properties: Option<&Value>) {}
}

/// Records events for assertion in tests.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    events: Mutex<Vec<(String, Option<Value>)>>,
}

impl RecordingMetrics {
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn tracked(&self, event: &str) -> bool {
        self.events().iter().any(|(name, _)| name == event)
    }
}

impl Metrics for RecordingMetrics {
    fn track(&self, event: &str, properties: Option<&Value>) {
        match self.events.lock() {
            Ok(mut guard) => guard.push((event.to_string(), properties.cloned())),
            Err(poisoned) => poisoned
                .into_inner()
                .push((event.to_string(), properties.cloned())),
        }
    }
}
