//! shiosai-client — coordination layer of the portal client.
//!
//! The injected API collaborator boundary (reqwest implementation and a
//! programmable mock), the async coordinators driving the three-phase action
//! protocol, the metrics/navigation side channels, and YAML configuration.

pub mod api;
pub mod config;
pub mod coordinators;
pub mod metrics;
pub mod portal;

pub use api::http::HttpApi;
pub use api::mock::MockApi;
pub use api::{DataQuery, PortalApi};
pub use config::{ClientConfig, ConfigError};
pub use coordinators::data::FetchDataOptions;
pub use metrics::{Metrics, NullMetrics, RecordingMetrics, TracingMetrics};
pub use portal::Portal;
