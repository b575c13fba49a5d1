//! shiosai — demo entry point: log in against a configured backend and pull
//! the account's patient data.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shiosai_core::clock::SystemClock;
use shiosai_core::working::WorkingKey;
use shiosai_store::Store;

use shiosai_client::{
    ClientConfig, FetchDataOptions, HttpApi, Metrics, NullMetrics, Portal, PortalApi,
    TracingMetrics,
};

#[tokio::main]
async fn main() {
    let config = ClientConfig::load(
        std::path::Path::new("config.yaml")
            .exists()
            .then_some("config.yaml"),
    )
    .unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {e}");
        ClientConfig::default()
    });

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log.level.clone())),
        )
        .init();

    tracing::info!(base_url = %config.api.base_url, "starting shiosai client");

    let api = match HttpApi::new(&config.api) {
        Ok(api) => api,
        Err(e) => {
            tracing::error!("Failed to build HTTP client: {e}");
            std::process::exit(1);
        }
    };
    let store = Arc::new(Store::new(Arc::new(SystemClock)).with_ttls(config.cache.ttls()));

    let email = std::env::var("SHIOSAI_EMAIL").unwrap_or_default();
    let password = std::env::var("SHIOSAI_PASSWORD").unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        tracing::error!("SHIOSAI_EMAIL and SHIOSAI_PASSWORD must be set");
        std::process::exit(1);
    }

    let origin = config.api.origin.clone();
    if config.metrics.enabled {
        run(Portal::new(api, store, TracingMetrics, origin), &email, &password).await;
    } else {
        run(Portal::new(api, store, NullMetrics, origin), &email, &password).await;
    }
}

async fn run<A: PortalApi, M: Metrics + 'static>(portal: Portal<A, M>, email: &str, password: &str) {
    portal.login(email, password).await;

    let state = portal.store().state();
    let Some(user_id) = state.logged_in_user_id.clone() else {
        let login = state.working(WorkingKey::LoggingIn);
        match login.notification {
            Some(notification) => tracing::error!(%notification, "login failed"),
            None => tracing::error!("login did not complete"),
        }
        std::process::exit(1);
    };
    tracing::info!(%user_id, "logged in");

    portal.fetch_patient(&user_id).await;
    portal
        .fetch_patient_data(FetchDataOptions::default(), &user_id)
        .await;

    let state = portal.store().state();
    for key in [WorkingKey::FetchingPatient, WorkingKey::FetchingPatientData] {
        let slot = state.working(key);
        match slot.notification {
            Some(notification) => tracing::warn!(key = key.as_str(), %notification, "failed"),
            None => tracing::info!(key = key.as_str(), "done"),
        }
    }
    if let Some(cached) = state.all_users.get(&user_id) {
        tracing::info!(
            record = %cached.record,
            cache_until = ?cached.cache_until,
            "patient record"
        );
    }
}
