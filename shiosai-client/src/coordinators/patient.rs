//! Patient record, preferences and settings coordinators.

use serde_json::{json, Value};

use shiosai_core::action::{Action, Capability};
use shiosai_core::cache::{should_fetch, CacheOptions};
use shiosai_core::datum::format_utc;
use shiosai_core::error::ErrorInfo;
use shiosai_core::messages::{self, map_error};
use shiosai_core::resource;

use crate::api::{MetadataApi, PatientApi, PortalApi};
use crate::metrics::Metrics;
use crate::portal::Portal;

/// Fields a cached patient record must carry to satisfy a complete read.
const COMPLETE_PATIENT_FIELDS: [&str; 1] = ["settings"];

impl<A: PortalApi, M: Metrics + 'static> Portal<A, M> {
    /// Fetch a patient record, serving a fresh, complete cache entry without
    /// touching the network (a lone SUCCESS, no REQUEST).
    pub async fn fetch_patient(&self, patient_id: &str) {
        let state = self.store.state();
        let entry = state.cached_user(patient_id);
        let options = CacheOptions {
            use_cache: true,
            required_fields: &COMPLETE_PATIENT_FIELDS,
        };
        if !should_fetch(entry, options, self.store.now()) {
            let record = entry.record.cloned().unwrap_or(Value::Null);
            tracing::debug!(patient_id, "patient record served from cache");
            self.dispatch(Action::success_with(
                Capability::FetchPatient,
                json!({ "patient": record }),
            ));
            return;
        }

        self.dispatch(Action::request(Capability::FetchPatient));
        match self.api.get_patient(patient_id).await {
            Ok(patient) => self.dispatch(Action::success_with(
                Capability::FetchPatient,
                json!({ "patient": patient }),
            )),
            Err(err) => {
                let own_record = state.logged_in_user_id.as_deref() == Some(patient_id);
                let (error, link) = if err.status == 404 && own_record {
                    // The account exists but data storage was never set up;
                    // the payload carries the setup link for the UI.
                    (
                        Some(ErrorInfo::with_status(
                            messages::ERR_YOUR_ACCOUNT_NOT_CONFIGURED,
                            404,
                        )),
                        json!({
                            "to": "/patients/new",
                            "text": messages::YOUR_ACCOUNT_DATA_SETUP,
                        }),
                    )
                } else {
                    (map_error(Capability::FetchPatient, Some(&err)), Value::Null)
                };
                self.dispatch(Action::failure_with(
                    Capability::FetchPatient,
                    error,
                    Some(json!({ "link": link })),
                    Some(err.to_value()),
                ));
            }
        }
    }

    /// Create the patient record (data storage account) for the logged-in
    /// user and enter its data view.
    pub async fn setup_data_storage(&self, patient: Value) {
        let logged_in_user_id = self.store.state().logged_in_user_id;
        self.dispatch(Action::request(Capability::SetupDataStorage));
        match self.api.create_patient(&patient).await {
            Err(err) => self.fail(Capability::SetupDataStorage, &err),
            Ok(created) => {
                self.dispatch(Action::success_with(
                    Capability::SetupDataStorage,
                    json!({ "userId": logged_in_user_id, "patient": created }),
                ));
                self.track("Created Profile");
                if let Some(id) = resource::record_id(&created) {
                    self.navigate(&format!("/patients/{id}/data"));
                }
            }
        }
    }

    pub async fn update_patient(&self, patient: Value) {
        self.dispatch(Action::request(Capability::UpdatePatient));
        match self.api.update_patient(&patient).await {
            Err(err) => self.fail(Capability::UpdatePatient, &err),
            Ok(updated) => {
                self.dispatch(Action::success_with(
                    Capability::UpdatePatient,
                    json!({ "updatedPatient": updated }),
                ));
                self.track("Updated Profile");
            }
        }
    }

    pub async fn update_preferences(&self, patient_id: &str, preferences: Value) {
        self.dispatch(Action::request(Capability::UpdatePreferences));
        match self.api.put_preferences(patient_id, &preferences).await {
            Ok(updated) => self.dispatch(Action::success_with(
                Capability::UpdatePreferences,
                json!({ "updatedPreferences": updated }),
            )),
            Err(err) => self.fail(Capability::UpdatePreferences, &err),
        }
    }

    pub async fn fetch_settings(&self, patient_id: &str) {
        self.dispatch(Action::request(Capability::FetchSettings));
        match self.api.get_settings(patient_id).await {
            Ok(settings) => self.dispatch(Action::success_with(
                Capability::FetchSettings,
                json!({ "settings": settings }),
            )),
            Err(err) => self.fail(Capability::FetchSettings, &err),
        }
    }

    /// Write device settings. A payload touching `units.bg` additionally
    /// drives the paired blood-glucose-units triple: both resolve together
    /// on the single underlying call.
    pub async fn update_settings(&self, patient_id: &str, settings: Value) {
        let updating_bg_units = settings
            .pointer("/units/bg")
            .is_some_and(|units| !units.is_null());

        self.dispatch(Action::request(Capability::UpdateSettings));
        if updating_bg_units {
            self.dispatch(Action::request(Capability::UpdatePatientBgUnits));
        }
        match self.api.put_settings(patient_id, &settings).await {
            Ok(updated) => {
                let payload = json!({ "userId": patient_id, "updatedSettings": updated });
                self.dispatch(Action::success_with(Capability::UpdateSettings, payload.clone()));
                if updating_bg_units {
                    self.dispatch(Action::success_with(
                        Capability::UpdatePatientBgUnits,
                        payload,
                    ));
                }
            }
            Err(err) => {
                self.fail(Capability::UpdateSettings, &err);
                if updating_bg_units {
                    self.fail(Capability::UpdatePatientBgUnits, &err);
                }
            }
        }
    }

    pub async fn dismiss_donate_banner(&self, patient_id: &str) {
        self.banner_preference(patient_id, "donate", "dismissedDonateYourDataBannerTime")
            .await;
    }

    pub async fn dismiss_dexcom_connect_banner(&self, patient_id: &str) {
        self.banner_preference(patient_id, "dexcom", "dismissedDexcomConnectBannerTime")
            .await;
    }

    pub async fn click_dexcom_connect_banner(&self, patient_id: &str) {
        self.banner_preference(patient_id, "dexcom", "clickedDexcomConnectBannerTime")
            .await;
    }

    pub async fn dismiss_share_data_banner(&self, patient_id: &str) {
        self.banner_preference(patient_id, "sharedata", "dismissedShareDataBannerTime")
            .await;
    }

    pub async fn click_share_data_banner(&self, patient_id: &str) {
        self.banner_preference(patient_id, "sharedata", "clickedShareDataBannerTime")
            .await;
    }

    /// Banner interactions dismiss the banner immediately and persist the
    /// interaction time as a preference.
    async fn banner_preference(&self, patient_id: &str, banner: &str, preference_key: &str) {
        self.dispatch(Action::dismiss_banner(banner));
        let stamped = json!({ preference_key: format_utc(self.store.now()) });
        self.update_preferences(patient_id, stamped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinators::testutil::{assert_kinds, drain, portal, portal_with_state, NOW};
    use chrono::{DateTime, Duration, Utc};
    use shiosai_store::{AppState, CachedRecord};

    fn cached_state(patient: Value, cache_offset_hours: i64) -> AppState {
        let now = DateTime::parse_from_rfc3339(NOW).unwrap().with_timezone(&Utc);
        let mut state = AppState::default();
        let id = resource::record_id(&patient).unwrap();
        state.all_users.insert(
            id,
            CachedRecord {
                record: patient,
                cache_until: Some(now + Duration::hours(cache_offset_hours)),
            },
        );
        state
    }

    #[tokio::test]
    async fn test_fetch_patient_success() {
        let (portal, mut rx) = portal();
        let patient = json!({ "id": 58686, "name": "Buddy Holly", "age": 65 });
        portal.api().on_ok("patient.get", patient.clone());

        portal.fetch_patient("58686").await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_PATIENT_REQUEST", "FETCH_PATIENT_SUCCESS"]);
        assert_eq!(actions[1].payload, Some(json!({ "patient": patient })));
        assert_eq!(portal.api().call_args("patient.get")[0][0], "58686");
    }

    #[tokio::test]
    async fn test_fetch_patient_served_from_complete_cache() {
        let patient = json!({ "id": 58686, "name": "Buddy Holly", "settings": {} });
        let (portal, mut rx) = portal_with_state(cached_state(patient.clone(), 1));

        portal.fetch_patient("58686").await;

        let actions = drain(&mut rx);
        // No REQUEST, no network call, just the cached SUCCESS.
        assert_kinds(&actions, &["FETCH_PATIENT_SUCCESS"]);
        assert_eq!(actions[0].payload, Some(json!({ "patient": patient })));
        assert_eq!(portal.api().call_count("patient.get"), 0);
    }

    #[tokio::test]
    async fn test_fetch_patient_skips_cache_when_settings_missing() {
        let patient = json!({ "id": 58686, "name": "Buddy Holly", "settings": null });
        let (portal, mut rx) = portal_with_state(cached_state(patient, 1));
        portal
            .api()
            .on_ok("patient.get", json!({ "id": 58686, "settings": {} }));

        portal.fetch_patient("58686").await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_PATIENT_REQUEST", "FETCH_PATIENT_SUCCESS"]);
        assert_eq!(portal.api().call_count("patient.get"), 1);
    }

    #[tokio::test]
    async fn test_fetch_patient_skips_stale_cache() {
        let patient = json!({ "id": 58686, "settings": {} });
        let (portal, mut rx) = portal_with_state(cached_state(patient, -1));

        portal.fetch_patient("58686").await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_PATIENT_REQUEST", "FETCH_PATIENT_SUCCESS"]);
        assert_eq!(portal.api().call_count("patient.get"), 1);
    }

    #[tokio::test]
    async fn test_fetch_patient_server_error_links_nothing() {
        let (portal, mut rx) = portal();
        portal.api().on_err("patient.get", 500, json!("Error!"));

        portal.fetch_patient("58686").await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_PATIENT_REQUEST", "FETCH_PATIENT_FAILURE"]);
        assert_eq!(actions[1].payload, Some(json!({ "link": null })));
        let error = actions[1].error.as_ref().unwrap();
        assert_eq!(error.message, messages::ERR_FETCHING_PATIENT);
        assert_eq!(error.status, Some(500));
    }

    #[tokio::test]
    async fn test_fetch_own_patient_not_found_links_setup() {
        let state = AppState {
            logged_in_user_id: Some("58686".to_string()),
            ..AppState::default()
        };
        let (portal, mut rx) = portal_with_state(state);
        portal.api().on_err("patient.get", 404, json!("Error!"));

        portal.fetch_patient("58686").await;

        let actions = drain(&mut rx);
        let error = actions[1].error.as_ref().unwrap();
        assert_eq!(error.message, messages::ERR_YOUR_ACCOUNT_NOT_CONFIGURED);
        assert_eq!(error.status, Some(404));
        assert_eq!(
            actions[1].payload,
            Some(json!({ "link": {
                "to": "/patients/new",
                "text": messages::YOUR_ACCOUNT_DATA_SETUP,
            } }))
        );
    }

    #[tokio::test]
    async fn test_setup_data_storage_routes_to_data_view() {
        let state = AppState {
            logged_in_user_id: Some("500".to_string()),
            ..AppState::default()
        };
        let (portal, mut rx) = portal_with_state(state);
        let created = json!({ "userid": 27, "name": "Bruce" });
        portal.api().on_ok("patient.post", created.clone());

        portal.setup_data_storage(json!({ "name": "Bruce" })).await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &["SETUP_DATA_STORAGE_REQUEST", "SETUP_DATA_STORAGE_SUCCESS", "NAVIGATE"],
        );
        assert_eq!(
            actions[1].payload,
            Some(json!({ "userId": "500", "patient": created }))
        );
        assert_eq!(actions[2].navigation_path(), Some("/patients/27/data"));
        assert!(portal.metrics().tracked("Created Profile"));
    }

    #[tokio::test]
    async fn test_setup_data_storage_failure() {
        let (portal, mut rx) = portal();
        portal.api().on_err("patient.post", 500, json!("Error!"));

        portal.setup_data_storage(json!({ "name": "Bruce" })).await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["SETUP_DATA_STORAGE_REQUEST", "SETUP_DATA_STORAGE_FAILURE"]);
        assert_eq!(
            actions[1].error.as_ref().unwrap().message,
            messages::ERR_DSA_SETUP
        );
    }

    #[tokio::test]
    async fn test_update_patient() {
        let (portal, mut rx) = portal();
        let patient = json!({ "name": "Bruce" });
        portal.api().on_ok("patient.put", patient.clone());

        portal.update_patient(patient.clone()).await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["UPDATE_PATIENT_REQUEST", "UPDATE_PATIENT_SUCCESS"]);
        assert_eq!(actions[1].payload, Some(json!({ "updatedPatient": patient })));
        assert!(portal.metrics().tracked("Updated Profile"));
    }

    #[tokio::test]
    async fn test_update_preferences() {
        let (portal, mut rx) = portal();
        let preferences = json!({ "display": "all" });
        portal.api().on_ok("metadata.preferences.put", preferences.clone());

        portal.update_preferences("1234", preferences.clone()).await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["UPDATE_PREFERENCES_REQUEST", "UPDATE_PREFERENCES_SUCCESS"]);
        assert_eq!(
            actions[1].payload,
            Some(json!({ "updatedPreferences": preferences }))
        );
        assert_eq!(
            portal.api().call_args("metadata.preferences.put")[0],
            json!(["1234", preferences])
        );
    }

    #[tokio::test]
    async fn test_fetch_settings() {
        let (portal, mut rx) = portal();
        let settings = json!({ "siteChangeSource": "cannulaPrime" });
        portal.api().on_ok("metadata.settings.get", settings.clone());

        portal.fetch_settings("1234").await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_SETTINGS_REQUEST", "FETCH_SETTINGS_SUCCESS"]);
        assert_eq!(actions[1].payload, Some(json!({ "settings": settings })));
    }

    #[tokio::test]
    async fn test_update_settings_without_bg_units() {
        let (portal, mut rx) = portal();
        let settings = json!({ "siteChangeSource": "cannulaPrime" });
        portal.api().on_ok("metadata.settings.put", settings.clone());

        portal.update_settings("1234", settings.clone()).await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["UPDATE_SETTINGS_REQUEST", "UPDATE_SETTINGS_SUCCESS"]);
        assert_eq!(
            actions[1].payload,
            Some(json!({ "userId": "1234", "updatedSettings": settings }))
        );
    }

    #[tokio::test]
    async fn test_update_settings_with_bg_units_pairs_triples() {
        let (portal, mut rx) = portal();
        let settings = json!({ "units": { "bg": "mmol/L" } });
        portal.api().on_ok("metadata.settings.put", settings.clone());

        portal.update_settings("1234", settings.clone()).await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "UPDATE_SETTINGS_REQUEST",
                "UPDATE_PATIENT_BG_UNITS_REQUEST",
                "UPDATE_SETTINGS_SUCCESS",
                "UPDATE_PATIENT_BG_UNITS_SUCCESS",
            ],
        );
        assert_eq!(actions[2].payload, actions[3].payload);
        assert_eq!(portal.api().call_count("metadata.settings.put"), 1);
    }

    #[tokio::test]
    async fn test_update_settings_with_bg_units_pairs_failures() {
        let (portal, mut rx) = portal();
        portal.api().on_err("metadata.settings.put", 500, json!("Error!"));

        portal
            .update_settings("1234", json!({ "units": { "bg": "mmol/L" } }))
            .await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "UPDATE_SETTINGS_REQUEST",
                "UPDATE_PATIENT_BG_UNITS_REQUEST",
                "UPDATE_SETTINGS_FAILURE",
                "UPDATE_PATIENT_BG_UNITS_FAILURE",
            ],
        );
        assert_eq!(
            actions[2].error.as_ref().unwrap().message,
            messages::ERR_UPDATING_SETTINGS
        );
        assert_eq!(
            actions[3].error.as_ref().unwrap().message,
            messages::ERR_UPDATING_PATIENT_BG_UNITS
        );
    }

    #[tokio::test]
    async fn test_banner_flows_stamp_the_matching_preference() {
        let (portal, mut rx) = portal();

        portal.dismiss_donate_banner("500").await;
        portal.click_share_data_banner("500").await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "DISMISS_BANNER",
                "UPDATE_PREFERENCES_REQUEST",
                "UPDATE_PREFERENCES_SUCCESS",
                "DISMISS_BANNER",
                "UPDATE_PREFERENCES_REQUEST",
                "UPDATE_PREFERENCES_SUCCESS",
            ],
        );
        assert_eq!(actions[0].payload, Some(json!({ "type": "donate" })));
        assert_eq!(actions[3].payload, Some(json!({ "type": "sharedata" })));
        let stamped = &portal.api().call_args("metadata.preferences.put")[0][1];
        assert_eq!(stamped["dismissedDonateYourDataBannerTime"], NOW);
        let clicked = &portal.api().call_args("metadata.preferences.put")[1][1];
        assert_eq!(clicked["clickedShareDataBannerTime"], NOW);
    }
}
