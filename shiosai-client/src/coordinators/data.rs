//! Patient-data fetching: the two-phase window fetch, server time, and
//! care-team message threads.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use shiosai_core::action::{Action, Capability, Meta};
use shiosai_core::datum::{
    format_utc, latest_diabetes_datum_time, latest_pump_settings, FetchWindow,
    LATEST_PROBE_TYPES, WINDOW_DAYS_FORWARD,
};
use shiosai_core::error::ErrorInfo;
use shiosai_core::messages::{self, map_error};

use crate::api::{DataQuery, PatientDataApi, PortalApi, ServerApi, TeamApi};
use crate::metrics::Metrics;
use crate::portal::Portal;

/// Options of a patient-data fetch. On an initial fetch the window dates are
/// computed from the latest-per-type probe; afterwards callers pass the
/// window through for incremental reads.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchDataOptions {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// Ask the data worker to echo the ingested data back.
    pub return_data: bool,
    /// `false` forces the fetch even when the data cache is still fresh.
    pub use_cache: bool,
    /// First fetch for this patient: run the latest-per-type probe to anchor
    /// the window.
    pub initial: bool,
    /// Upload record to fetch alongside the window, discovered from the
    /// probe's pumpSettings datum.
    pub pump_settings_upload_id: Option<String>,
}

impl Default for FetchDataOptions {
    fn default() -> Self {
        FetchDataOptions {
            start_date: None,
            end_date: None,
            return_data: false,
            use_cache: true,
            initial: true,
            pump_settings_upload_id: None,
        }
    }
}

impl<A: PortalApi, M: Metrics + 'static> Portal<A, M> {
    /// Fetch the backend clock. Used to anchor data windows so device clock
    /// drift does not truncate them; falls back to the local clock when the
    /// call fails.
    pub async fn fetch_server_time(&self) -> Option<DateTime<Utc>> {
        self.dispatch(Action::request(Capability::FetchServerTime));
        match self.api.get_time().await {
            Ok(envelope) => {
                let raw = envelope
                    .pointer("/data/time")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                self.dispatch(Action::success_with(
                    Capability::FetchServerTime,
                    json!({ "serverTime": raw }),
                ));
                DateTime::parse_from_rfc3339(&raw)
                    .ok()
                    .map(|time| time.with_timezone(&Utc))
            }
            Err(err) => {
                self.fail(Capability::FetchServerTime, &err);
                None
            }
        }
    }

    /// The patient-data choreography.
    ///
    /// Phase 1 (initial only): server time, then a latest-per-type probe
    /// that anchors the window 30 days before the most recent diabetes datum
    /// (or server time when the account has no data). Phase 2: the window
    /// fetch and the team-notes fetch run concurrently and are joined before
    /// the terminal dispatch; the merged sequence is forwarded to the data
    /// worker unless the user has navigated to another patient in the
    /// meantime.
    pub async fn fetch_patient_data(&self, options: FetchDataOptions, patient_id: &str) {
        let state = self.store.state();
        if options.use_cache
            && state
                .data
                .cache_until
                .is_some_and(|until| self.store.now() < until)
        {
            tracing::debug!(patient_id, "patient data cache still fresh, skipping fetch");
            return;
        }

        let mut options = options;
        if options.initial {
            let server_time = match self.fetch_server_time().await {
                Some(time) => time,
                None => self.store.now(),
            };

            let probe = DataQuery {
                type_filter: Some(LATEST_PROBE_TYPES.join(",")),
                latest: Some(1),
                end_date: Some(format_utc(server_time + Duration::days(WINDOW_DAYS_FORWARD))),
                ..DataQuery::default()
            };
            let latest = match self.api.get_patient_data(patient_id, &probe).await {
                Ok(latest) => latest,
                Err(err) => {
                    self.fail(Capability::FetchPatientData, &err);
                    return;
                }
            };

            let reference = latest_diabetes_datum_time(&latest).unwrap_or(server_time);
            let window = FetchWindow::anchored(reference);
            options.start_date = Some(window.start_str());
            options.end_date = Some(window.end_str());
            options.pump_settings_upload_id = latest_pump_settings(&latest)
                .and_then(|datum| datum.get("uploadId"))
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        self.dispatch(Action::request_with(
            Capability::FetchPatientData,
            json!({ "patientId": patient_id }),
        ));

        let window_query = DataQuery {
            start_date: options.start_date.clone(),
            end_date: options.end_date.clone(),
            ..DataQuery::default()
        };
        // Window data and team notes are independent: issue both, join, and
        // accept either completion order.
        let (data_result, notes_result) = tokio::join!(
            self.api.get_patient_data(patient_id, &window_query),
            self.api.get_notes(patient_id),
        );

        let mut data = match data_result {
            Ok(data) => data,
            Err(err) => {
                self.fail(Capability::FetchPatientData, &err);
                return;
            }
        };
        let notes = match notes_result {
            Ok(notes) => notes,
            Err(err) => {
                let error = map_error(Capability::FetchMessageThread, Some(&err));
                self.dispatch(Action::failure(
                    Capability::FetchMessageThread,
                    error,
                    Some(err.to_value()),
                ));
                return;
            }
        };

        if let Some(upload_id) = &options.pump_settings_upload_id {
            let upload_query = DataQuery {
                type_filter: Some("upload".to_string()),
                latest: Some(1),
                upload_id: Some(upload_id.clone()),
                ..DataQuery::default()
            };
            match self.api.get_patient_data(patient_id, &upload_query).await {
                Ok(uploads) => data.extend(uploads),
                Err(err) => {
                    // A distinct failure kind: the window fetch succeeded but
                    // the pump settings upload record is unavailable.
                    self.dispatch(Action::failure(
                        Capability::FetchPatientData,
                        Some(ErrorInfo::with_status(
                            messages::ERR_FETCHING_LATEST_PUMP_SETTINGS_UPLOAD,
                            err.status,
                        )),
                        Some(err.to_value()),
                    ));
                    return;
                }
            }
        }

        data.extend(notes);
        self.dispatch(Action::success_with(
            Capability::FetchPatientData,
            json!({ "patientId": patient_id }),
        ));

        // Stale-response suppression: the fetch resolved, but only forward
        // the data when this patient is still the one in view.
        if !self.store.state().viewing_patient(patient_id) {
            tracing::debug!(patient_id, "stale patient data response, ingestion skipped");
            return;
        }
        let payload = json!({
            "data": serde_json::to_string(&data).unwrap_or_default(),
            "fetchedCount": data.len(),
            "patientId": patient_id,
            "fetchedUntil": options.start_date,
            "returnData": options.return_data,
        });
        self.dispatch(
            Action::request_with(Capability::DataWorkerAddData, payload)
                .with_meta(Meta::data_worker(self.origin.clone(), patient_id)),
        );
    }

    pub async fn fetch_message_thread(&self, message_id: &str) {
        self.dispatch(Action::request(Capability::FetchMessageThread));
        match self.api.get_message_thread(message_id).await {
            Ok(thread) => self.dispatch(Action::success_with(
                Capability::FetchMessageThread,
                json!({ "messageThread": thread }),
            )),
            Err(err) => self.fail(Capability::FetchMessageThread, &err),
        }
    }

    pub async fn create_message_thread(&self, message: Value) {
        self.dispatch(Action::request(Capability::CreateMessageThread));
        match self.api.start_message_thread(&message).await {
            Ok(created) => self.dispatch(Action::success_with(
                Capability::CreateMessageThread,
                json!({ "messageThread": created }),
            )),
            Err(err) => self.fail(Capability::CreateMessageThread, &err),
        }
    }

    pub async fn edit_message_thread(&self, message: Value) {
        self.dispatch(Action::request(Capability::EditMessageThread));
        match self.api.edit_message(&message).await {
            Ok(()) => self.dispatch(Action::success_with(
                Capability::EditMessageThread,
                json!({ "updatedMessage": message }),
            )),
            Err(err) => self.fail(Capability::EditMessageThread, &err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinators::testutil::{assert_kinds, drain, portal_with_state};
    use shiosai_store::AppState;

    const PATIENT_ID: &str = "300";
    const SERVER_TIME: &str = "2018-02-01T00:00:00.000Z";

    fn patient_data() -> Vec<Value> {
        vec![
            json!({ "id": 25, "value": 540.4, "type": "smbg", "time": "2018-01-01T00:00:00.000Z" }),
            json!({ "id": 26, "value": 30.8, "type": "smbg", "time": "2018-01-30T00:00:00.000Z" }),
            json!({ "type": "upload", "id": "upload789", "uploadId": "_upload789", "time": "2018-06-01T00:00:00.000Z" }),
        ]
    }

    fn team_notes() -> Vec<Value> {
        vec![json!({ "id": 28, "note": "foo" })]
    }

    fn viewing(patient_id: &str) -> AppState {
        AppState {
            pathname: format!("/data/{patient_id}"),
            ..AppState::default()
        }
    }

    fn cached_data_state() -> AppState {
        let mut state = viewing(PATIENT_ID);
        state.data.cache_until =
            Some(DateTime::parse_from_rfc3339("2018-02-01T01:00:00.000Z").unwrap().into());
        state
    }

    type TestPortal = Portal<crate::api::mock::MockApi, crate::metrics::RecordingMetrics>;

    fn script_server_time(portal: &TestPortal) {
        portal
            .api()
            .on_ok("server.getTime", json!({ "data": { "time": SERVER_TIME } }));
    }

    #[tokio::test]
    async fn test_fresh_cache_suppresses_the_whole_sequence() {
        let (portal, mut rx) = portal_with_state(cached_data_state());

        portal
            .fetch_patient_data(FetchDataOptions::default(), PATIENT_ID)
            .await;

        assert!(drain(&mut rx).is_empty());
        assert_eq!(portal.api().call_count("patientData.get"), 0);
    }

    #[tokio::test]
    async fn test_cache_bypass_still_fetches() {
        let (portal, mut rx) = portal_with_state(cached_data_state());
        script_server_time(&portal);
        portal.api().on_ok("patientData.get", json!([]));
        portal.api().on_ok("patientData.get", json!([]));

        let options = FetchDataOptions {
            use_cache: false,
            ..FetchDataOptions::default()
        };
        portal.fetch_patient_data(options, PATIENT_ID).await;

        let actions = drain(&mut rx);
        assert!(actions
            .iter()
            .any(|a| a.kind.to_string() == "FETCH_PATIENT_DATA_REQUEST"));
    }

    #[tokio::test]
    async fn test_initial_probe_failure_fails_without_request() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        script_server_time(&portal);
        portal.api().on_err("patientData.get", 500, json!("Error!"));

        portal
            .fetch_patient_data(FetchDataOptions::default(), PATIENT_ID)
            .await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "FETCH_SERVER_TIME_REQUEST",
                "FETCH_SERVER_TIME_SUCCESS",
                "FETCH_PATIENT_DATA_FAILURE",
            ],
        );
        assert_eq!(actions[1].payload, Some(json!({ "serverTime": SERVER_TIME })));
        let error = actions[2].error.as_ref().unwrap();
        assert_eq!(error.message, messages::ERR_FETCHING_PATIENT_DATA);
        assert_eq!(error.status, Some(500));
    }

    #[tokio::test]
    async fn test_probe_requests_latest_of_every_type() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        script_server_time(&portal);
        portal.api().on_ok("patientData.get", json!([]));
        portal.api().on_ok("patientData.get", json!([]));

        portal
            .fetch_patient_data(FetchDataOptions::default(), PATIENT_ID)
            .await;
        drain(&mut rx);

        let probe = &portal.api().call_args("patientData.get")[0][1];
        assert_eq!(
            probe["type"],
            "cbg,smbg,basal,bolus,wizard,food,pumpSettings,upload"
        );
        assert_eq!(probe["latest"], 1);
        // One day beyond server time.
        assert_eq!(probe["endDate"], "2018-02-02T00:00:00.000Z");
        assert!(probe.get("startDate").is_none());
    }

    #[tokio::test]
    async fn test_empty_probe_anchors_window_on_server_time() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        script_server_time(&portal);
        portal.api().on_ok("patientData.get", json!([]));
        portal.api().on_ok("patientData.get", json!([]));

        portal
            .fetch_patient_data(FetchDataOptions::default(), PATIENT_ID)
            .await;
        drain(&mut rx);

        assert_eq!(portal.api().call_count("server.getTime"), 1);
        let window = &portal.api().call_args("patientData.get")[1][1];
        // 30 days before server time, 1 day beyond it.
        assert_eq!(window["startDate"], "2018-01-02T00:00:00.000Z");
        assert_eq!(window["endDate"], "2018-02-02T00:00:00.000Z");
    }

    #[tokio::test]
    async fn test_window_anchors_on_latest_diabetes_datum_not_uploads() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        script_server_time(&portal);
        portal.api().on_ok("patientData.get", json!(patient_data()));
        portal.api().on_ok("patientData.get", json!([]));

        portal
            .fetch_patient_data(FetchDataOptions::default(), PATIENT_ID)
            .await;
        drain(&mut rx);

        assert_eq!(portal.api().call_count("patientData.get"), 2);
        let window = &portal.api().call_args("patientData.get")[1][1];
        // Anchored on the latest smbg even though the upload is more recent.
        assert_eq!(window["startDate"], "2017-12-31T00:00:00.000Z");
        assert_eq!(window["endDate"], "2018-01-31T00:00:00.000Z");
    }

    fn non_initial_options() -> FetchDataOptions {
        FetchDataOptions {
            start_date: Some("2018-01-01T00:00:00.000Z".to_string()),
            end_date: Some("2018-01-30T00:00:00.000Z".to_string()),
            initial: false,
            ..FetchDataOptions::default()
        }
    }

    #[tokio::test]
    async fn test_success_forwards_merged_data_to_worker() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        let upload_record = json!({
            "type": "upload", "id": "upload123", "uploadId": "_upload123",
            "time": "2018-01-15T00:00:00.000Z",
        });
        portal.api().on_ok("patientData.get", json!(patient_data()));
        portal.api().on_ok("patientData.get", json!([upload_record.clone()]));
        portal.api().on_ok("team.getNotes", json!(team_notes()));

        let options = FetchDataOptions {
            pump_settings_upload_id: Some("upload123".to_string()),
            ..non_initial_options()
        };
        portal.fetch_patient_data(options, PATIENT_ID).await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "FETCH_PATIENT_DATA_REQUEST",
                "FETCH_PATIENT_DATA_SUCCESS",
                "DATA_WORKER_ADD_DATA_REQUEST",
            ],
        );
        assert_eq!(actions[0].payload, Some(json!({ "patientId": PATIENT_ID })));
        assert_eq!(actions[1].payload, Some(json!({ "patientId": PATIENT_ID })));

        let mut merged = patient_data();
        merged.push(upload_record);
        merged.extend(team_notes());
        let payload = actions[2].payload.as_ref().unwrap();
        assert_eq!(payload["data"], serde_json::to_string(&merged).unwrap());
        assert_eq!(payload["fetchedCount"], 5);
        assert_eq!(payload["fetchedUntil"], "2018-01-01T00:00:00.000Z");
        assert_eq!(payload["returnData"], false);
        let meta = actions[2].meta.as_ref().unwrap();
        assert!(meta.web_worker);
        assert_eq!(meta.patient_id.as_deref(), Some(PATIENT_ID));
        assert_eq!(portal.api().call_count("team.getNotes"), 1);
    }

    #[tokio::test]
    async fn test_stale_response_suppresses_worker_dispatch() {
        let (portal, mut rx) = portal_with_state(viewing("xyz123"));
        portal.api().on_ok("patientData.get", json!(patient_data()));
        portal.api().on_ok("team.getNotes", json!(team_notes()));

        portal
            .fetch_patient_data(non_initial_options(), PATIENT_ID)
            .await;

        let actions = drain(&mut rx);
        // The triple still resolves for working-state bookkeeping; only the
        // ingestion dispatch is dropped.
        assert_kinds(
            &actions,
            &["FETCH_PATIENT_DATA_REQUEST", "FETCH_PATIENT_DATA_SUCCESS"],
        );
        assert_eq!(portal.api().call_count("team.getNotes"), 1);
    }

    #[tokio::test]
    async fn test_window_fetch_failure() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        portal.api().on_err("patientData.get", 500, json!("Error!"));
        portal.api().on_ok("team.getNotes", json!(team_notes()));

        portal
            .fetch_patient_data(non_initial_options(), PATIENT_ID)
            .await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &["FETCH_PATIENT_DATA_REQUEST", "FETCH_PATIENT_DATA_FAILURE"],
        );
        assert_eq!(
            actions[1].error.as_ref().unwrap().message,
            messages::ERR_FETCHING_PATIENT_DATA
        );
        assert_eq!(portal.api().call_count("team.getNotes"), 1);
    }

    #[tokio::test]
    async fn test_notes_failure_maps_to_message_thread_error() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        portal.api().on_ok("patientData.get", json!(patient_data()));
        portal.api().on_err("team.getNotes", 500, json!("Error!"));

        portal
            .fetch_patient_data(non_initial_options(), PATIENT_ID)
            .await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &["FETCH_PATIENT_DATA_REQUEST", "FETCH_MESSAGE_THREAD_FAILURE"],
        );
        assert_eq!(
            actions[1].error.as_ref().unwrap().message,
            messages::ERR_FETCHING_MESSAGE_THREAD
        );
    }

    #[tokio::test]
    async fn test_pump_settings_upload_failure_is_distinct() {
        let (portal, mut rx) = portal_with_state(viewing(PATIENT_ID));
        script_server_time(&portal);
        let mut probe = patient_data();
        probe.push(json!({
            "type": "pumpSettings", "uploadId": "upload123",
            "time": "2018-02-01T00:00:00.000Z",
        }));
        portal.api().on_ok("patientData.get", json!(probe));
        portal.api().on_ok("patientData.get", json!(patient_data()));
        portal.api().on_err("patientData.get", 500, json!("Error!"));
        portal.api().on_ok("team.getNotes", json!(team_notes()));

        portal
            .fetch_patient_data(FetchDataOptions::default(), PATIENT_ID)
            .await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "FETCH_SERVER_TIME_REQUEST",
                "FETCH_SERVER_TIME_SUCCESS",
                "FETCH_PATIENT_DATA_REQUEST",
                "FETCH_PATIENT_DATA_FAILURE",
            ],
        );
        let error = actions[3].error.as_ref().unwrap();
        assert_eq!(
            error.message,
            messages::ERR_FETCHING_LATEST_PUMP_SETTINGS_UPLOAD
        );
        assert_eq!(error.status, Some(500));
        let upload_query = &portal.api().call_args("patientData.get")[2][1];
        assert_eq!(upload_query["type"], "upload");
        assert_eq!(upload_query["uploadId"], "upload123");
    }

    #[tokio::test]
    async fn test_fetch_server_time_standalone() {
        let (portal, mut rx) = portal_with_state(AppState::default());
        script_server_time(&portal);

        let time = portal.fetch_server_time().await.unwrap();

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_SERVER_TIME_REQUEST", "FETCH_SERVER_TIME_SUCCESS"]);
        assert_eq!(format_utc(time), SERVER_TIME);
    }

    #[tokio::test]
    async fn test_fetch_server_time_failure_falls_back() {
        let (portal, mut rx) = portal_with_state(AppState::default());
        portal.api().on_err("server.getTime", 500, json!("Error!"));

        let time = portal.fetch_server_time().await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_SERVER_TIME_REQUEST", "FETCH_SERVER_TIME_FAILURE"]);
        assert_eq!(time, None);
    }

    #[tokio::test]
    async fn test_message_thread_coordinators() {
        let (portal, mut rx) = portal_with_state(AppState::default());
        let thread = json!([{ "message": "Foobar" }]);
        portal.api().on_ok("team.getMessageThread", thread.clone());

        portal.fetch_message_thread("300").await;
        portal.create_message_thread(json!({ "message": "hi" })).await;
        portal.edit_message_thread(json!({ "id": "m1", "message": "edited" })).await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "FETCH_MESSAGE_THREAD_REQUEST",
                "FETCH_MESSAGE_THREAD_SUCCESS",
                "CREATE_MESSAGE_THREAD_REQUEST",
                "CREATE_MESSAGE_THREAD_SUCCESS",
                "EDIT_MESSAGE_THREAD_REQUEST",
                "EDIT_MESSAGE_THREAD_SUCCESS",
            ],
        );
        assert_eq!(actions[1].payload, Some(json!({ "messageThread": thread })));
        assert_eq!(
            actions[5].payload,
            Some(json!({ "updatedMessage": { "id": "m1", "message": "edited" } }))
        );
        assert_eq!(portal.api().call_args("team.getMessageThread")[0][0], "300");
    }

    #[tokio::test]
    async fn test_fetch_message_thread_failure() {
        let (portal, mut rx) = portal_with_state(AppState::default());
        portal.api().on_err("team.getMessageThread", 500, json!("Error!"));

        portal.fetch_message_thread("400").await;

        let actions = drain(&mut rx);
        assert_eq!(
            actions[1].error.as_ref().unwrap().message,
            messages::ERR_FETCHING_MESSAGE_THREAD
        );
    }
}
