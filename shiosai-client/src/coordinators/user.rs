//! Account profile, associated accounts, error logging and data-source
//! connection coordinators.

use serde_json::{json, Value};

use shiosai_core::action::{Action, Capability};
use shiosai_core::error::ErrorInfo;
use shiosai_core::messages;
use shiosai_core::resource;

use crate::api::{ErrorApi, PortalApi, UserApi};
use crate::metrics::Metrics;
use crate::portal::Portal;

/// Clone of `value` without the given top-level keys.
fn strip(value: &Value, keys: &[&str]) -> Value {
    let mut stripped = value.clone();
    if let Some(object) = stripped.as_object_mut() {
        for key in keys {
            object.remove(*key);
        }
    }
    stripped
}

impl<A: PortalApi, M: Metrics + 'static> Portal<A, M> {
    pub async fn fetch_user(&self) {
        self.dispatch(Action::request(Capability::FetchUser));
        match self.api.get_current_user().await {
            Ok(user) => {
                if resource::email_verified(&user) {
                    self.dispatch(Action::success_with(
                        Capability::FetchUser,
                        json!({ "user": user }),
                    ));
                } else {
                    self.dispatch(Action::failure(
                        Capability::FetchUser,
                        Some(ErrorInfo::new(messages::ERR_EMAIL_NOT_VERIFIED)),
                        Some(Value::Null),
                    ));
                }
            }
            // A 401 is an expired session: the taxonomy maps it to a soft
            // failure so the UI can re-authenticate without a banner.
            Err(err) => self.fail(Capability::FetchUser, &err),
        }
    }

    /// Update the logged-in account from form values, deep-merging the
    /// profile (and preferences).
    pub async fn update_user(&self, form_values: Value) {
        self.update_user_flow(form_values, true, false).await;
    }

    /// Same update as [`Portal::update_user`], then route the clinician by
    /// profile completeness. Used by the clinician-details form.
    pub async fn update_clinician_profile(&self, form_values: Value) {
        self.update_user_flow(form_values, false, true).await;
    }

    async fn update_user_flow(&self, form_values: Value, with_preferences: bool, route: bool) {
        let state = self.store.state();
        let Some(user_id) = state.logged_in_user_id.clone() else {
            tracing::warn!("user update without an authenticated session");
            return;
        };
        let current = state
            .all_users
            .get(&user_id)
            .map(|cached| cached.record.clone())
            .unwrap_or_else(|| json!({}));

        let mut new_user = resource::merge(&current, &form_values);
        if with_preferences && new_user.get("preferences").is_none() {
            if let Some(object) = new_user.as_object_mut() {
                object.insert("preferences".to_string(), json!({}));
            }
        }

        // The password never travels in the dispatched payload; username and
        // e-mails are omitted from the write when unchanged.
        let updating_user = strip(&new_user, &["password"]);
        let mut user_updates = new_user.clone();
        if new_user.get("username") == current.get("username") {
            user_updates = strip(&user_updates, &["username", "emails"]);
        }

        self.dispatch(Action::request_with(
            Capability::UpdateUser,
            json!({ "userId": user_id, "updatingUser": updating_user }),
        ));
        match self.api.update_current_user(&user_updates).await {
            Err(err) => self.fail(Capability::UpdateUser, &err),
            Ok(updated) => {
                self.dispatch(Action::success_with(
                    Capability::UpdateUser,
                    json!({ "userId": user_id, "updatedUser": updated }),
                ));
                self.track("Updated Account");
                if route {
                    if resource::has_clinic_role(&updated)
                        && !resource::has_clinic_profile(&updated)
                    {
                        self.navigate("/clinician-details");
                    } else {
                        self.navigate("/patients?justLoggedIn=true");
                    }
                }
            }
        }
    }

    pub async fn fetch_associated_accounts(&self) {
        self.dispatch(Action::request(Capability::FetchAssociatedAccounts));
        match self.api.get_associated_accounts().await {
            Ok(accounts) => {
                self.dispatch(Action::success_with(Capability::FetchAssociatedAccounts, accounts))
            }
            Err(err) => self.fail(Capability::FetchAssociatedAccounts, &err),
        }
    }

    /// Ship a client-side error to the backend logger. The logger being down
    /// is never surfaced; the sequence always resolves.
    pub async fn log_error(&self, error: &str, message: &str, properties: Value) {
        self.dispatch(Action::request(Capability::LogError));
        if let Err(err) = self.api.log_error(error, message, &properties).await {
            tracing::debug!(status = err.status, "error logger unavailable");
        }
        self.dispatch(Action::success(Capability::LogError));
    }

    pub async fn fetch_data_sources(&self) {
        self.dispatch(Action::request(Capability::FetchDataSources));
        match self.api.get_data_sources().await {
            Ok(sources) => self.dispatch(Action::success_with(
                Capability::FetchDataSources,
                json!({ "dataSources": sources }),
            )),
            Err(err) => self.fail(Capability::FetchDataSources, &err),
        }
    }

    /// Authorize an external data source: mint a restricted token, then ask
    /// the backend for the provider's authorization URL.
    pub async fn connect_data_source(
        &self,
        _data_source_id: &str,
        restricted_token_create: Value,
        data_source_filter: Value,
    ) {
        self.dispatch(Action::request(Capability::ConnectDataSource));
        let Some(provider) = oauth_provider(&data_source_filter) else {
            self.unknown_provider(Capability::ConnectDataSource);
            return;
        };
        let token = match self.api.create_restricted_token(&restricted_token_create).await {
            Ok(token) => token,
            Err(err) => {
                self.fail(Capability::ConnectDataSource, &err);
                return;
            }
        };
        let token_id = token.get("id").and_then(Value::as_str).unwrap_or_default();
        match self
            .api
            .create_oauth_provider_authorization(&provider, token_id)
            .await
        {
            Ok(url) => self.dispatch(Action::success_with(
                Capability::ConnectDataSource,
                json!({ "authorizedDataSource": { "id": provider, "url": url } }),
            )),
            Err(err) => self.fail(Capability::ConnectDataSource, &err),
        }
    }

    pub async fn disconnect_data_source(
        &self,
        _data_source_id: &str,
        data_source_filter: Value,
    ) {
        self.dispatch(Action::request(Capability::DisconnectDataSource));
        let Some(provider) = oauth_provider(&data_source_filter) else {
            self.unknown_provider(Capability::DisconnectDataSource);
            return;
        };
        match self.api.delete_oauth_provider_authorization(&provider).await {
            Ok(()) => self.dispatch(Action::success_with(
                Capability::DisconnectDataSource,
                json!({}),
            )),
            Err(err) => self.fail(Capability::DisconnectDataSource, &err),
        }
    }

    /// Contract error: the raw detail travels as a string in `meta.apiError`
    /// instead of a backend error object, and the mapped error carries no
    /// status.
    fn unknown_provider(&self, capability: Capability) {
        let message = match capability {
            Capability::DisconnectDataSource => messages::ERR_DISCONNECTING_DATA_SOURCE,
            _ => messages::ERR_CONNECTING_DATA_SOURCE,
        };
        self.dispatch(Action::failure(
            capability,
            Some(ErrorInfo::new(message)),
            Some(json!("Unknown data source type")),
        ));
    }
}

fn oauth_provider(filter: &Value) -> Option<String> {
    if filter.get("providerType").and_then(Value::as_str) != Some("oauth") {
        return None;
    }
    filter
        .get("providerName")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinators::testutil::{assert_kinds, drain, portal, portal_with_state};
    use shiosai_store::{AppState, CachedRecord};

    #[tokio::test]
    async fn test_fetch_user_success() {
        let (portal, mut rx) = portal();
        let user = json!({ "emailVerified": true, "id": 306, "name": "Frankie Boyle" });
        portal.api().on_ok("user.get", user.clone());

        portal.fetch_user().await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_USER_REQUEST", "FETCH_USER_SUCCESS"]);
        assert_eq!(actions[1].payload, Some(json!({ "user": user })));
    }

    #[tokio::test]
    async fn test_fetch_user_unverified_email() {
        let (portal, mut rx) = portal();
        portal
            .api()
            .on_ok("user.get", json!({ "emailVerified": false, "id": 306 }));

        portal.fetch_user().await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_USER_REQUEST", "FETCH_USER_FAILURE"]);
        assert_eq!(
            actions[1].error.as_ref().unwrap().message,
            messages::ERR_EMAIL_NOT_VERIFIED
        );
        assert_eq!(actions[1].meta.as_ref().unwrap().api_error, Some(Value::Null));
    }

    #[tokio::test]
    async fn test_fetch_user_expired_session_is_soft() {
        let (portal, mut rx) = portal();
        portal.api().on_err("user.get", 401, Value::Null);

        portal.fetch_user().await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_USER_REQUEST", "FETCH_USER_FAILURE"]);
        assert_eq!(actions[1].error, None);
        assert_eq!(
            actions[1].meta.as_ref().unwrap().api_error,
            Some(json!({ "status": 401, "body": null }))
        );
    }

    #[tokio::test]
    async fn test_fetch_user_server_error() {
        let (portal, mut rx) = portal();
        portal.api().on_err("user.get", 500, json!("Error!"));

        portal.fetch_user().await;

        let actions = drain(&mut rx);
        let error = actions[1].error.as_ref().unwrap();
        assert_eq!(error.message, messages::ERR_FETCHING_USER);
        assert_eq!(error.status, Some(500));
    }

    fn state_with_user(user_id: &str, user: Value) -> AppState {
        let mut state = AppState {
            logged_in_user_id: Some(user_id.to_string()),
            ..AppState::default()
        };
        state.all_users.insert(
            user_id.to_string(),
            CachedRecord {
                record: user,
                cache_until: None,
            },
        );
        state
    }

    #[tokio::test]
    async fn test_update_user_merges_and_omits_password_from_payload() {
        let current = json!({
            "profile": { "name": "Joe Bloggs", "age": 29 },
            "password": "foo",
            "emails": ["joe@bloggs.com"],
            "username": "Joe",
        });
        let (portal, mut rx) = portal_with_state(state_with_user("400", current));
        let updated = json!({
            "profile": { "name": "Joe Steven Bloggs", "age": 30 },
            "emails": ["joe@bloggs.com"],
            "username": "Joe",
            "password": "foo",
        });
        portal.api().on_ok("user.put", updated.clone());

        portal
            .update_user(json!({ "profile": { "name": "Joe Steven Bloggs", "age": 30 } }))
            .await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["UPDATE_USER_REQUEST", "UPDATE_USER_SUCCESS"]);
        assert_eq!(
            actions[0].payload,
            Some(json!({ "userId": "400", "updatingUser": {
                "profile": { "name": "Joe Steven Bloggs", "age": 30 },
                "preferences": {},
                "emails": ["joe@bloggs.com"],
                "username": "Joe",
            } }))
        );
        // Unchanged username: the write drops username and e-mails but keeps
        // the password for re-authentication.
        assert_eq!(
            portal.api().call_args("user.put")[0][0],
            json!({
                "profile": { "name": "Joe Steven Bloggs", "age": 30 },
                "preferences": {},
                "password": "foo",
            })
        );
        assert_eq!(
            actions[1].payload,
            Some(json!({ "userId": "400", "updatedUser": updated }))
        );
        assert!(portal.metrics().tracked("Updated Account"));
    }

    #[tokio::test]
    async fn test_update_user_failure() {
        let current = json!({ "username": "Joe", "password": "foo" });
        let (portal, mut rx) = portal_with_state(state_with_user("400", current));
        portal.api().on_err("user.put", 500, json!("Error!"));

        portal.update_user(json!({ "profile": { "age": 30 } })).await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["UPDATE_USER_REQUEST", "UPDATE_USER_FAILURE"]);
        assert_eq!(
            actions[1].error.as_ref().unwrap().message,
            messages::ERR_UPDATING_USER
        );
    }

    #[tokio::test]
    async fn test_update_clinician_profile_routes_after_success() {
        let current = json!({
            "profile": { "name": "Joe Bloggs" },
            "password": "foo",
            "username": "Joe",
        });
        let (portal, mut rx) = portal_with_state(state_with_user("400", current));
        portal
            .api()
            .on_ok("user.put", json!({ "profile": { "name": "Joe Steven Bloggs" } }));

        portal
            .update_clinician_profile(json!({ "profile": { "name": "Joe Steven Bloggs" } }))
            .await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &["UPDATE_USER_REQUEST", "UPDATE_USER_SUCCESS", "NAVIGATE"],
        );
        // No preferences default on the clinician path.
        assert!(actions[0].payload.as_ref().unwrap()["updatingUser"]
            .get("preferences")
            .is_none());
        assert_eq!(
            actions[2].navigation_path(),
            Some("/patients?justLoggedIn=true")
        );
    }

    #[tokio::test]
    async fn test_fetch_associated_accounts_payload_is_verbatim() {
        let (portal, mut rx) = portal();
        let accounts = json!({ "patients": [{ "id": 58686, "name": "Buddy Holly" }] });
        portal.api().on_ok("user.getAssociatedAccounts", accounts.clone());

        portal.fetch_associated_accounts().await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &[
                "FETCH_ASSOCIATED_ACCOUNTS_REQUEST",
                "FETCH_ASSOCIATED_ACCOUNTS_SUCCESS",
            ],
        );
        assert_eq!(actions[1].payload, Some(accounts));
    }

    #[tokio::test]
    async fn test_log_error_always_resolves() {
        let (portal, mut rx) = portal();
        portal.api().on_err("errors.log", 500, json!("Error!"));

        portal
            .log_error("Error", "Some random detailed error message!", json!({ "stacktrace": true }))
            .await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["LOG_ERROR_REQUEST", "LOG_ERROR_SUCCESS"]);
        assert_eq!(portal.api().call_count("errors.log"), 1);
    }

    #[tokio::test]
    async fn test_fetch_data_sources() {
        let (portal, mut rx) = portal();
        portal
            .api()
            .on_ok("user.getDataSources", json!([{ "id": "strava" }, { "id": "fitbit" }]));

        portal.fetch_data_sources().await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["FETCH_DATA_SOURCES_REQUEST", "FETCH_DATA_SOURCES_SUCCESS"]);
        assert_eq!(
            actions[1].payload,
            Some(json!({ "dataSources": [{ "id": "strava" }, { "id": "fitbit" }] }))
        );
    }

    #[tokio::test]
    async fn test_connect_data_source_success() {
        let (portal, mut rx) = portal();
        portal
            .api()
            .on_ok("user.createRestrictedToken", json!({ "id": "blah.blah.blah" }));
        portal
            .api()
            .on_ok("user.createOAuthProviderAuthorization", json!("fitbit.url"));

        portal
            .connect_data_source(
                "fitbit",
                json!({ "path": ["/v1/oauth/fitbit"] }),
                json!({ "providerType": "oauth", "providerName": "fitbit" }),
            )
            .await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["CONNECT_DATA_SOURCE_REQUEST", "CONNECT_DATA_SOURCE_SUCCESS"]);
        assert_eq!(
            actions[1].payload,
            Some(json!({ "authorizedDataSource": { "id": "fitbit", "url": "fitbit.url" } }))
        );
        assert_eq!(
            portal.api().call_args("user.createOAuthProviderAuthorization")[0],
            json!(["fitbit", "blah.blah.blah"])
        );
    }

    #[tokio::test]
    async fn test_connect_data_source_unknown_provider_type() {
        let (portal, mut rx) = portal();

        portal
            .connect_data_source(
                "strava",
                json!({ "path": ["/v1/oauth/strava"] }),
                json!({ "providerType": "unexpected", "providerName": "strava" }),
            )
            .await;

        let actions = drain(&mut rx);
        assert_kinds(&actions, &["CONNECT_DATA_SOURCE_REQUEST", "CONNECT_DATA_SOURCE_FAILURE"]);
        let error = actions[1].error.as_ref().unwrap();
        assert_eq!(error.message, messages::ERR_CONNECTING_DATA_SOURCE);
        assert_eq!(error.status, None);
        assert_eq!(
            actions[1].meta.as_ref().unwrap().api_error,
            Some(json!("Unknown data source type"))
        );
        assert_eq!(portal.api().call_count("user.createRestrictedToken"), 0);
    }

    #[tokio::test]
    async fn test_connect_data_source_token_failure() {
        let (portal, mut rx) = portal();
        portal
            .api()
            .on_err("user.createRestrictedToken", 500, json!("Error!"));

        portal
            .connect_data_source(
                "strava",
                json!({ "path": ["/v1/oauth/strava"] }),
                json!({ "providerType": "oauth", "providerName": "strava" }),
            )
            .await;

        let actions = drain(&mut rx);
        assert_eq!(
            actions[1].error.as_ref().unwrap().message,
            messages::ERR_CONNECTING_DATA_SOURCE
        );
        assert_eq!(
            portal.api().call_count("user.createOAuthProviderAuthorization"),
            0
        );
    }

    #[tokio::test]
    async fn test_disconnect_data_source() {
        let (portal, mut rx) = portal();

        portal
            .disconnect_data_source(
                "fitbit",
                json!({ "providerType": "oauth", "providerName": "fitbit" }),
            )
            .await;

        let actions = drain(&mut rx);
        assert_kinds(
            &actions,
            &["DISCONNECT_DATA_SOURCE_REQUEST", "DISCONNECT_DATA_SOURCE_SUCCESS"],
        );
        assert_eq!(actions[1].payload, Some(json!({})));
        assert_eq!(
            portal.api().call_args("user.deleteOAuthProviderAuthorization")[0][0],
            "fitbit"
        );
    }

    #[tokio::test]
    async fn test_disconnect_data_source_unknown_provider_type() {
        let (portal, mut rx) = portal();

        portal
            .disconnect_data_source(
                "strava",
                json!({ "providerType": "unexpected", "providerName": "strava" }),
            )
            .await;

        let actions = drain(&mut rx);
        let error = actions[1].error.as_ref().unwrap();
        assert_eq!(error.message, messages::ERR_DISCONNECTING_DATA_SOURCE);
        assert_eq!(
            portal.api().call_count("user.deleteOAuthProviderAuthorization"),
            0
        );
    }
}
