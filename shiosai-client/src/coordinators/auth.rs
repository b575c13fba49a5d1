//! Authentication and account lifecycle coordinators.

use serde_json::{json, Value};

use shiosai_core::action::{Action, Capability, Meta};
use shiosai_core::error::ErrorInfo;
use shiosai_core::messages::{self, map_error};
use shiosai_core::resource;
use shiosai_core::working::WorkingKey;

use crate::api::{PatientApi, PortalApi, UserApi};
use crate::metrics::Metrics;
use crate::portal::Portal;

impl<A: PortalApi, M: Metrics + 'static> Portal<A, M> {
    /// Create an account. When the signup form already carries accepted
    /// terms, the accept-terms flow runs for the new (not yet authenticated)
    /// user before the verification redirect.
    pub async fn signup(&self, details: Value) {
        self.dispatch(Action::request(Capability::Signup));
        match self.api.signup(&details).await {
            Err(err) => self.fail(Capability::Signup, &err),
            Ok(user) => {
                self.dispatch(Action::success_with(
                    Capability::Signup,
                    json!({ "user": user }),
                ));
                self.track("Signed Up");
                if let Some(accepted) = details.get("termsAccepted").filter(|v| !v.is_null()) {
                    self.accept_terms(accepted.clone(), resource::record_id(&user))
                        .await;
                }
                self.navigate("/email-verification");
            }
        }
    }

    /// Confirm a signup key from the verification e-mail. A 409 means the
    /// account exists but has no password yet (custodial accounts), which
    /// redirects into password creation.
    pub async fn confirm_signup(&self, signup_key: &str, signup_email: Option<&str>) {
        self.dispatch(Action::request(Capability::ConfirmSignup));
        match self.api.confirm_sign_up(signup_key).await {
            Ok(()) => self.dispatch(Action::success(Capability::ConfirmSignup)),
            Err(err) => {
                let error = map_error(Capability::ConfirmSignup, Some(&err));
                self.dispatch(Action::failure_with(
                    Capability::ConfirmSignup,
                    error,
                    Some(json!({ "signupKey": signup_key })),
                    Some(err.to_value()),
                ));
                if err.status == 409 {
                    self.navigate(&format!(
                        "/verification-with-password?signupKey={}&signupEmail={}",
                        urlencoding::encode(signup_key),
                        urlencoding::encode(signup_email.unwrap_or_default()),
                    ));
                }
            }
        }
    }

    /// Verify a custodial account: confirm the signup key with birthday and
    /// chosen password, then log the fresh account in. The custodial SUCCESS
    /// is dispatched before the post-login navigation.
    pub async fn verify_custodial(
        &self,
        signup_key: &str,
        email: &str,
        birthday: &str,
        password: &str,
    ) {
        let confirming = self.store.state().working(WorkingKey::ConfirmingSignup);
        if confirming.notification.is_some() {
            self.dispatch(Action::acknowledge_notification(WorkingKey::ConfirmingSignup));
        }

        self.dispatch(Action::request(Capability::VerifyCustodial));
        match self
            .api
            .custodial_confirm_sign_up(signup_key, birthday, password)
            .await
        {
            Err(err) => {
                let error = map_error(Capability::VerifyCustodial, Some(&err));
                self.dispatch(Action::failure_with(
                    Capability::VerifyCustodial,
                    error,
                    Some(json!({ "signupKey": signup_key })),
                    Some(err.to_value()),
                ));
            }
            Ok(()) => {
                self.track("VCA Home Verification - Verified");
                self.login_flow(
                    email,
                    password,
                    Some(Action::success(Capability::VerifyCustodial)),
                )
                .await;
            }
        }
    }

    pub async fn resend_email_verification(&self, email: &str) {
        self.dispatch(Action::request(Capability::ResendEmailVerification));
        match self.api.resend_email_verification(email).await {
            Ok(()) => self.dispatch(Action::success_with(
                Capability::ResendEmailVerification,
                json!({ "notification": { "type": "alert", "message": messages::EMAIL_SENT } }),
            )),
            Err(err) => self.fail(Capability::ResendEmailVerification, &err),
        }
    }

    /// Accept the terms of use for the logged-in user, or for an explicit
    /// user id during signup. Navigation only happens in an authenticated
    /// context.
    pub async fn accept_terms(&self, accepted_date: Value, user_id: Option<String>) {
        let logged_in_user_id = self.store.state().logged_in_user_id;

        self.dispatch(Action::request(Capability::AcceptTerms));
        let terms = json!({ "termsAccepted": accepted_date });
        match self.api.accept_terms(&terms).await {
            Err(err) => self.fail(Capability::AcceptTerms, &err),
            Ok(user) => {
                let subject = logged_in_user_id.clone().or(user_id);
                self.dispatch(Action::success_with(
                    Capability::AcceptTerms,
                    json!({ "userId": subject, "acceptedDate": accepted_date }),
                ));
                if logged_in_user_id.is_some() {
                    let user = user.unwrap_or(Value::Null);
                    if resource::has_clinic_role(&user) && !resource::has_clinic_profile(&user) {
                        self.navigate("/clinician-details");
                    } else {
                        self.navigate("/patients?justLoggedIn=true");
                    }
                }
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) {
        self.login_flow(username, password, None).await;
    }

    /// The login choreography. `success_tail` is dispatched after
    /// LOGIN_SUCCESS but before the post-login navigation, letting wrapping
    /// flows (custodial verification) resolve first.
    pub(crate) async fn login_flow(
        &self,
        username: &str,
        password: &str,
        success_tail: Option<Action>,
    ) {
        self.dispatch(Action::request(Capability::Login));
        if let Err(err) = self.api.login(username, password).await {
            if err.status == 403 {
                self.soft_login_failure(username, err.to_value());
            } else {
                let error = map_error(Capability::Login, Some(&err));
                self.dispatch(Action::failure_with(
                    Capability::Login,
                    error,
                    Some(Value::Null),
                    Some(err.to_value()),
                ));
            }
            return;
        }

        // Nested user fetch: its own triple, failure short-circuits login.
        self.dispatch(Action::request(Capability::FetchUser));
        let user = match self.api.get_current_user().await {
            Ok(user) => user,
            Err(err) => {
                let error = map_error(Capability::FetchUser, Some(&err));
                self.dispatch(Action::failure(
                    Capability::FetchUser,
                    error.clone(),
                    Some(err.to_value()),
                ));
                self.dispatch(Action::failure_with(
                    Capability::Login,
                    error,
                    Some(Value::Null),
                    Some(err.to_value()),
                ));
                return;
            }
        };

        if !resource::email_verified(&user) {
            self.dispatch(Action::failure(
                Capability::FetchUser,
                Some(ErrorInfo::new(messages::ERR_EMAIL_NOT_VERIFIED)),
                Some(Value::Null),
            ));
            self.soft_login_failure(username, Value::Null);
            return;
        }
        self.dispatch(Action::success_with(
            Capability::FetchUser,
            json!({ "user": user }),
        ));

        // The patient record only exists for accounts with a patient
        // profile; merge it into the login payload when present.
        let mut merged = user.clone();
        if resource::has_patient_profile(&user) {
            self.dispatch(Action::request(Capability::FetchPatient));
            let user_id = resource::record_id(&user).unwrap_or_default();
            match self.api.get_patient(&user_id).await {
                Ok(patient) => {
                    self.dispatch(Action::success_with(
                        Capability::FetchPatient,
                        json!({ "patient": patient }),
                    ));
                    merged = resource::merge(&user, &patient);
                }
                Err(err) => {
                    let error = map_error(Capability::FetchPatient, Some(&err));
                    self.dispatch(Action::failure_with(
                        Capability::FetchPatient,
                        error.clone(),
                        Some(json!({ "link": Value::Null })),
                        Some(err.to_value()),
                    ));
                    self.dispatch(Action::failure_with(
                        Capability::Login,
                        error,
                        Some(Value::Null),
                        Some(err.to_value()),
                    ));
                    return;
                }
            }
        }

        self.dispatch(Action::success_with(
            Capability::Login,
            json!({ "user": merged }),
        ));
        self.track("Logged In");
        if let Some(tail) = success_tail {
            self.dispatch(tail);
        }
        if resource::has_clinic_role(&user) && !resource::has_clinic_profile(&user) {
            self.navigate("/clinician-details");
        } else {
            self.navigate("/patients?justLoggedIn=true");
        }
    }

    /// Unverified e-mail: a soft LOGIN_FAILURE (no banner), a fire-and-forget
    /// resend of the verification e-mail, and the verification redirect. The
    /// resend never gates the failure dispatch, so its outcome is reported as
    /// unknown.
    fn soft_login_failure(&self, username: &str, api_error: Value) {
        self.dispatch(Action::failure_with(
            Capability::Login,
            None,
            Some(json!({ "isLoggedIn": false, "emailVerificationSent": false })),
            Some(api_error),
        ));
        let api = std::sync::Arc::clone(&self.api);
        let email = username.to_string();
        tokio::spawn(async move {
            if let Err(err) = api.resend_email_verification(&email).await {
                tracing::warn!(status = err.status, "verification e-mail resend failed");
            }
        });
        self.navigate("/email-verification");
    }

    /// End the session. The data worker is told to drop the loaded patient's
    /// data; the server-side logout outcome never blocks the local teardown.
    pub async fn logout(&self) {
        let state = self.store.state();
        self.dispatch(Action::request(Capability::Logout));
        let patient_id = state.data.fetched_patient_id.unwrap_or_default();
        self.dispatch(
            Action::request_with(
                Capability::DataWorkerRemoveData,
                json!({ "predicate": Value::Null }),
            )
            .with_meta(Meta::data_worker(self.origin.clone(), patient_id)),
        );
        if let Err(err) = self.api.logout().await {
            tracing::warn!(status = err.status, "server-side logout failed");
        }
        self.dispatch(Action::success(Capability::Logout));
        self.track("Logged Out");
        self.navigate("/");
    }

    pub async fn request_password_reset(&self, email: &str) {
        self.dispatch(Action::request(Capability::RequestPasswordReset));
        match self.api.request_password_reset(email).await {
            Ok(()) => self.dispatch(Action::success(Capability::RequestPasswordReset)),
            Err(err) => self.fail(Capability::RequestPasswordReset, &err),
        }
    }

    pub async fn confirm_password_reset(&self, payload: Value) {
        self.dispatch(Action::request(Capability::ConfirmPasswordReset));
        match self.api.confirm_password_reset(&payload).await {
            Ok(()) => self.dispatch(Action::success(Capability::ConfirmPasswordReset)),
            Err(err) => self.fail(Capability::ConfirmPasswordReset, &err),
        }
    }
}
