//! Programmable in-memory collaborator (used in tests and offline demos).
//!
//! Outcomes are scripted per method name; unscripted methods succeed with
//! `null`. Every invocation is recorded with its arguments so tests can
//! assert call counts and shapes.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use shiosai_core::error::{ApiError, ApiResult};

use crate::api::{
    AccessApi, DataQuery, DeviceApi, ErrorApi, InvitationApi, MetadataApi, PatientApi,
    PatientDataApi, PrescriptionApi, ServerApi, TeamApi, UserApi,
};

#[derive(Default)]
pub struct MockApi {
    responses: Mutex<HashMap<String, VecDeque<ApiResult<Value>>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockApi {
    pub fn new() -> Self {
        MockApi::default()
    }

    /// Queue an outcome for a method; queued outcomes are consumed in order.
    pub fn on(&self, method: &str, result: ApiResult<Value>) -> &Self {
        match self.responses.lock() {
            Ok(mut guard) => guard.entry(method.to_string()).or_default().push_back(result),
            Err(poisoned) => poisoned
                .into_inner()
                .entry(method.to_string())
                .or_default()
                .push_back(result),
        }
        self
    }

    pub fn on_ok(&self, method: &str, value: Value) -> &Self {
        self.on(method, Ok(value))
    }

    pub fn on_err(&self, method: &str, status: u16, body: Value) -> &Self {
        self.on(method, Err(ApiError::new(status, body)))
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.recorded()
            .iter()
            .filter(|(name, _)| name == method)
            .count()
    }

    /// Arguments of every recorded call to a method, in call order.
    pub fn call_args(&self, method: &str) -> Vec<Value> {
        self.recorded()
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn recorded(&self) -> Vec<(String, Value)> {
        match self.calls.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn invoke(&self, method: &str, args: Value) -> ApiResult<Value> {
        match self.calls.lock() {
            Ok(mut guard) => guard.push((method.to_string(), args)),
            Err(poisoned) => poisoned.into_inner().push((method.to_string(), args)),
        }
        let scripted = match self.responses.lock() {
            Ok(mut guard) => guard.get_mut(method).and_then(VecDeque::pop_front),
            Err(poisoned) => poisoned
                .into_inner()
                .get_mut(method)
                .and_then(VecDeque::pop_front),
        };
        scripted.unwrap_or(Ok(Value::Null))
    }

    fn invoke_list(&self, method: &str, args: Value) -> ApiResult<Vec<Value>> {
        match self.invoke(method, args)? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }

    fn invoke_unit(&self, method: &str, args: Value) -> ApiResult<()> {
        self.invoke(method, args).map(|_| ())
    }
}

#[async_trait]
impl UserApi for MockApi {
    async fn signup(&self, details: &Value) -> ApiResult<Value> {
        self.invoke("user.signup", json!([details]))
    }

    async fn confirm_sign_up(&self, key: &str) -> ApiResult<()> {
        self.invoke_unit("user.confirmSignUp", json!([key]))
    }

    async fn custodial_confirm_sign_up(
        &self,
        key: &str,
        birthday: &str,
        password: &str,
    ) -> ApiResult<()> {
        self.invoke_unit(
            "user.custodialConfirmSignUp",
            json!([key, birthday, password]),
        )
    }

    async fn resend_email_verification(&self, email: &str) -> ApiResult<()> {
        self.invoke_unit("user.resendEmailVerification", json!([email]))
    }

    async fn login(&self, username: &str, _password: &str) -> ApiResult<()> {
        self.invoke_unit("user.login", json!([username]))
    }

    async fn logout(&self) -> ApiResult<()> {
        self.invoke_unit("user.logout", json!([]))
    }

    async fn get_current_user(&self) -> ApiResult<Value> {
        self.invoke("user.get", json!([]))
    }

    async fn update_current_user(&self, updates: &Value) -> ApiResult<Value> {
        self.invoke("user.put", json!([updates]))
    }

    async fn accept_terms(&self, terms: &Value) -> ApiResult<Option<Value>> {
        match self.invoke("user.acceptTerms", json!([terms]))? {
            Value::Null => Ok(None),
            other => Ok(Some(other)),
        }
    }

    async fn request_password_reset(&self, email: &str) -> ApiResult<()> {
        self.invoke_unit("user.requestPasswordReset", json!([email]))
    }

    async fn confirm_password_reset(&self, payload: &Value) -> ApiResult<()> {
        self.invoke_unit("user.confirmPasswordReset", json!([payload]))
    }

    async fn get_associated_accounts(&self) -> ApiResult<Value> {
        self.invoke("user.getAssociatedAccounts", json!([]))
    }

    async fn get_data_sources(&self) -> ApiResult<Vec<Value>> {
        self.invoke_list("user.getDataSources", json!([]))
    }

    async fn create_restricted_token(&self, request: &Value) -> ApiResult<Value> {
        self.invoke("user.createRestrictedToken", json!([request]))
    }

    async fn create_oauth_provider_authorization(
        &self,
        provider: &str,
        restricted_token: &str,
    ) -> ApiResult<String> {
        let value = self.invoke(
            "user.createOAuthProviderAuthorization",
            json!([provider, restricted_token]),
        )?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn delete_oauth_provider_authorization(&self, provider: &str) -> ApiResult<()> {
        self.invoke_unit("user.deleteOAuthProviderAuthorization", json!([provider]))
    }
}

#[async_trait]
impl PatientApi for MockApi {
    async fn get_patient(&self, patient_id: &str) -> ApiResult<Value> {
        self.invoke("patient.get", json!([patient_id]))
    }

    async fn create_patient(&self, patient: &Value) -> ApiResult<Value> {
        self.invoke("patient.post", json!([patient]))
    }

    async fn update_patient(&self, patient: &Value) -> ApiResult<Value> {
        self.invoke("patient.put", json!([patient]))
    }
}

#[async_trait]
impl PatientDataApi for MockApi {
    async fn get_patient_data(
        &self,
        patient_id: &str,
        query: &DataQuery,
    ) -> ApiResult<Vec<Value>> {
        self.invoke_list("patientData.get", json!([patient_id, query]))
    }
}

#[async_trait]
impl InvitationApi for MockApi {
    async fn send_invite(&self, email: &str, permissions: &Value) -> ApiResult<Value> {
        self.invoke("invitation.send", json!([email, permissions]))
    }

    async fn cancel_invite(&self, email: &str) -> ApiResult<()> {
        self.invoke_unit("invitation.cancel", json!([email]))
    }

    async fn accept_invite(&self, key: &str, creator_id: &str) -> ApiResult<Value> {
        self.invoke("invitation.accept", json!([key, creator_id]))
    }

    async fn dismiss_invite(&self, key: &str, creator_id: &str) -> ApiResult<Value> {
        self.invoke("invitation.dismiss", json!([key, creator_id]))
    }

    async fn get_sent_invites(&self) -> ApiResult<Vec<Value>> {
        self.invoke_list("invitation.getSent", json!([]))
    }

    async fn get_received_invites(&self) -> ApiResult<Vec<Value>> {
        self.invoke_list("invitation.getReceived", json!([]))
    }
}

#[async_trait]
impl AccessApi for MockApi {
    async fn leave_group(&self, patient_id: &str) -> ApiResult<()> {
        self.invoke_unit("access.leaveGroup", json!([patient_id]))
    }

    async fn remove_member(&self, member_id: &str) -> ApiResult<()> {
        self.invoke_unit("access.removeMember", json!([member_id]))
    }

    async fn set_member_permissions(
        &self,
        member_id: &str,
        permissions: &Value,
    ) -> ApiResult<()> {
        self.invoke_unit("access.setMemberPermissions", json!([member_id, permissions]))
    }
}

#[async_trait]
impl MetadataApi for MockApi {
    async fn put_preferences(&self, patient_id: &str, preferences: &Value) -> ApiResult<Value> {
        self.invoke("metadata.preferences.put", json!([patient_id, preferences]))
    }

    async fn get_settings(&self, patient_id: &str) -> ApiResult<Value> {
        self.invoke("metadata.settings.get", json!([patient_id]))
    }

    async fn put_settings(&self, patient_id: &str, settings: &Value) -> ApiResult<Value> {
        self.invoke("metadata.settings.put", json!([patient_id, settings]))
    }
}

#[async_trait]
impl PrescriptionApi for MockApi {
    async fn get_prescriptions(&self) -> ApiResult<Vec<Value>> {
        self.invoke_list("prescription.getAll", json!([]))
    }

    async fn create_prescription(&self, prescription: &Value) -> ApiResult<Value> {
        self.invoke("prescription.create", json!([prescription]))
    }

    async fn create_prescription_revision(
        &self,
        revision: &Value,
        prescription_id: &str,
    ) -> ApiResult<Value> {
        self.invoke("prescription.createRevision", json!([revision, prescription_id]))
    }

    async fn delete_prescription(&self, prescription_id: &str) -> ApiResult<()> {
        self.invoke_unit("prescription.delete", json!([prescription_id]))
    }
}

#[async_trait]
impl DeviceApi for MockApi {
    async fn get_devices(&self) -> ApiResult<Vec<Value>> {
        self.invoke_list("devices.getAll", json!([]))
    }
}

#[async_trait]
impl TeamApi for MockApi {
    async fn get_notes(&self, patient_id: &str) -> ApiResult<Vec<Value>> {
        self.invoke_list("team.getNotes", json!([patient_id]))
    }

    async fn get_message_thread(&self, message_id: &str) -> ApiResult<Vec<Value>> {
        self.invoke_list("team.getMessageThread", json!([message_id]))
    }

    async fn start_message_thread(&self, message: &Value) -> ApiResult<Value> {
        self.invoke("team.startMessageThread", json!([message]))
    }

    async fn edit_message(&self, message: &Value) -> ApiResult<()> {
        self.invoke_unit("team.editMessage", json!([message]))
    }
}

#[async_trait]
impl ServerApi for MockApi {
    async fn get_time(&self) -> ApiResult<Value> {
        self.invoke("server.getTime", json!([]))
    }
}

#[async_trait]
impl ErrorApi for MockApi {
    async fn log_error(&self, error: &str, message: &str, properties: &Value) -> ApiResult<()> {
        self.invoke_unit("errors.log", json!([error, message, properties]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_outcomes_consumed_in_order() {
        let api = MockApi::new();
        api.on_ok("patient.get", json!({ "id": 1 }))
            .on_err("patient.get", 500, json!("Error!"));

        assert_eq!(api.get_patient("1").await.unwrap()["id"], 1);
        assert_eq!(api.get_patient("1").await.unwrap_err().status, 500);
        // Unscripted falls back to null.
        assert!(api.get_patient("1").await.unwrap().is_null());
        assert_eq!(api.call_count("patient.get"), 3);
    }

    #[tokio::test]
    async fn test_call_args_recorded() {
        let api = MockApi::new();
        let _ = api.send_invite("a@b.com", &json!({ "view": true })).await;
        let args = api.call_args("invitation.send");
        assert_eq!(args[0][0], "a@b.com");
        assert_eq!(args[0][1]["view"], true);
    }
}
