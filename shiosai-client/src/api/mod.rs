//! The external API collaborator boundary.
//!
//! One trait per backend namespace, combined by the [`PortalApi`] supertrait.
//! Every method is the async rendering of the backend's
//! `method(...args, callback(error, result))` contract: `Err(ApiError)` is
//! the callback error, `Ok(T)` the result. Coordinators receive the
//! collaborator injected; tests substitute [`mock::MockApi`].

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use shiosai_core::error::ApiResult;

/// Query of a patient-data fetch, either the latest-per-type probe or the
/// full window read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataQuery {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<u32>,
    #[serde(rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(rename = "uploadId", skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
}

/// Account management and session endpoints.
#[async_trait]
pub trait UserApi {
    async fn signup(&self, details: &Value) -> ApiResult<Value>;
    async fn confirm_sign_up(&self, key: &str) -> ApiResult<()>;
    async fn custodial_confirm_sign_up(
        &self,
        key: &str,
        birthday: &str,
        password: &str,
    ) -> ApiResult<()>;
    async fn resend_email_verification(&self, email: &str) -> ApiResult<()>;
    /// Establishes the session; the implementation captures the session
    /// token for subsequent calls.
    async fn login(&self, username: &str, password: &str) -> ApiResult<()>;
    async fn logout(&self) -> ApiResult<()>;
    async fn get_current_user(&self) -> ApiResult<Value>;
    async fn update_current_user(&self, updates: &Value) -> ApiResult<Value>;
    /// May return the updated user record; older backends return nothing.
    async fn accept_terms(&self, terms: &Value) -> ApiResult<Option<Value>>;
    async fn request_password_reset(&self, email: &str) -> ApiResult<()>;
    async fn confirm_password_reset(&self, payload: &Value) -> ApiResult<()>;
    async fn get_associated_accounts(&self) -> ApiResult<Value>;
    async fn get_data_sources(&self) -> ApiResult<Vec<Value>>;
    async fn create_restricted_token(&self, request: &Value) -> ApiResult<Value>;
    async fn create_oauth_provider_authorization(
        &self,
        provider: &str,
        restricted_token: &str,
    ) -> ApiResult<String>;
    async fn delete_oauth_provider_authorization(&self, provider: &str) -> ApiResult<()>;
}

/// Patient record endpoints.
#[async_trait]
pub trait PatientApi {
    async fn get_patient(&self, patient_id: &str) -> ApiResult<Value>;
    async fn create_patient(&self, patient: &Value) -> ApiResult<Value>;
    async fn update_patient(&self, patient: &Value) -> ApiResult<Value>;
}

/// Device-data (time series) endpoints.
#[async_trait]
pub trait PatientDataApi {
    async fn get_patient_data(&self, patient_id: &str, query: &DataQuery)
        -> ApiResult<Vec<Value>>;
}

/// Care-team invitation endpoints.
#[async_trait]
pub trait InvitationApi {
    async fn send_invite(&self, email: &str, permissions: &Value) -> ApiResult<Value>;
    async fn cancel_invite(&self, email: &str) -> ApiResult<()>;
    async fn accept_invite(&self, key: &str, creator_id: &str) -> ApiResult<Value>;
    async fn dismiss_invite(&self, key: &str, creator_id: &str) -> ApiResult<Value>;
    async fn get_sent_invites(&self) -> ApiResult<Vec<Value>>;
    async fn get_received_invites(&self) -> ApiResult<Vec<Value>>;
}

/// Care-team membership and permission endpoints.
#[async_trait]
pub trait AccessApi {
    async fn leave_group(&self, patient_id: &str) -> ApiResult<()>;
    async fn remove_member(&self, member_id: &str) -> ApiResult<()>;
    async fn set_member_permissions(&self, member_id: &str, permissions: &Value)
        -> ApiResult<()>;
}

/// Per-account preference and settings metadata.
#[async_trait]
pub trait MetadataApi {
    async fn put_preferences(&self, patient_id: &str, preferences: &Value) -> ApiResult<Value>;
    async fn get_settings(&self, patient_id: &str) -> ApiResult<Value>;
    async fn put_settings(&self, patient_id: &str, settings: &Value) -> ApiResult<Value>;
}

/// Prescription workflow endpoints.
#[async_trait]
pub trait PrescriptionApi {
    async fn get_prescriptions(&self) -> ApiResult<Vec<Value>>;
    async fn create_prescription(&self, prescription: &Value) -> ApiResult<Value>;
    async fn create_prescription_revision(
        &self,
        revision: &Value,
        prescription_id: &str,
    ) -> ApiResult<Value>;
    async fn delete_prescription(&self, prescription_id: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait DeviceApi {
    async fn get_devices(&self) -> ApiResult<Vec<Value>>;
}

/// Care-team messaging endpoints.
#[async_trait]
pub trait TeamApi {
    async fn get_notes(&self, patient_id: &str) -> ApiResult<Vec<Value>>;
    async fn get_message_thread(&self, message_id: &str) -> ApiResult<Vec<Value>>;
    async fn start_message_thread(&self, message: &Value) -> ApiResult<Value>;
    async fn edit_message(&self, message: &Value) -> ApiResult<()>;
}

#[async_trait]
pub trait ServerApi {
    /// Returns the `{ data: { time } }` envelope.
    async fn get_time(&self) -> ApiResult<Value>;
}

#[async_trait]
pub trait ErrorApi {
    async fn log_error(&self, error: &str, message: &str, properties: &Value) -> ApiResult<()>;
}

/// The full collaborator surface required by the coordinators.
pub trait PortalApi:
    UserApi
    + PatientApi
    + PatientDataApi
    + InvitationApi
    + AccessApi
    + MetadataApi
    + PrescriptionApi
    + DeviceApi
    + TeamApi
    + ServerApi
    + ErrorApi
    + Send
    + Sync
    + 'static
{
}

impl<T> PortalApi for T where
    T: UserApi
        + PatientApi
        + PatientDataApi
        + InvitationApi
        + AccessApi
        + MetadataApi
        + PrescriptionApi
        + DeviceApi
        + TeamApi
        + ServerApi
        + ErrorApi
        + Send
        + Sync
        + 'static
{
}
