//! reqwest-backed implementation of the collaborator traits.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use shiosai_core::error::{ApiError, ApiResult};

use crate::api::{
    AccessApi, DataQuery, DeviceApi, ErrorApi, InvitationApi, MetadataApi, PatientApi,
    PatientDataApi, PrescriptionApi, ServerApi, TeamApi, UserApi,
};
use crate::config::ApiSettings;

/// Session token response header.
const SESSION_TOKEN_HEADER: &str = "x-shiosai-session-token";

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpApi {
    pub fn new(settings: &ApiSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(HttpApi {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.url(path))
            .header("x-request-id", Uuid::new_v4().to_string());
        let token = match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        if let Some(token) = token {
            builder = builder.header(SESSION_TOKEN_HEADER, token);
        }
        builder
    }

    fn store_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    /// Execute a request, mapping non-2xx responses and transport failures
    /// to the collaborator error shape.
    async fn execute(&self, builder: RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .ok()
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
            .unwrap_or(Value::Null);
        tracing::debug!(status = status.as_u16(), "backend call failed");
        Err(ApiError::new(status.as_u16(), body))
    }

    async fn json(&self, builder: RequestBuilder) -> ApiResult<Value> {
        let response = self.execute(builder).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        response.json().await.map_err(transport_error)
    }

    async fn json_list(&self, builder: RequestBuilder) -> ApiResult<Vec<Value>> {
        match self.json(builder).await? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Ok(vec![other]),
        }
    }

    async fn unit(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.execute(builder).await.map(|_| ())
    }
}

/// Transport failures carry no backend status; surface them as an
/// unavailable service so the taxonomy mapper picks the capability default.
fn transport_error(err: reqwest::Error) -> ApiError {
    ApiError::new(503, Value::String(err.to_string()))
}

#[async_trait]
impl UserApi for HttpApi {
    async fn signup(&self, details: &Value) -> ApiResult<Value> {
        self.json(self.request(Method::POST, "/auth/user").json(details))
            .await
    }

    async fn confirm_sign_up(&self, key: &str) -> ApiResult<()> {
        let path = format!("/confirm/accept/signup/{}", urlencoding::encode(key));
        self.unit(self.request(Method::PUT, &path)).await
    }

    async fn custodial_confirm_sign_up(
        &self,
        key: &str,
        birthday: &str,
        password: &str,
    ) -> ApiResult<()> {
        let path = format!("/confirm/accept/signup/{}", urlencoding::encode(key));
        let body = serde_json::json!({ "birthday": birthday, "password": password });
        self.unit(self.request(Method::PUT, &path).json(&body)).await
    }

    async fn resend_email_verification(&self, email: &str) -> ApiResult<()> {
        let path = format!("/confirm/resend/signup/{}", urlencoding::encode(email));
        self.unit(self.request(Method::POST, &path)).await
    }

    async fn login(&self, username: &str, password: &str) -> ApiResult<()> {
        let credentials =
            base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        let builder = self
            .request(Method::POST, "/auth/login")
            .header("Authorization", format!("Basic {credentials}"));
        let response = self.execute(builder).await?;
        let token = response
            .headers()
            .get(SESSION_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.store_token(token);
        Ok(())
    }

    async fn logout(&self) -> ApiResult<()> {
        let result = self.unit(self.request(Method::POST, "/auth/logout")).await;
        self.store_token(None);
        result
    }

    async fn get_current_user(&self) -> ApiResult<Value> {
        self.json(self.request(Method::GET, "/auth/user")).await
    }

    async fn update_current_user(&self, updates: &Value) -> ApiResult<Value> {
        self.json(self.request(Method::PUT, "/auth/user").json(updates))
            .await
    }

    async fn accept_terms(&self, terms: &Value) -> ApiResult<Option<Value>> {
        let value = self
            .json(self.request(Method::PUT, "/auth/user").json(terms))
            .await?;
        Ok(match value {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn request_password_reset(&self, email: &str) -> ApiResult<()> {
        let path = format!("/confirm/send/forgot/{}", urlencoding::encode(email));
        self.unit(self.request(Method::POST, &path)).await
    }

    async fn confirm_password_reset(&self, payload: &Value) -> ApiResult<()> {
        self.unit(self.request(Method::PUT, "/confirm/accept/forgot").json(payload))
            .await
    }

    async fn get_associated_accounts(&self) -> ApiResult<Value> {
        self.json(self.request(Method::GET, "/metadata/users")).await
    }

    async fn get_data_sources(&self) -> ApiResult<Vec<Value>> {
        self.json_list(self.request(Method::GET, "/v1/users/self/data_sources"))
            .await
    }

    async fn create_restricted_token(&self, request: &Value) -> ApiResult<Value> {
        self.json(
            self.request(Method::POST, "/v1/users/self/restricted_tokens")
                .json(request),
        )
        .await
    }

    async fn create_oauth_provider_authorization(
        &self,
        provider: &str,
        restricted_token: &str,
    ) -> ApiResult<String> {
        let path = format!("/v1/oauth/{}/authorize", urlencoding::encode(provider));
        let body = serde_json::json!({ "restrictedToken": restricted_token });
        let value = self.json(self.request(Method::POST, &path).json(&body)).await?;
        Ok(value
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    async fn delete_oauth_provider_authorization(&self, provider: &str) -> ApiResult<()> {
        let path = format!("/v1/oauth/{}", urlencoding::encode(provider));
        self.unit(self.request(Method::DELETE, &path)).await
    }
}

#[async_trait]
impl PatientApi for HttpApi {
    async fn get_patient(&self, patient_id: &str) -> ApiResult<Value> {
        let path = format!("/metadata/{}/patient", urlencoding::encode(patient_id));
        self.json(self.request(Method::GET, &path)).await
    }

    async fn create_patient(&self, patient: &Value) -> ApiResult<Value> {
        self.json(self.request(Method::POST, "/metadata/self/patient").json(patient))
            .await
    }

    async fn update_patient(&self, patient: &Value) -> ApiResult<Value> {
        let id = shiosai_core::resource::record_id(patient).unwrap_or_default();
        let path = format!("/metadata/{}/patient", urlencoding::encode(&id));
        self.json(self.request(Method::PUT, &path).json(patient)).await
    }
}

#[async_trait]
impl PatientDataApi for HttpApi {
    async fn get_patient_data(
        &self,
        patient_id: &str,
        query: &DataQuery,
    ) -> ApiResult<Vec<Value>> {
        let path = format!("/data/{}", urlencoding::encode(patient_id));
        self.json_list(self.request(Method::GET, &path).query(query))
            .await
    }
}

#[async_trait]
impl InvitationApi for HttpApi {
    async fn send_invite(&self, email: &str, permissions: &Value) -> ApiResult<Value> {
        let body = serde_json::json!({ "email": email, "permissions": permissions });
        self.json(self.request(Method::POST, "/confirm/send/invite").json(&body))
            .await
    }

    async fn cancel_invite(&self, email: &str) -> ApiResult<()> {
        let path = format!("/confirm/cancel/invite/{}", urlencoding::encode(email));
        self.unit(self.request(Method::PUT, &path)).await
    }

    async fn accept_invite(&self, key: &str, creator_id: &str) -> ApiResult<Value> {
        let path = format!(
            "/confirm/accept/invite/{}/{}",
            urlencoding::encode(creator_id),
            urlencoding::encode(key)
        );
        self.json(self.request(Method::PUT, &path)).await
    }

    async fn dismiss_invite(&self, key: &str, creator_id: &str) -> ApiResult<Value> {
        let path = format!(
            "/confirm/dismiss/invite/{}/{}",
            urlencoding::encode(creator_id),
            urlencoding::encode(key)
        );
        self.json(self.request(Method::PUT, &path)).await
    }

    async fn get_sent_invites(&self) -> ApiResult<Vec<Value>> {
        self.json_list(self.request(Method::GET, "/confirm/invitations/sent"))
            .await
    }

    async fn get_received_invites(&self) -> ApiResult<Vec<Value>> {
        self.json_list(self.request(Method::GET, "/confirm/invitations/received"))
            .await
    }
}

#[async_trait]
impl AccessApi for HttpApi {
    async fn leave_group(&self, patient_id: &str) -> ApiResult<()> {
        let path = format!("/access/groups/{}", urlencoding::encode(patient_id));
        self.unit(self.request(Method::DELETE, &path)).await
    }

    async fn remove_member(&self, member_id: &str) -> ApiResult<()> {
        let path = format!("/access/members/{}", urlencoding::encode(member_id));
        self.unit(self.request(Method::DELETE, &path)).await
    }

    async fn set_member_permissions(
        &self,
        member_id: &str,
        permissions: &Value,
    ) -> ApiResult<()> {
        let path = format!("/access/members/{}", urlencoding::encode(member_id));
        self.unit(self.request(Method::POST, &path).json(permissions))
            .await
    }
}

#[async_trait]
impl MetadataApi for HttpApi {
    async fn put_preferences(&self, patient_id: &str, preferences: &Value) -> ApiResult<Value> {
        let path = format!("/metadata/{}/preferences", urlencoding::encode(patient_id));
        self.json(self.request(Method::PUT, &path).json(preferences))
            .await
    }

    async fn get_settings(&self, patient_id: &str) -> ApiResult<Value> {
        let path = format!("/metadata/{}/settings", urlencoding::encode(patient_id));
        self.json(self.request(Method::GET, &path)).await
    }

    async fn put_settings(&self, patient_id: &str, settings: &Value) -> ApiResult<Value> {
        let path = format!("/metadata/{}/settings", urlencoding::encode(patient_id));
        self.json(self.request(Method::PUT, &path).json(settings)).await
    }
}

#[async_trait]
impl PrescriptionApi for HttpApi {
    async fn get_prescriptions(&self) -> ApiResult<Vec<Value>> {
        self.json_list(self.request(Method::GET, "/v1/prescriptions")).await
    }

    async fn create_prescription(&self, prescription: &Value) -> ApiResult<Value> {
        self.json(self.request(Method::POST, "/v1/prescriptions").json(prescription))
            .await
    }

    async fn create_prescription_revision(
        &self,
        revision: &Value,
        prescription_id: &str,
    ) -> ApiResult<Value> {
        let path = format!(
            "/v1/prescriptions/{}/revisions",
            urlencoding::encode(prescription_id)
        );
        self.json(self.request(Method::POST, &path).json(revision)).await
    }

    async fn delete_prescription(&self, prescription_id: &str) -> ApiResult<()> {
        let path = format!("/v1/prescriptions/{}", urlencoding::encode(prescription_id));
        self.unit(self.request(Method::DELETE, &path)).await
    }
}

#[async_trait]
impl DeviceApi for HttpApi {
    async fn get_devices(&self) -> ApiResult<Vec<Value>> {
        self.json_list(self.request(Method::GET, "/v1/devices")).await
    }
}

#[async_trait]
impl TeamApi for HttpApi {
    async fn get_notes(&self, patient_id: &str) -> ApiResult<Vec<Value>> {
        let path = format!("/message/notes/{}", urlencoding::encode(patient_id));
        self.json_list(self.request(Method::GET, &path)).await
    }

    async fn get_message_thread(&self, message_id: &str) -> ApiResult<Vec<Value>> {
        let path = format!("/message/thread/{}", urlencoding::encode(message_id));
        self.json_list(self.request(Method::GET, &path)).await
    }

    async fn start_message_thread(&self, message: &Value) -> ApiResult<Value> {
        self.json(self.request(Method::POST, "/message/send").json(message))
            .await
    }

    async fn edit_message(&self, message: &Value) -> ApiResult<()> {
        self.unit(self.request(Method::PUT, "/message/edit").json(message))
            .await
    }
}

#[async_trait]
impl ServerApi for HttpApi {
    async fn get_time(&self) -> ApiResult<Value> {
        self.json(self.request(Method::GET, "/time")).await
    }
}

#[async_trait]
impl ErrorApi for HttpApi {
    async fn log_error(&self, error: &str, message: &str, properties: &Value) -> ApiResult<()> {
        let body = serde_json::json!({
            "error": error,
            "message": message,
            "properties": properties,
        });
        self.unit(self.request(Method::POST, "/errors").json(&body)).await
    }
}
