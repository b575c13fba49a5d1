//! Action vocabulary for the portal state container.
//!
//! Every state mutation in the client flows through a dispatched [`Action`].
//! Network-backed operations use a three-phase protocol (REQUEST / SUCCESS /
//! FAILURE) keyed by [`Capability`]; a handful of one-shot kinds cover
//! navigation, banner dismissal and notification acknowledgement.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::ErrorInfo;
use crate::working::WorkingKey;

/// One network-backed operation of the portal. Each capability owns a
/// REQUEST/SUCCESS/FAILURE action triple and (usually) a working-state key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    FetchUser,
    FetchPendingSentInvites,
    FetchPendingReceivedInvites,
    FetchAssociatedAccounts,
    FetchPatient,
    FetchPatientData,
    FetchPrescriptions,
    CreatePrescription,
    CreatePrescriptionRevision,
    DeletePrescription,
    FetchDevices,
    FetchMessageThread,
    CreateMessageThread,
    EditMessageThread,
    Login,
    Logout,
    Signup,
    ConfirmSignup,
    ConfirmPasswordReset,
    AcceptTerms,
    ResendEmailVerification,
    SetupDataStorage,
    RemoveMembershipInOtherCareTeam,
    RemoveMemberFromTargetCareTeam,
    RequestPasswordReset,
    SendInvite,
    CancelSentInvite,
    AcceptReceivedInvite,
    RejectReceivedInvite,
    SetMemberPermissions,
    UpdatePatient,
    UpdatePatientBgUnits,
    UpdateUser,
    UpdatePreferences,
    UpdateSettings,
    FetchSettings,
    VerifyCustodial,
    GeneratePdf,
    DataWorkerAddData,
    DataWorkerRemoveData,
    DataWorkerUpdateDatum,
    DataWorkerQueryData,
    UpdateDataDonationAccounts,
    FetchDataSources,
    ConnectDataSource,
    DisconnectDataSource,
    FetchServerTime,
    LogError,
}

impl Capability {
    /// Wire prefix of the capability's action kinds, e.g. `FETCH_PATIENT_DATA`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FetchUser => "FETCH_USER",
            Capability::FetchPendingSentInvites => "FETCH_PENDING_SENT_INVITES",
            Capability::FetchPendingReceivedInvites => "FETCH_PENDING_RECEIVED_INVITES",
            Capability::FetchAssociatedAccounts => "FETCH_ASSOCIATED_ACCOUNTS",
            Capability::FetchPatient => "FETCH_PATIENT",
            Capability::FetchPatientData => "FETCH_PATIENT_DATA",
            Capability::FetchPrescriptions => "FETCH_PRESCRIPTIONS",
            Capability::CreatePrescription => "CREATE_PRESCRIPTION",
            Capability::CreatePrescriptionRevision => "CREATE_PRESCRIPTION_REVISION",
            Capability::DeletePrescription => "DELETE_PRESCRIPTION",
            Capability::FetchDevices => "FETCH_DEVICES",
            Capability::FetchMessageThread => "FETCH_MESSAGE_THREAD",
            Capability::CreateMessageThread => "CREATE_MESSAGE_THREAD",
            Capability::EditMessageThread => "EDIT_MESSAGE_THREAD",
            Capability::Login => "LOGIN",
            Capability::Logout => "LOGOUT",
            Capability::Signup => "SIGNUP",
            Capability::ConfirmSignup => "CONFIRM_SIGNUP",
            Capability::ConfirmPasswordReset => "CONFIRM_PASSWORD_RESET",
            Capability::AcceptTerms => "ACCEPT_TERMS",
            Capability::ResendEmailVerification => "RESEND_EMAIL_VERIFICATION",
            Capability::SetupDataStorage => "SETUP_DATA_STORAGE",
            Capability::RemoveMembershipInOtherCareTeam => {
                "REMOVE_MEMBERSHIP_IN_OTHER_CARE_TEAM"
            }
            Capability::RemoveMemberFromTargetCareTeam => {
                "REMOVE_MEMBER_FROM_TARGET_CARE_TEAM"
            }
            Capability::RequestPasswordReset => "REQUEST_PASSWORD_RESET",
            Capability::SendInvite => "SEND_INVITE",
            Capability::CancelSentInvite => "CANCEL_SENT_INVITE",
            Capability::AcceptReceivedInvite => "ACCEPT_RECEIVED_INVITE",
            Capability::RejectReceivedInvite => "REJECT_RECEIVED_INVITE",
            Capability::SetMemberPermissions => "SET_MEMBER_PERMISSIONS",
            Capability::UpdatePatient => "UPDATE_PATIENT",
            Capability::UpdatePatientBgUnits => "UPDATE_PATIENT_BG_UNITS",
            Capability::UpdateUser => "UPDATE_USER",
            Capability::UpdatePreferences => "UPDATE_PREFERENCES",
            Capability::UpdateSettings => "UPDATE_SETTINGS",
            Capability::FetchSettings => "FETCH_SETTINGS",
            Capability::VerifyCustodial => "VERIFY_CUSTODIAL",
            Capability::GeneratePdf => "GENERATE_PDF",
            Capability::DataWorkerAddData => "DATA_WORKER_ADD_DATA",
            Capability::DataWorkerRemoveData => "DATA_WORKER_REMOVE_DATA",
            Capability::DataWorkerUpdateDatum => "DATA_WORKER_UPDATE_DATUM",
            Capability::DataWorkerQueryData => "DATA_WORKER_QUERY_DATA",
            Capability::UpdateDataDonationAccounts => "UPDATE_DATA_DONATION_ACCOUNTS",
            Capability::FetchDataSources => "FETCH_DATA_SOURCES",
            Capability::ConnectDataSource => "CONNECT_DATA_SOURCE",
            Capability::DisconnectDataSource => "DISCONNECT_DATA_SOURCE",
            Capability::FetchServerTime => "FETCH_SERVER_TIME",
            Capability::LogError => "LOG_ERROR",
        }
    }
}

/// Phase of a capability's action triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Request,
    Success,
    Failure,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Request => "REQUEST",
            Phase::Success => "SUCCESS",
            Phase::Failure => "FAILURE",
        }
    }
}

/// The closed enumeration of dispatched action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// A phase of a capability triple, e.g. `LOGIN_REQUEST`.
    Op(Capability, Phase),
    /// Route-change instruction consumed by the navigation layer.
    Navigate,
    /// One-shot banner dismissal.
    DismissBanner,
    /// Clears a parked working-state notification.
    AcknowledgeNotification,
    /// Drops any cached generated PDFs.
    RemoveGeneratedPdfs,
}

impl ActionKind {
    /// Working-state key resolved for this kind, if the kind participates in
    /// in-flight tracking. The relation is total over the enum, so adding a
    /// capability without deciding its key is a compile error.
    pub fn working_key(&self) -> Option<WorkingKey> {
        match self {
            ActionKind::Op(capability, _) => capability.working_key(),
            ActionKind::RemoveGeneratedPdfs => Some(WorkingKey::RemovingGeneratedPdfs),
            ActionKind::Navigate
            | ActionKind::DismissBanner
            | ActionKind::AcknowledgeNotification => None,
        }
    }

    pub fn phase(&self) -> Option<Phase> {
        match self {
            ActionKind::Op(_, phase) => Some(*phase),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionKind::Op(capability, phase) => {
                write!(f, "{}_{}", capability.as_str(), phase.as_str())
            }
            ActionKind::Navigate => write!(f, "NAVIGATE"),
            ActionKind::DismissBanner => write!(f, "DISMISS_BANNER"),
            ActionKind::AcknowledgeNotification => write!(f, "ACKNOWLEDGE_NOTIFICATION"),
            ActionKind::RemoveGeneratedPdfs => write!(f, "REMOVE_GENERATED_PDFS"),
        }
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Out-of-band action metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Meta {
    /// Raw collaborator error (object), or a contract-error description
    /// (string) for programmer errors such as an unknown provider type.
    #[serde(rename = "apiError", skip_serializing_if = "Option::is_none")]
    pub api_error: Option<Value>,
    /// Marks actions addressed to the background data worker.
    #[serde(rename = "WebWorker", skip_serializing_if = "std::ops::Not::not")]
    pub web_worker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(rename = "patientId", skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

impl Meta {
    pub fn api_error(api_error: Value) -> Self {
        Meta {
            api_error: Some(api_error),
            ..Meta::default()
        }
    }

    /// Metadata addressing the background data worker.
    pub fn data_worker(origin: impl Into<String>, patient_id: impl Into<String>) -> Self {
        Meta {
            web_worker: true,
            worker: Some("data".to_string()),
            origin: Some(origin.into()),
            patient_id: Some(patient_id.into()),
            ..Meta::default()
        }
    }
}

/// A dispatched action. REQUEST actions never carry an error; FAILURE actions
/// always carry the `error` field on the wire, `null` for the documented soft
/// failures; SUCCESS payload shapes are fixed per capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub payload: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub meta: Option<Meta>,
}

impl Action {
    pub fn request(capability: Capability) -> Self {
        Action {
            kind: ActionKind::Op(capability, Phase::Request),
            payload: None,
            error: None,
            meta: None,
        }
    }

    pub fn request_with(capability: Capability, payload: Value) -> Self {
        Action {
            payload: Some(payload),
            ..Action::request(capability)
        }
    }

    pub fn success(capability: Capability) -> Self {
        Action {
            kind: ActionKind::Op(capability, Phase::Success),
            payload: None,
            error: None,
            meta: None,
        }
    }

    pub fn success_with(capability: Capability, payload: Value) -> Self {
        Action {
            payload: Some(payload),
            ..Action::success(capability)
        }
    }

    pub fn failure(
        capability: Capability,
        error: Option<ErrorInfo>,
        api_error: Option<Value>,
    ) -> Self {
        Action {
            kind: ActionKind::Op(capability, Phase::Failure),
            payload: None,
            error,
            meta: Some(Meta {
                api_error,
                ..Meta::default()
            }),
        }
    }

    pub fn failure_with(
        capability: Capability,
        error: Option<ErrorInfo>,
        payload: Option<Value>,
        api_error: Option<Value>,
    ) -> Self {
        Action {
            payload,
            ..Action::failure(capability, error, api_error)
        }
    }

    /// Route-change side effect: `{ method: "push", args: [path] }`.
    pub fn navigate(path: impl Into<String>) -> Self {
        Action {
            kind: ActionKind::Navigate,
            payload: Some(serde_json::json!({
                "method": "push",
                "args": [path.into()],
            })),
            error: None,
            meta: None,
        }
    }

    pub fn dismiss_banner(banner: &str) -> Self {
        Action {
            kind: ActionKind::DismissBanner,
            payload: Some(serde_json::json!({ "type": banner })),
            error: None,
            meta: None,
        }
    }

    pub fn acknowledge_notification(key: WorkingKey) -> Self {
        Action {
            kind: ActionKind::AcknowledgeNotification,
            payload: Some(serde_json::json!({
                "acknowledgedNotification": key.as_str(),
            })),
            error: None,
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.kind.phase() == Some(Phase::Failure)
    }

    /// Target path of a `Navigate` action, if that is what this is.
    pub fn navigation_path(&self) -> Option<&str> {
        if self.kind != ActionKind::Navigate {
            return None;
        }
        self.payload.as_ref()?.pointer("/args/0")?.as_str()
    }
}

// Hand-rolled so FAILURE actions always serialize an `error` field (possibly
// null), while other phases omit it entirely.
impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let failure = self.is_failure();
        let mut len = 1;
        if self.payload.is_some() {
            len += 1;
        }
        if failure || self.error.is_some() {
            len += 1;
        }
        if self.meta.is_some() {
            len += 1;
        }
        let mut state = serializer.serialize_struct("Action", len)?;
        state.serialize_field("type", &self.kind)?;
        if let Some(payload) = &self.payload {
            state.serialize_field("payload", payload)?;
        }
        if failure || self.error.is_some() {
            state.serialize_field("error", &self.error)?;
        }
        if let Some(meta) = &self.meta {
            state.serialize_field("meta", meta)?;
        }
        state.end()
    }
}
