//! In-flight bookkeeping: working-state keys and the capability lookup table.

use serde::Serialize;

use crate::action::Capability;
use crate::error::ErrorInfo;

/// Key of one working-state slot, used by the UI to drive loading indicators
/// and error banners. String form is the camelCase name the UI consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkingKey {
    FetchingUser,
    FetchingPendingSentInvites,
    FetchingPendingReceivedInvites,
    FetchingAssociatedAccounts,
    FetchingPatient,
    FetchingPatientData,
    FetchingPrescriptions,
    CreatingPrescription,
    CreatingPrescriptionRevision,
    DeletingPrescription,
    FetchingDevices,
    FetchingMessageThread,
    CreatingMessageThread,
    EditingMessageThread,
    LoggingIn,
    LoggingOut,
    SigningUp,
    ConfirmingSignup,
    ConfirmingPasswordReset,
    AcceptingTerms,
    ResendingEmailVerification,
    SettingUpDataStorage,
    RemovingMembershipInOtherCareTeam,
    RemovingMemberFromTargetCareTeam,
    RequestingPasswordReset,
    SendingInvite,
    CancellingSentInvite,
    AcceptingReceivedInvite,
    RejectingReceivedInvite,
    SettingMemberPermissions,
    UpdatingPatient,
    UpdatingPatientBgUnits,
    UpdatingUser,
    VerifyingCustodial,
    GeneratingPdf,
    RemovingGeneratedPdfs,
    AddingData,
    RemovingData,
    UpdatingDatum,
    QueryingData,
    UpdatingDataDonationAccounts,
    FetchingDataSources,
    ConnectingDataSource,
    DisconnectingDataSource,
    FetchingServerTime,
}

impl WorkingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkingKey::FetchingUser => "fetchingUser",
            WorkingKey::FetchingPendingSentInvites => "fetchingPendingSentInvites",
            WorkingKey::FetchingPendingReceivedInvites => "fetchingPendingReceivedInvites",
            WorkingKey::FetchingAssociatedAccounts => "fetchingAssociatedAccounts",
            WorkingKey::FetchingPatient => "fetchingPatient",
            WorkingKey::FetchingPatientData => "fetchingPatientData",
            WorkingKey::FetchingPrescriptions => "fetchingPrescriptions",
            WorkingKey::CreatingPrescription => "creatingPrescription",
            WorkingKey::CreatingPrescriptionRevision => "creatingPrescriptionRevision",
            WorkingKey::DeletingPrescription => "deletingPrescription",
            WorkingKey::FetchingDevices => "fetchingDevices",
            WorkingKey::FetchingMessageThread => "fetchingMessageThread",
            WorkingKey::CreatingMessageThread => "creatingMessageThread",
            WorkingKey::EditingMessageThread => "editingMessageThread",
            WorkingKey::LoggingIn => "loggingIn",
            WorkingKey::LoggingOut => "loggingOut",
            WorkingKey::SigningUp => "signingUp",
            WorkingKey::ConfirmingSignup => "confirmingSignup",
            WorkingKey::ConfirmingPasswordReset => "confirmingPasswordReset",
            WorkingKey::AcceptingTerms => "acceptingTerms",
            WorkingKey::ResendingEmailVerification => "resendingEmailVerification",
            WorkingKey::SettingUpDataStorage => "settingUpDataStorage",
            WorkingKey::RemovingMembershipInOtherCareTeam => {
                "removingMembershipInOtherCareTeam"
            }
            WorkingKey::RemovingMemberFromTargetCareTeam => {
                "removingMemberFromTargetCareTeam"
            }
            WorkingKey::RequestingPasswordReset => "requestingPasswordReset",
            WorkingKey::SendingInvite => "sendingInvite",
            WorkingKey::CancellingSentInvite => "cancellingSentInvite",
            WorkingKey::AcceptingReceivedInvite => "acceptingReceivedInvite",
            WorkingKey::RejectingReceivedInvite => "rejectingReceivedInvite",
            WorkingKey::SettingMemberPermissions => "settingMemberPermissions",
            WorkingKey::UpdatingPatient => "updatingPatient",
            WorkingKey::UpdatingPatientBgUnits => "updatingPatientBgUnits",
            WorkingKey::UpdatingUser => "updatingUser",
            WorkingKey::VerifyingCustodial => "verifyingCustodial",
            WorkingKey::GeneratingPdf => "generatingPDF",
            WorkingKey::RemovingGeneratedPdfs => "removingGeneratedPDFS",
            WorkingKey::AddingData => "addingData",
            WorkingKey::RemovingData => "removingData",
            WorkingKey::UpdatingDatum => "updatingDatum",
            WorkingKey::QueryingData => "queryingData",
            WorkingKey::UpdatingDataDonationAccounts => "updatingDataDonationAccounts",
            WorkingKey::FetchingDataSources => "fetchingDataSources",
            WorkingKey::ConnectingDataSource => "connectingDataSource",
            WorkingKey::DisconnectingDataSource => "disconnectingDataSource",
            WorkingKey::FetchingServerTime => "fetchingServerTime",
        }
    }
}

impl Serialize for WorkingKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Capability {
    /// Working-state key shared by the capability's action triple. `None`
    /// means the triple does not participate in in-flight tracking (the
    /// preference/settings metadata writes and the fire-and-forget error
    /// logger resolve through their own dispatch sequences instead).
    pub fn working_key(&self) -> Option<WorkingKey> {
        match self {
            Capability::FetchUser => Some(WorkingKey::FetchingUser),
            Capability::FetchPendingSentInvites => Some(WorkingKey::FetchingPendingSentInvites),
            Capability::FetchPendingReceivedInvites => {
                Some(WorkingKey::FetchingPendingReceivedInvites)
            }
            Capability::FetchAssociatedAccounts => Some(WorkingKey::FetchingAssociatedAccounts),
            Capability::FetchPatient => Some(WorkingKey::FetchingPatient),
            Capability::FetchPatientData => Some(WorkingKey::FetchingPatientData),
            Capability::FetchPrescriptions => Some(WorkingKey::FetchingPrescriptions),
            Capability::CreatePrescription => Some(WorkingKey::CreatingPrescription),
            Capability::CreatePrescriptionRevision => {
                Some(WorkingKey::CreatingPrescriptionRevision)
            }
            Capability::DeletePrescription => Some(WorkingKey::DeletingPrescription),
            Capability::FetchDevices => Some(WorkingKey::FetchingDevices),
            Capability::FetchMessageThread => Some(WorkingKey::FetchingMessageThread),
            Capability::CreateMessageThread => Some(WorkingKey::CreatingMessageThread),
            Capability::EditMessageThread => Some(WorkingKey::EditingMessageThread),
            Capability::Login => Some(WorkingKey::LoggingIn),
            Capability::Logout => Some(WorkingKey::LoggingOut),
            Capability::Signup => Some(WorkingKey::SigningUp),
            Capability::ConfirmSignup => Some(WorkingKey::ConfirmingSignup),
            Capability::ConfirmPasswordReset => Some(WorkingKey::ConfirmingPasswordReset),
            Capability::AcceptTerms => Some(WorkingKey::AcceptingTerms),
            Capability::ResendEmailVerification => {
                Some(WorkingKey::ResendingEmailVerification)
            }
            Capability::SetupDataStorage => Some(WorkingKey::SettingUpDataStorage),
            Capability::RemoveMembershipInOtherCareTeam => {
                Some(WorkingKey::RemovingMembershipInOtherCareTeam)
            }
            Capability::RemoveMemberFromTargetCareTeam => {
                Some(WorkingKey::RemovingMemberFromTargetCareTeam)
            }
            Capability::RequestPasswordReset => Some(WorkingKey::RequestingPasswordReset),
            Capability::SendInvite => Some(WorkingKey::SendingInvite),
            Capability::CancelSentInvite => Some(WorkingKey::CancellingSentInvite),
            Capability::AcceptReceivedInvite => Some(WorkingKey::AcceptingReceivedInvite),
            Capability::RejectReceivedInvite => Some(WorkingKey::RejectingReceivedInvite),
            Capability::SetMemberPermissions => Some(WorkingKey::SettingMemberPermissions),
            Capability::UpdatePatient => Some(WorkingKey::UpdatingPatient),
            Capability::UpdatePatientBgUnits => Some(WorkingKey::UpdatingPatientBgUnits),
            Capability::UpdateUser => Some(WorkingKey::UpdatingUser),
            Capability::VerifyCustodial => Some(WorkingKey::VerifyingCustodial),
            Capability::GeneratePdf => Some(WorkingKey::GeneratingPdf),
            Capability::DataWorkerAddData => Some(WorkingKey::AddingData),
            Capability::DataWorkerRemoveData => Some(WorkingKey::RemovingData),
            Capability::DataWorkerUpdateDatum => Some(WorkingKey::UpdatingDatum),
            Capability::DataWorkerQueryData => Some(WorkingKey::QueryingData),
            Capability::UpdateDataDonationAccounts => {
                Some(WorkingKey::UpdatingDataDonationAccounts)
            }
            Capability::FetchDataSources => Some(WorkingKey::FetchingDataSources),
            Capability::ConnectDataSource => Some(WorkingKey::ConnectingDataSource),
            Capability::DisconnectDataSource => Some(WorkingKey::DisconnectingDataSource),
            Capability::FetchServerTime => Some(WorkingKey::FetchingServerTime),
            Capability::UpdatePreferences
            | Capability::UpdateSettings
            | Capability::FetchSettings
            | Capability::LogError => None,
        }
    }
}

/// One working-state slot: in-flight flag plus the parked failure
/// notification, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkingState {
    #[serde(rename = "inProgress")]
    pub in_progress: bool,
    pub notification: Option<ErrorInfo>,
}
