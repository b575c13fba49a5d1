//! Fixed message catalog and the error taxonomy mapper.
//!
//! FAILURE actions never surface the raw backend message; the mapper picks a
//! catalog entry from `(capability, status)` with a per-capability default.
//! Recognized soft conditions map to `None` so the UI can drive an alternate
//! flow instead of an error banner.

use crate::action::Capability;
use crate::error::{ApiError, ErrorInfo};

pub const ERR_GENERIC: &str = "Sorry! Something went wrong. It's our fault, not yours.";

pub const ERR_LOGIN: &str = "An error occurred while logging in.";
pub const ERR_LOGIN_CREDS: &str = "Wrong username or password.";
pub const ERR_SIGNUP: &str = "An error occurred while signing up.";
pub const ERR_ACCOUNT_ALREADY_EXISTS: &str = "That e-mail address already has an account.";
pub const ERR_CONFIRMING_SIGNUP: &str = "An error occurred while confirming your sign-up.";
pub const ERR_RESENDING_EMAIL_VERIFICATION: &str =
    "An error occurred while resending your verification e-mail.";
pub const ERR_EMAIL_NOT_VERIFIED: &str =
    "Looks like your e-mail address has not been verified.";
pub const ERR_ACCEPTING_TERMS: &str = "An error occurred while accepting the terms of use.";
pub const ERR_REQUESTING_PASSWORD_RESET: &str =
    "An error occurred while requesting a password reset.";
pub const ERR_CONFIRMING_PASSWORD_RESET: &str =
    "An error occurred while confirming your password reset.";
pub const ERR_DSA_SETUP: &str = "An error occurred while setting up data storage.";

pub const ERR_FETCHING_USER: &str = "An error occurred while fetching your account.";
pub const ERR_UPDATING_USER: &str = "An error occurred while updating the account.";
pub const ERR_FETCHING_PATIENT: &str = "An error occurred while fetching the patient record.";
pub const ERR_UPDATING_PATIENT: &str = "An error occurred while saving the patient profile.";
pub const ERR_ACCOUNT_NOT_CONFIGURED: &str =
    "Sorry! It appears that this account hasn't been fully set up.";
pub const ERR_YOUR_ACCOUNT_NOT_CONFIGURED: &str =
    "Sorry! It appears that your account hasn't been fully set up.";
pub const ERR_FETCHING_PATIENT_DATA: &str =
    "An error occurred while fetching data for this patient.";
pub const ERR_FETCHING_LATEST_PUMP_SETTINGS_UPLOAD: &str =
    "An error occurred while fetching the latest pump settings upload.";
pub const ERR_FETCHING_SERVER_TIME: &str = "An error occurred while fetching the server time.";

pub const ERR_FETCHING_MESSAGE_THREAD: &str =
    "An error occurred while fetching the message thread.";
pub const ERR_CREATING_MESSAGE_THREAD: &str =
    "An error occurred while creating the message thread.";
pub const ERR_EDITING_MESSAGE_THREAD: &str = "An error occurred while editing the message.";

pub const ERR_FETCHING_PENDING_SENT_INVITES: &str =
    "An error occurred while fetching pending sent invitations.";
pub const ERR_FETCHING_PENDING_RECEIVED_INVITES: &str =
    "An error occurred while fetching pending received invitations.";
pub const ERR_FETCHING_ASSOCIATED_ACCOUNTS: &str =
    "An error occurred while fetching associated accounts.";
pub const ERR_SENDING_INVITE: &str = "An error occurred while sending the invitation.";
pub const ERR_ALREADY_SENT_TO_EMAIL: &str =
    "Looks like an invitation has already been sent to that e-mail address.";
pub const ERR_CANCELLING_INVITE: &str = "An error occurred while cancelling the invitation.";
pub const ERR_ACCEPTING_INVITE: &str = "An error occurred while accepting the invitation.";
pub const ERR_REJECTING_INVITE: &str = "An error occurred while declining the invitation.";
pub const ERR_CHANGING_PERMS: &str =
    "An error occurred while changing member permissions.";
pub const ERR_REMOVING_MEMBERSHIP: &str = "An error occurred while leaving the care team.";
pub const ERR_REMOVING_MEMBER: &str =
    "An error occurred while removing the care team member.";
pub const ERR_UPDATING_DATA_DONATION_ACCOUNTS: &str =
    "An error occurred while updating data donation preferences.";

pub const ERR_UPDATING_PREFERENCES: &str = "An error occurred while saving the preferences.";
pub const ERR_FETCHING_SETTINGS: &str = "An error occurred while fetching the settings.";
pub const ERR_UPDATING_SETTINGS: &str = "An error occurred while saving the settings.";
pub const ERR_UPDATING_PATIENT_BG_UNITS: &str =
    "An error occurred while updating the blood glucose units.";

pub const ERR_FETCHING_PRESCRIPTIONS: &str = "An error occurred while fetching prescriptions.";
pub const ERR_CREATING_PRESCRIPTION: &str =
    "An error occurred while creating the prescription.";
pub const ERR_CREATING_PRESCRIPTION_REVISION: &str =
    "An error occurred while creating the prescription revision.";
pub const ERR_DELETING_PRESCRIPTION: &str =
    "An error occurred while deleting the prescription.";
pub const ERR_FETCHING_DEVICES: &str = "An error occurred while fetching the device list.";

pub const ERR_FETCHING_DATA_SOURCES: &str = "An error occurred while fetching data sources.";
pub const ERR_CONNECTING_DATA_SOURCE: &str =
    "An error occurred while connecting the data source.";
pub const ERR_DISCONNECTING_DATA_SOURCE: &str =
    "An error occurred while disconnecting the data source.";

/// User-facing informational messages (not errors).
pub const EMAIL_SENT: &str = "We just sent you an e-mail.";
pub const YOUR_ACCOUNT_DATA_SETUP: &str =
    "Click here to complete the data storage setup for your account.";

/// Default catalog entry for a capability, used when no status-specific
/// branch applies.
fn default_message(capability: Capability) -> &'static str {
    match capability {
        Capability::Login => ERR_LOGIN,
        Capability::Signup => ERR_SIGNUP,
        Capability::ConfirmSignup | Capability::VerifyCustodial => ERR_CONFIRMING_SIGNUP,
        Capability::ResendEmailVerification => ERR_RESENDING_EMAIL_VERIFICATION,
        Capability::AcceptTerms => ERR_ACCEPTING_TERMS,
        Capability::RequestPasswordReset => ERR_REQUESTING_PASSWORD_RESET,
        Capability::ConfirmPasswordReset => ERR_CONFIRMING_PASSWORD_RESET,
        Capability::SetupDataStorage => ERR_DSA_SETUP,
        Capability::FetchUser => ERR_FETCHING_USER,
        Capability::UpdateUser => ERR_UPDATING_USER,
        Capability::FetchPatient => ERR_FETCHING_PATIENT,
        Capability::UpdatePatient => ERR_UPDATING_PATIENT,
        Capability::FetchPatientData => ERR_FETCHING_PATIENT_DATA,
        Capability::FetchServerTime => ERR_FETCHING_SERVER_TIME,
        Capability::FetchMessageThread => ERR_FETCHING_MESSAGE_THREAD,
        Capability::CreateMessageThread => ERR_CREATING_MESSAGE_THREAD,
        Capability::EditMessageThread => ERR_EDITING_MESSAGE_THREAD,
        Capability::FetchPendingSentInvites => ERR_FETCHING_PENDING_SENT_INVITES,
        Capability::FetchPendingReceivedInvites => ERR_FETCHING_PENDING_RECEIVED_INVITES,
        Capability::FetchAssociatedAccounts => ERR_FETCHING_ASSOCIATED_ACCOUNTS,
        Capability::SendInvite => ERR_SENDING_INVITE,
        Capability::CancelSentInvite => ERR_CANCELLING_INVITE,
        Capability::AcceptReceivedInvite => ERR_ACCEPTING_INVITE,
        Capability::RejectReceivedInvite => ERR_REJECTING_INVITE,
        Capability::SetMemberPermissions => ERR_CHANGING_PERMS,
        Capability::RemoveMembershipInOtherCareTeam => ERR_REMOVING_MEMBERSHIP,
        Capability::RemoveMemberFromTargetCareTeam => ERR_REMOVING_MEMBER,
        Capability::UpdateDataDonationAccounts => ERR_UPDATING_DATA_DONATION_ACCOUNTS,
        Capability::UpdatePreferences => ERR_UPDATING_PREFERENCES,
        Capability::FetchSettings => ERR_FETCHING_SETTINGS,
        Capability::UpdateSettings => ERR_UPDATING_SETTINGS,
        Capability::UpdatePatientBgUnits => ERR_UPDATING_PATIENT_BG_UNITS,
        Capability::FetchPrescriptions => ERR_FETCHING_PRESCRIPTIONS,
        Capability::CreatePrescription => ERR_CREATING_PRESCRIPTION,
        Capability::CreatePrescriptionRevision => ERR_CREATING_PRESCRIPTION_REVISION,
        Capability::DeletePrescription => ERR_DELETING_PRESCRIPTION,
        Capability::FetchDevices => ERR_FETCHING_DEVICES,
        Capability::FetchDataSources => ERR_FETCHING_DATA_SOURCES,
        Capability::ConnectDataSource => ERR_CONNECTING_DATA_SOURCE,
        Capability::DisconnectDataSource => ERR_DISCONNECTING_DATA_SOURCE,
        Capability::Logout
        | Capability::LogError
        | Capability::GeneratePdf
        | Capability::DataWorkerAddData
        | Capability::DataWorkerRemoveData
        | Capability::DataWorkerUpdateDatum
        | Capability::DataWorkerQueryData => ERR_GENERIC,
    }
}

/// Map a raw collaborator error to the user-facing [`ErrorInfo`].
///
/// Pure function of its inputs and the static catalog. Returns `None` either
/// when there is no error, or for the recognized soft conditions that must
/// not surface as an error banner (an expired session on the user fetch, an
/// unverified e-mail rejection during login).
pub fn map_error(capability: Capability, api_error: Option<&ApiError>) -> Option<ErrorInfo> {
    let api_error = api_error?;
    let status = api_error.status;

    let message = match (capability, status) {
        // Soft conditions: alternate UI flow, no error banner.
        (Capability::FetchUser, 401) => return None,
        (Capability::Login, 403) => return None,

        (Capability::Login, 401) => ERR_LOGIN_CREDS,
        (Capability::Signup, 409) => ERR_ACCOUNT_ALREADY_EXISTS,
        (Capability::SendInvite, 409) => ERR_ALREADY_SENT_TO_EMAIL,
        (Capability::FetchPatient, 404) => ERR_ACCOUNT_NOT_CONFIGURED,

        _ => default_message(capability),
    };

    Some(ErrorInfo::with_status(message, status))
}
