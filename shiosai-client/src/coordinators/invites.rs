//! Care-team invitation and membership coordinators.

use serde_json::{json, Value};

use shiosai_core::action::{Action, Capability};
use shiosai_core::error::{ApiError, ApiResult};
use shiosai_core::resource;

use crate::api::{AccessApi, InvitationApi, PortalApi};
use crate::metrics::Metrics;
use crate::portal::Portal;

/// String form of a record id field that may be a string or a number.
fn id_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl<A: PortalApi, M: Metrics + 'static> Portal<A, M> {
    pub async fn fetch_pending_sent_invites(&self) {
        self.dispatch(Action::request(Capability::FetchPendingSentInvites));
        self.fetch_pending_sent_invites_inner().await;
    }

    async fn fetch_pending_sent_invites_inner(&self) {
        match self.api.get_sent_invites().await {
            Ok(invites) => self.dispatch(Action::success_with(
                Capability::FetchPendingSentInvites,
                json!({ "pendingSentInvites": invites }),
            )),
            Err(err) => self.fail(Capability::FetchPendingSentInvites, &err),
        }
    }

    pub async fn fetch_pending_received_invites(&self) {
        self.dispatch(Action::request(Capability::FetchPendingReceivedInvites));
        match self.api.get_received_invites().await {
            Ok(invites) => self.dispatch(Action::success_with(
                Capability::FetchPendingReceivedInvites,
                json!({ "pendingReceivedInvites": invites }),
            )),
            Err(err) => self.fail(Capability::FetchPendingReceivedInvites, &err),
        }
    }

    /// Invite an account to the care team. An invitation to the reserved
    /// data-donation account also kicks off a refresh of the pending sent
    /// list; the refresh never gates the invite outcome.
    pub async fn send_invite(&self, email: &str, permissions: Value) -> ApiResult<Value> {
        self.dispatch(Action::request(Capability::SendInvite));
        match self.api.send_invite(email, &permissions).await {
            Err(err) => {
                self.fail(Capability::SendInvite, &err);
                Err(err)
            }
            Ok(invite) => {
                let donation = invite
                    .get("email")
                    .and_then(Value::as_str)
                    .is_some_and(resource::is_data_donation_account);
                if donation {
                    self.dispatch(Action::request(Capability::FetchPendingSentInvites));
                    let portal = self.clone();
                    tokio::spawn(async move {
                        portal.fetch_pending_sent_invites_inner().await;
                    });
                }
                self.dispatch(Action::success_with(
                    Capability::SendInvite,
                    json!({ "invite": invite }),
                ));
                Ok(invite)
            }
        }
    }

    pub async fn cancel_sent_invite(&self, email: &str) -> ApiResult<()> {
        self.dispatch(Action::request(Capability::CancelSentInvite));
        match self.api.cancel_invite(email).await {
            Ok(()) => {
                self.dispatch(Action::success_with(
                    Capability::CancelSentInvite,
                    json!({ "removedEmail": email }),
                ));
                Ok(())
            }
            Err(err) => {
                self.fail(Capability::CancelSentInvite, &err);
                Err(err)
            }
        }
    }

    /// Accept an invitation into someone else's care team, then refresh the
    /// inviter's patient record.
    pub async fn accept_received_invite(&self, invite: Value) {
        self.dispatch(Action::request_with(
            Capability::AcceptReceivedInvite,
            json!({ "acceptedReceivedInvite": invite }),
        ));
        let key = invite.get("key").and_then(Value::as_str).unwrap_or_default();
        let creator_id = id_string(invite.pointer("/creator/userid"));
        match self.api.accept_invite(key, &creator_id).await {
            Ok(accepted) => {
                self.dispatch(Action::success_with(
                    Capability::AcceptReceivedInvite,
                    json!({ "acceptedReceivedInvite": accepted }),
                ));
                self.fetch_patient(&creator_id).await;
            }
            Err(err) => self.fail(Capability::AcceptReceivedInvite, &err),
        }
    }

    pub async fn reject_received_invite(&self, invite: Value) {
        self.dispatch(Action::request_with(
            Capability::RejectReceivedInvite,
            json!({ "rejectedReceivedInvite": invite }),
        ));
        let key = invite.get("key").and_then(Value::as_str).unwrap_or_default();
        let creator_id = id_string(invite.pointer("/creator/userid"));
        match self.api.dismiss_invite(key, &creator_id).await {
            Ok(rejected) => self.dispatch(Action::success_with(
                Capability::RejectReceivedInvite,
                json!({ "rejectedReceivedInvite": rejected }),
            )),
            Err(err) => self.fail(Capability::RejectReceivedInvite, &err),
        }
    }

    pub async fn set_member_permissions(
        &self,
        patient_id: &str,
        member_id: &str,
        permissions: Value,
    ) {
        self.dispatch(Action::request(Capability::SetMemberPermissions));
        match self
            .api
            .set_member_permissions(member_id, &permissions)
            .await
        {
            Ok(()) => {
                self.dispatch(Action::success_with(
                    Capability::SetMemberPermissions,
                    json!({ "memberId": member_id, "permissions": permissions }),
                ));
                self.fetch_patient(patient_id).await;
            }
            Err(err) => self.fail(Capability::SetMemberPermissions, &err),
        }
    }

    /// Leave another account's care team, then refresh the associated
    /// accounts. The outcome is returned so callers can chain UI flows.
    pub async fn remove_membership_in_other_care_team(
        &self,
        patient_id: &str,
    ) -> Result<(), ApiError> {
        self.dispatch(Action::request(Capability::RemoveMembershipInOtherCareTeam));
        match self.api.leave_group(patient_id).await {
            Ok(()) => {
                self.dispatch(Action::success_with(
                    Capability::RemoveMembershipInOtherCareTeam,
                    json!({ "removedPatientId": patient_id }),
                ));
                self.fetch_associated_accounts().await;
                Ok(())
            }
            Err(err) => {
                self.fail(Capability::RemoveMembershipInOtherCareTeam, &err);
                Err(err)
            }
        }
    }

    /// Remove a member from the logged-in user's own care team, then refresh
    /// the patient record.
    pub async fn remove_member_from_target_care_team(
        &self,
        patient_id: &str,
        member_id: &str,
    ) -> Result<(), ApiError> {
        self.dispatch(Action::request(Capability::RemoveMemberFromTargetCareTeam));
        match self.api.remove_member(member_id).await {
            Ok(()) => {
                self.dispatch(Action::success_with(
                    Capability::RemoveMemberFromTargetCareTeam,
                    json!({ "removedMemberId": member_id }),
                ));
                self.fetch_patient(patient_id).await;
                Ok(())
            }
            Err(err) => {
                self.fail(Capability::RemoveMemberFromTargetCareTeam, &err);
                Err(err)
            }
        }
    }

    /// Reconcile the set of data-donation invitations: one invite per added
    /// account, one cancellation per removed one. All sub-operations run to
    /// completion (non-atomic, no rollback); the terminal action is a single
    /// SUCCESS only if every sub-operation succeeded, otherwise a single
    /// FAILURE carrying the first sub-error.
    pub async fn update_data_donation_accounts(
        &self,
        add_accounts: Vec<String>,
        remove_accounts: Vec<Value>,
    ) {
        self.dispatch(Action::request(Capability::UpdateDataDonationAccounts));

        let mut first_error: Option<ApiError> = None;
        for email in &add_accounts {
            let donation_permissions = json!({ "view": {}, "note": {} });
            if let Err(err) = self.send_invite(email, donation_permissions).await {
                first_error.get_or_insert(err);
            }
        }
        let mut removed = Vec::with_capacity(remove_accounts.len());
        for account in &remove_accounts {
            let email = account
                .get("email")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Err(err) = self.cancel_sent_invite(&email).await {
                first_error.get_or_insert(err);
            }
            removed.push(email);
        }

        match first_error {
            None => self.dispatch(Action::success_with(
                Capability::UpdateDataDonationAccounts,
                json!({ "dataDonationAccounts": {
                    "addAccounts": add_accounts
                        .iter()
                        .map(|email| json!({ "email": email }))
                        .collect::<Vec<_>>(),
                    "removeAccounts": removed,
                } }),
            )),
            Some(err) => self.fail(Capability::UpdateDataDonationAccounts, &err),
        }
    }
}
