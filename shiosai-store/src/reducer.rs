//! The reducer: the single mutation path from actions to state.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use shiosai_core::action::{Action, ActionKind, Capability, Phase};
use shiosai_core::resource::record_id;
use shiosai_core::working::WorkingState;

use crate::state::{AppState, CachedRecord, DataState};

/// How long fetched records stay trusted before a re-fetch is forced.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub user: Duration,
    pub data: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        CacheTtls {
            user: Duration::hours(1),
            data: Duration::hours(1),
        }
    }
}

/// Apply one action to the state. Called by the store under its writer lock,
/// so each dispatch is atomic and observed in arrival order.
pub fn reduce(state: &mut AppState, action: &Action, now: DateTime<Utc>, ttls: CacheTtls) {
    apply_working(state, action);
    apply_slices(state, action, now, ttls);
}

fn apply_working(state: &mut AppState, action: &Action) {
    let Some(key) = action.kind.working_key() else {
        // Acknowledgement clears a parked notification without touching the
        // in-flight flag.
        if action.kind == ActionKind::AcknowledgeNotification {
            let name = action
                .payload
                .as_ref()
                .and_then(|p| p.get("acknowledgedNotification"))
                .and_then(Value::as_str);
            if let Some(name) = name {
                for (key, slot) in state.working.iter_mut() {
                    if key.as_str() == name {
                        slot.notification = None;
                    }
                }
            }
        }
        return;
    };

    let slot = state.working.entry(key).or_default();
    match action.kind.phase() {
        Some(Phase::Request) => {
            *slot = WorkingState {
                in_progress: true,
                notification: None,
            };
        }
        Some(Phase::Success) => {
            *slot = WorkingState {
                in_progress: false,
                notification: None,
            };
        }
        Some(Phase::Failure) => {
            *slot = WorkingState {
                in_progress: false,
                notification: action.error.clone(),
            };
        }
        // One-shot kinds with a working key (PDF removal) resolve instantly.
        None => {
            *slot = WorkingState::default();
        }
    }
}

fn apply_slices(state: &mut AppState, action: &Action, now: DateTime<Utc>, ttls: CacheTtls) {
    let payload = action.payload.as_ref();

    match action.kind {
        ActionKind::Navigate => {
            if let Some(path) = action.navigation_path() {
                // Keep the path portion only; queries do not identify views.
                state.pathname = path.split('?').next().unwrap_or(path).to_string();
            }
        }

        ActionKind::Op(Capability::Login, Phase::Success)
        | ActionKind::Op(Capability::FetchUser, Phase::Success) => {
            if let Some(user) = payload.and_then(|p| p.get("user")) {
                if let Some(id) = record_id(user) {
                    cache_record(state, &id, user.clone(), now, ttls);
                    state.logged_in_user_id = Some(id);
                }
            }
        }

        ActionKind::Op(Capability::FetchPatient, Phase::Success) => {
            if let Some(patient) = payload.and_then(|p| p.get("patient")) {
                if let Some(id) = record_id(patient) {
                    cache_record(state, &id, patient.clone(), now, ttls);
                }
            }
        }

        ActionKind::Op(Capability::UpdatePatient, Phase::Success) => {
            if let Some(patient) = payload.and_then(|p| p.get("updatedPatient")) {
                if let Some(id) = record_id(patient) {
                    if let Some(cached) = state.all_users.get_mut(&id) {
                        cached.record = patient.clone();
                    }
                }
            }
        }

        ActionKind::Op(Capability::Logout, Phase::Success) => {
            let pathname = std::mem::take(&mut state.pathname);
            *state = AppState {
                pathname,
                ..AppState::default()
            };
        }

        ActionKind::Op(Capability::FetchPatientData, Phase::Success) => {
            state.data = DataState {
                cache_until: Some(now + ttls.data),
                fetched_patient_id: payload
                    .and_then(|p| p.get("patientId"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
        }

        ActionKind::Op(Capability::DataWorkerRemoveData, Phase::Request) => {
            state.data = DataState::default();
        }

        ActionKind::Op(Capability::FetchPendingSentInvites, Phase::Success) => {
            if let Some(invites) = list_payload(payload, "pendingSentInvites") {
                state.pending_sent_invites = invites;
            }
        }

        ActionKind::Op(Capability::FetchPendingReceivedInvites, Phase::Success) => {
            if let Some(invites) = list_payload(payload, "pendingReceivedInvites") {
                state.pending_received_invites = invites;
            }
        }

        ActionKind::Op(Capability::SendInvite, Phase::Success) => {
            if let Some(invite) = payload.and_then(|p| p.get("invite")) {
                state.pending_sent_invites.push(invite.clone());
            }
        }

        ActionKind::Op(Capability::CancelSentInvite, Phase::Success) => {
            if let Some(email) = payload
                .and_then(|p| p.get("removedEmail"))
                .and_then(Value::as_str)
            {
                state
                    .pending_sent_invites
                    .retain(|invite| invite.get("email").and_then(Value::as_str) != Some(email));
            }
        }

        ActionKind::Op(Capability::AcceptReceivedInvite, Phase::Success) => {
            remove_received(state, payload, "acceptedReceivedInvite");
        }

        ActionKind::Op(Capability::RejectReceivedInvite, Phase::Success) => {
            remove_received(state, payload, "rejectedReceivedInvite");
        }

        ActionKind::Op(Capability::FetchAssociatedAccounts, Phase::Success) => {
            state.associated_accounts = payload.cloned();
        }

        ActionKind::Op(Capability::FetchPrescriptions, Phase::Success) => {
            if let Some(prescriptions) = list_payload(payload, "prescriptions") {
                state.prescriptions = prescriptions;
            }
        }

        ActionKind::Op(Capability::CreatePrescription, Phase::Success) => {
            if let Some(prescription) = payload.and_then(|p| p.get("prescription")) {
                state.prescriptions.push(prescription.clone());
            }
        }

        ActionKind::Op(Capability::CreatePrescriptionRevision, Phase::Success) => {
            if let Some(prescription) = payload.and_then(|p| p.get("prescription")) {
                let id = prescription.get("id");
                match state
                    .prescriptions
                    .iter_mut()
                    .find(|rx| rx.get("id") == id)
                {
                    Some(existing) => *existing = prescription.clone(),
                    None => state.prescriptions.push(prescription.clone()),
                }
            }
        }

        ActionKind::Op(Capability::DeletePrescription, Phase::Success) => {
            if let Some(id) = payload.and_then(|p| p.get("prescriptionId")) {
                state.prescriptions.retain(|rx| rx.get("id") != Some(id));
            }
        }

        ActionKind::Op(Capability::FetchDevices, Phase::Success) => {
            if let Some(devices) = list_payload(payload, "devices") {
                state.devices = devices;
            }
        }

        ActionKind::Op(Capability::FetchDataSources, Phase::Success) => {
            if let Some(sources) = list_payload(payload, "dataSources") {
                state.data_sources = sources;
            }
        }

        _ => {}
    }
}

fn cache_record(state: &mut AppState, id: &str, record: Value, now: DateTime<Utc>, ttls: CacheTtls) {
    state.all_users.insert(
        id.to_string(),
        CachedRecord {
            record,
            cache_until: Some(now + ttls.user),
        },
    );
}

fn list_payload(payload: Option<&Value>, field: &str) -> Option<Vec<Value>> {
    payload?.get(field)?.as_array().cloned()
}

fn remove_received(state: &mut AppState, payload: Option<&Value>, field: &str) {
    if let Some(key) = payload
        .and_then(|p| p.pointer(&format!("/{field}/key")))
        .and_then(Value::as_str)
    {
        state
            .pending_received_invites
            .retain(|invite| invite.get("key").and_then(Value::as_str) != Some(key));
    }
}
