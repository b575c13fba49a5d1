//! Prescription workflow and device-list coordinators.

use serde_json::{json, Value};

use shiosai_core::action::{Action, Capability};

use crate::api::{DeviceApi, PortalApi, PrescriptionApi};
use crate::metrics::Metrics;
use crate::portal::Portal;

impl<A: PortalApi, M: Metrics + 'static> Portal<A, M> {
    pub async fn fetch_prescriptions(&self) {
        self.dispatch(Action::request(Capability::FetchPrescriptions));
        match self.api.get_prescriptions().await {
            Ok(prescriptions) => self.dispatch(Action::success_with(
                Capability::FetchPrescriptions,
                json!({ "prescriptions": prescriptions }),
            )),
            Err(err) => self.fail(Capability::FetchPrescriptions, &err),
        }
    }

    pub async fn create_prescription(&self, prescription: Value) {
        self.dispatch(Action::request(Capability::CreatePrescription));
        match self.api.create_prescription(&prescription).await {
            Ok(created) => self.dispatch(Action::success_with(
                Capability::CreatePrescription,
                json!({ "prescription": created }),
            )),
            Err(err) => self.fail(Capability::CreatePrescription, &err),
        }
    }

    pub async fn create_prescription_revision(&self, revision: Value, prescription_id: &str) {
        self.dispatch(Action::request(Capability::CreatePrescriptionRevision));
        match self
            .api
            .create_prescription_revision(&revision, prescription_id)
            .await
        {
            Ok(created) => self.dispatch(Action::success_with(
                Capability::CreatePrescriptionRevision,
                json!({ "prescription": created }),
            )),
            Err(err) => self.fail(Capability::CreatePrescriptionRevision, &err),
        }
    }

    pub async fn delete_prescription(&self, prescription_id: &str) {
        self.dispatch(Action::request(Capability::DeletePrescription));
        match self.api.delete_prescription(prescription_id).await {
            Ok(()) => self.dispatch(Action::success_with(
                Capability::DeletePrescription,
                json!({ "prescriptionId": prescription_id }),
            )),
            Err(err) => self.fail(Capability::DeletePrescription, &err),
        }
    }

    pub async fn fetch_devices(&self) {
        self.dispatch(Action::request(Capability::FetchDevices));
        match self.api.get_devices().await {
            Ok(devices) => self.dispatch(Action::success_with(
                Capability::FetchDevices,
                json!({ "devices": devices }),
            )),
            Err(err) => self.fail(Capability::FetchDevices, &err),
        }
    }
}
