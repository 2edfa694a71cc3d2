//! Endpoints available to a logged-in doctor.

use super::{AppointmentStatus, StatusUpdate};
use crate::{error::ApiError, session::ProfileUpdate, Client};
use reqwest::Method;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

pub async fn get_appointments(client: &Client) -> Result<Value, ApiError> {
    client.get(&["doctor", "appointments"]).await
}

pub async fn update_appointment_status(
    client: &Client,
    appointment_id: &str,
    status: AppointmentStatus,
) -> Result<Value, ApiError> {
    let data = StatusUpdate {
        appointment_id,
        status,
    };

    client
        .send_json(
            Method::POST,
            &["doctor", "appointments", "update-status"],
            &data,
        )
        .await
}

/// Every patient who has booked an appointment with this doctor.
pub async fn get_patients(client: &Client) -> Result<Value, ApiError> {
    client.get(&["doctor", "patients"]).await
}

pub async fn get_patient_details(
    client: &Client,
    patient_id: &str,
) -> Result<Value, ApiError> {
    client.get(&["doctor", "patients", patient_id]).await
}

pub async fn get_prescriptions(client: &Client) -> Result<Value, ApiError> {
    client.get(&["doctor", "prescriptions"]).await
}

pub async fn create_prescription(
    client: &Client,
    prescription: &NewPrescription,
) -> Result<Value, ApiError> {
    client
        .send_json(
            Method::POST,
            &["doctor", "prescriptions"],
            prescription,
        )
        .await
}

pub async fn get_patient_records(
    client: &Client,
    patient_id: &str,
) -> Result<Value, ApiError> {
    client
        .get(&["doctor", "patients", patient_id, "records"])
        .await
}

pub async fn add_patient_record(
    client: &Client,
    patient_id: &str,
    record: &NewRecord,
) -> Result<Value, ApiError> {
    let path = ["doctor", "patients", patient_id, "records"];
    client.send_json(Method::POST, &path, record).await
}

pub async fn get_profile(client: &Client) -> Result<Value, ApiError> {
    client.get(&["doctor", "profile"]).await
}

pub async fn update_profile(
    client: &Client,
    update: &ProfileUpdate,
) -> Result<Value, ApiError> {
    super::update_profile(client, &["doctor", "profile"], update).await
}

/// Headline numbers for the doctor's dashboard.
pub async fn get_dashboard(
    client: &Client,
) -> Result<DoctorDashboard, ApiError> {
    client.get(&["dashboard", "doctor", "data"]).await
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrescription {
    pub patient_id: String,
    pub medication: String,
    pub dosage: String,
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// A new entry in a patient's medical history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// e.g. `"Lab Result"` or `"Diagnosis"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Defaults to "now" on the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorDashboard {
    #[serde(default)]
    pub total_patients: u64,
    #[serde(default)]
    pub appointments_today: u64,
    /// Prescriptions which are still active.
    #[serde(default)]
    pub pending_reports: u64,
    #[serde(default)]
    pub total_earnings: f64,
}
