//! Endpoints reserved for administrators.

use super::{AppointmentStatus, StatusUpdate};
use crate::{error::ApiError, session::ProfileUpdate, Client};
use reqwest::Method;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

pub async fn get_doctors(client: &Client) -> Result<Value, ApiError> {
    client.get(&["admin", "doctors"]).await
}

pub async fn add_doctor(
    client: &Client,
    doctor: &NewAccount,
) -> Result<Value, ApiError> {
    client.send_json(Method::POST, &["admin", "doctors"], doctor).await
}

pub async fn update_doctor(
    client: &Client,
    doctor_id: &str,
    update: &AccountUpdate,
) -> Result<Value, ApiError> {
    client
        .send_json(Method::PUT, &["admin", "doctors", doctor_id], update)
        .await
}

pub async fn delete_doctor(
    client: &Client,
    doctor_id: &str,
) -> Result<Value, ApiError> {
    client.delete(&["admin", "doctors", doctor_id]).await
}

pub async fn get_patients(client: &Client) -> Result<Value, ApiError> {
    client.get(&["admin", "patients"]).await
}

pub async fn add_patient(
    client: &Client,
    patient: &NewAccount,
) -> Result<Value, ApiError> {
    client
        .send_json(Method::POST, &["admin", "patients"], patient)
        .await
}

pub async fn update_patient(
    client: &Client,
    patient_id: &str,
    update: &AccountUpdate,
) -> Result<Value, ApiError> {
    client
        .send_json(Method::PUT, &["admin", "patients", patient_id], update)
        .await
}

pub async fn delete_patient(
    client: &Client,
    patient_id: &str,
) -> Result<Value, ApiError> {
    client.delete(&["admin", "patients", patient_id]).await
}

/// Every appointment in the clinic, regardless of doctor.
pub async fn get_all_appointments(client: &Client) -> Result<Value, ApiError> {
    client.get(&["admin", "appointments"]).await
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
            &["admin", "appointments", "update-status"],
            &data,
        )
        .await
}

pub async fn get_profile(client: &Client) -> Result<Value, ApiError> {
    client.get(&["admin", "profile"]).await
}

pub async fn update_profile(
    client: &Client,
    update: &ProfileUpdate,
) -> Result<Value, ApiError> {
    super::update_profile(client, &["admin", "profile"], update).await
}

/// Clinic-wide head counts.
pub async fn get_dashboard(
    client: &Client,
) -> Result<AdminDashboard, ApiError> {
    client.get(&["dashboard", "data"]).await
}

/// A doctor or patient account created by an administrator.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    /// Only meaningful for doctors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    /// Only meaningful for doctors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("specialization", &self.specialization)
            .finish()
    }
}

/// Changes to an existing doctor or patient. Missing fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_number: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminDashboard {
    #[serde(default)]
    pub total_doctors: u64,
    #[serde(default)]
    pub total_patients: u64,
    #[serde(default)]
    pub appointments_today: u64,
}
