//! Endpoints available to a logged-in patient.

use crate::{error::ApiError, session::ProfileUpdate, Client};
use reqwest::Method;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

pub async fn get_appointments(client: &Client) -> Result<Value, ApiError> {
    client.get(&["patient", "appointments"]).await
}

/// Ask for an appointment with a doctor.
pub async fn book_appointment(
    client: &Client,
    appointment: &NewAppointment,
) -> Result<Value, ApiError> {
    client
        .send_json(Method::POST, &["patient", "appointments"], appointment)
        .await
}

pub async fn get_prescriptions(client: &Client) -> Result<Value, ApiError> {
    client.get(&["patient", "prescriptions"]).await
}

pub async fn get_records(client: &Client) -> Result<Value, ApiError> {
    client.get(&["patient", "records"]).await
}

pub async fn get_profile(client: &Client) -> Result<Value, ApiError> {
    client.get(&["patient", "profile"]).await
}

/// Update the patient's own profile, refreshing the cached user on success.
pub async fn update_profile(
    client: &Client,
    update: &ProfileUpdate,
) -> Result<Value, ApiError> {
    super::update_profile(client, &["patient", "profile"], update).await
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppointment {
    pub doctor_id: String,
    /// An ISO-8601 timestamp.
    pub date: String,
    /// The time of day, e.g. `"14:30"`.
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
