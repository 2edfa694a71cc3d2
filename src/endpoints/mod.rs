//! The clinic API's endpoints, grouped by who is allowed to call them.
//!
//! Each operation maps onto exactly one REST endpoint. Request bodies are
//! strongly typed, while most responses are handed back as the parsed JSON so
//! callers see exactly what the backend sent.

pub mod admin;
pub mod auth;
pub mod doctor;
pub mod patient;
pub mod stock;

pub use auth::{
    login, register, sign_in, Credentials, LoginError, LoginResponse,
    Registration,
};

use crate::{error::ApiError, session::ProfileUpdate, Client};
use reqwest::Method;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Display, Formatter};

/// Where an appointment is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Upcoming,
    Confirmed,
    Completed,
    Cancelled,
}

impl Display for AppointmentStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppointmentStatus::Upcoming => "Upcoming",
            AppointmentStatus::Confirmed => "Confirmed",
            AppointmentStatus::Completed => "Completed",
            AppointmentStatus::Cancelled => "Cancelled",
        };

        f.write_str(name)
    }
}

/// The body sent to the `.../appointments/update-status` endpoints.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
struct StatusUpdate<'a> {
    appointment_id: &'a str,
    status: AppointmentStatus,
}

/// Send a profile update and, once the server accepts it, merge the new
/// fields into the cached user.
async fn update_profile(
    client: &Client,
    path: &[&str],
    update: &ProfileUpdate,
) -> Result<Value, ApiError> {
    let updated = client.send_json(Method::PUT, path, update).await?;

    if let Err(e) = client.session().update_user(update) {
        log::warn!("The profile was saved but the session wasn't updated: {}", e);
    }

    Ok(updated)
}
