//! Loading everything a dashboard needs in one go.
//!
//! Each section is fetched concurrently and independently. A section which
//! fails is shown as empty and its error is kept so the caller can tell the
//! user, but it never stops the other sections from loading.

use crate::{
    endpoints::{
        admin,
        doctor::{self, DoctorDashboard},
        patient,
    },
    error::ApiError,
    Client,
};
use serde_json::Value;

/// A section of a dashboard that couldn't be loaded.
#[derive(Debug)]
pub struct SectionError {
    pub section: &'static str,
    pub error: ApiError,
}

#[derive(Debug)]
pub struct AdminOverview {
    pub doctors: Vec<Value>,
    pub patients: Vec<Value>,
    pub appointments: Vec<Value>,
    pub failures: Vec<SectionError>,
}

#[derive(Debug)]
pub struct PatientOverview {
    pub appointments: Vec<Value>,
    pub prescriptions: Vec<Value>,
    pub records: Vec<Value>,
    pub failures: Vec<SectionError>,
}

#[derive(Debug)]
pub struct DoctorOverview {
    pub stats: DoctorDashboard,
    pub appointments: Vec<Value>,
    pub patients: Vec<Value>,
    pub failures: Vec<SectionError>,
}

pub async fn load_admin_overview(client: &Client) -> AdminOverview {
    let (doctors, patients, appointments) = tokio::join!(
        admin::get_doctors(client),
        admin::get_patients(client),
        admin::get_all_appointments(client)
    );

    let mut failures = Vec::new();

    AdminOverview {
        doctors: list_or_empty("doctors", doctors, &mut failures),
        patients: list_or_empty("patients", patients, &mut failures),
        appointments: list_or_empty(
            "appointments",
            appointments,
            &mut failures,
        ),
        failures,
    }
}

pub async fn load_patient_overview(client: &Client) -> PatientOverview {
    let (appointments, prescriptions, records) = tokio::join!(
        patient::get_appointments(client),
        patient::get_prescriptions(client),
        patient::get_records(client)
    );

    let mut failures = Vec::new();

    PatientOverview {
        appointments: list_or_empty(
            "appointments",
            appointments,
            &mut failures,
        ),
        prescriptions: list_or_empty(
            "prescriptions",
            prescriptions,
            &mut failures,
        ),
        records: list_or_empty("records", records, &mut failures),
        failures,
    }
}

pub async fn load_doctor_overview(client: &Client) -> DoctorOverview {
    let (stats, appointments, patients) = tokio::join!(
        doctor::get_dashboard(client),
        doctor::get_appointments(client),
        doctor::get_patients(client)
    );

    let mut failures = Vec::new();

    let stats = stats.unwrap_or_else(|error| {
        failures.push(failed("stats", error));
        DoctorDashboard::default()
    });

    DoctorOverview {
        stats,
        appointments: list_or_empty(
            "appointments",
            appointments,
            &mut failures,
        ),
        patients: list_or_empty("patients", patients, &mut failures),
        failures,
    }
}

fn failed(section: &'static str, error: ApiError) -> SectionError {
    log::warn!("Unable to load the {}: {}", section, error);
    SectionError { section, error }
}

/// Pull a list out of a response, substituting an empty list on failure.
///
/// The backend sometimes wraps lists in an object (`{"doctors": [...]}`).
/// The field named after the section is preferred, otherwise the first
/// array-valued field in alphabetical key order is used. An empty body means
/// an empty list, and any other shape is recorded as a failure.
fn list_or_empty(
    section: &'static str,
    result: Result<Value, ApiError>,
    failures: &mut Vec<SectionError>,
) -> Vec<Value> {
    let body = match result {
        Ok(body) => body,
        Err(error) => {
            failures.push(failed(section, error));
            return Vec::new();
        },
    };

    let list = match body {
        Value::Null => Value::Array(Vec::new()),
        Value::Object(mut fields) => match fields.remove(section) {
            Some(named @ Value::Array(_)) => named,
            _ => fields
                .into_iter()
                .map(|(_, value)| value)
                .find(Value::is_array)
                .unwrap_or(Value::Object(Default::default())),
        },
        other => other,
    };

    serde_json::from_value(list).unwrap_or_else(|e| {
        failures.push(failed(section, ApiError::Parse(e)));
        Vec::new()
    })
}
