use crate::{
    error::ApiError,
    session::{SessionError, UserProfile},
    Client,
};
use reqwest::Method;
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;

/// Exchange an email and password for a bearer token.
///
/// This doesn't touch the session; see [`sign_in()`] for that.
pub async fn login(
    client: &Client,
    credentials: &Credentials,
) -> Result<LoginResponse, ApiError> {
    let response: LoginResponse = client
        .send_json(Method::POST, &["auth", "login"], credentials)
        .await?;

    log::debug!(
        "The server issued a {} token for {}",
        response.token_type,
        response.profile.email
    );

    Ok(response)
}

/// Log in and remember the new session.
pub async fn sign_in(
    client: &Client,
    credentials: &Credentials,
) -> Result<UserProfile, LoginError> {
    let LoginResponse {
        access_token,
        profile,
        ..
    } = login(client, credentials).await?;

    client.session().login(access_token, profile.clone())?;

    Ok(profile)
}

/// Create a new patient account.
pub async fn register(
    client: &Client,
    registration: &Registration,
) -> Result<Value, ApiError> {
    client
        .send_json(Method::POST, &["patient", "register"], registration)
        .await
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The body of a successful [`login()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub profile: UserProfile,
}

fn default_token_type() -> String { String::from("bearer") }

/// A new patient signing themselves up.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub allergies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub medical_conditions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact_phone: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Possible errors that may be returned by [`sign_in()`].
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Login was rejected")]
    Api(#[from] ApiError),
    #[error("Unable to save the new session")]
    Session(#[from] SessionError),
}
