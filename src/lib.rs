//! A client for the clinic-management REST API.
//!
//! The [`SessionStore`] remembers who is logged in (persisting the bearer
//! token and profile between runs) and the [`Client`] sends requests to the
//! backend on their behalf. The operations themselves live in [`endpoints`],
//! grouped by role.

#![forbid(unsafe_code)]

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

mod client;
pub mod endpoints;
mod error;
pub mod overview;
pub mod session;
#[cfg(test)]
mod test_utils;

pub use client::{
    handle_response, Client, ClientConfig, HttpTransport, RawResponse,
    Request, Transport, DEFAULT_BASE_URL,
};
pub use error::{ApiError, TransportError, AUTHENTICATION_REQUIRED};
pub use session::{
    FileStorage, MemoryStorage, ProfileUpdate, Role, Session, SessionError,
    SessionStore, Snapshot, Storage, UserProfile,
};

/// The default user agent to use when communicating with the clinic backend.
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "-", env!("CARGO_PKG_VERSION"));
