//! Test doubles shared by the unit tests.

use crate::{
    client::{Client, ClientConfig, RawResponse, Request, Transport},
    error::TransportError,
    session::{MemoryStorage, SessionStore, Storage, StorageError},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde_json::Value;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

#[derive(Debug, Clone)]
enum Canned {
    Respond(RawResponse),
    Fail(String),
}

#[derive(Debug, Default)]
struct State {
    requests: Vec<Request>,
    queue: VecDeque<Canned>,
    by_path: HashMap<String, Canned>,
}

/// A [`Transport`] which never touches the network.
///
/// Responses are either queued up in order with [`MockTransport::respond()`]
/// or keyed on the request path with [`MockTransport::route()`] (handy when
/// requests are sent concurrently and arrive in any order).
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    /// Get a [`Client`] wired up to a fresh mock and an empty in-memory
    /// session.
    pub fn client() -> (Client, MockTransport) {
        MockTransport::client_with(Arc::new(SessionStore::new(
            MemoryStorage::new(),
        )))
    }

    /// Like [`MockTransport::client()`], but using an existing session.
    pub fn client_with(session: Arc<SessionStore>) -> (Client, MockTransport) {
        let transport = MockTransport::default();
        let client = Client::with_transport(
            ClientConfig::default(),
            session,
            transport.clone(),
        );

        (client, transport)
    }

    pub fn respond(&self, status: u16, body: Value) {
        self.respond_raw(status, body.to_string());
    }

    pub fn respond_raw(&self, status: u16, body: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .queue
            .push_back(Canned::Respond(raw(status, body)));
    }

    pub fn fail(&self, reason: &str) {
        self.state
            .lock()
            .queue
            .push_back(Canned::Fail(reason.to_string()));
    }

    /// Always answer requests for `path` (relative to the base URL) with this
    /// response.
    pub fn route(&self, path: &str, status: u16, body: Value) {
        let url = ClientConfig::default().base_url.to_string();
        let key = format!("{}{}", url.trim_end_matches('/'), path);
        self.state
            .lock()
            .by_path
            .insert(key, Canned::Respond(raw(status, body.to_string())));
    }

    pub fn requests(&self) -> Vec<Request> { self.state.lock().requests.clone() }

    /// The one request that was sent, parsed back into JSON.
    pub fn last_body(&self) -> Option<Value> {
        let state = self.state.lock();
        let body = state.requests.last()?.body.as_ref()?;
        serde_json::from_slice(body).ok()
    }
}

fn raw(status: u16, body: impl Into<Vec<u8>>) -> RawResponse {
    RawResponse {
        status: StatusCode::from_u16(status).unwrap(),
        body: body.into(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: Request,
    ) -> Result<RawResponse, TransportError> {
        let mut state = self.state.lock();
        let routed = state.by_path.get(&request.url).cloned();
        let canned = routed.or_else(|| state.queue.pop_front());
        state.requests.push(request);
        drop(state);

        match canned {
            Some(Canned::Respond(response)) => Ok(response),
            Some(Canned::Fail(reason)) => Err(reason.into()),
            None => Err("No response was queued".into()),
        }
    }
}

/// A [`Storage`] which can be told to start failing, e.g. to simulate a full
/// disk. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct FlakyStorage {
    entries: Arc<MemoryStorage>,
    failures: Arc<Mutex<Failures>>,
}

#[derive(Debug, Default)]
struct Failures {
    set: Vec<String>,
    remove: bool,
}

impl FlakyStorage {
    /// Make every future `set()` of this key fail.
    pub fn fail_set(&self, key: &str) {
        self.failures.lock().set.push(key.to_string());
    }

    /// Make every future `remove()` fail.
    pub fn fail_removes(&self) { self.failures.lock().remove = true; }

    pub fn broken() -> StorageError {
        StorageError::Io {
            path: "flaky".into(),
            inner: std::io::Error::new(
                std::io::ErrorKind::Other,
                "No space left on device",
            ),
        }
    }
}

impl Storage for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.entries.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if self.failures.lock().set.iter().any(|k| k == key) {
            return Err(FlakyStorage::broken());
        }

        self.entries.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        if self.failures.lock().remove {
            return Err(FlakyStorage::broken());
        }

        self.entries.remove(key)
    }
}
