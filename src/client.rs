//! The plumbing shared by every endpoint.

use crate::{
    error::{ApiError, TransportError},
    session::SessionStore,
};
use async_trait::async_trait;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};
use url::Url;

/// Where the backend lives unless told otherwise.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:2739/api";

/// Settings used when constructing a [`Client`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }

        Ok(ClientConfig {
            base_url,
            user_agent: String::from(crate::DEFAULT_USER_AGENT),
        })
    }

    /// Append path segments to the base URL. Each segment is percent-encoded,
    /// so ids containing `/`, `?` or spaces stay inside their segment.
    fn url_for(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();

        match url.path_segments_mut() {
            Ok(mut path) => {
                path.pop_if_empty().extend(segments);
            },
            Err(()) => log::warn!(
                "\"{}\" can't have a path appended to it",
                self.base_url
            ),
        }

        url.to_string()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: Url::parse(DEFAULT_BASE_URL)
                .expect("The default base URL is always valid"),
            user_agent: String::from(crate::DEFAULT_USER_AGENT),
        }
    }
}

/// A fully prepared HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The bits of a response we care about.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Something which can actually send a [`Request`] over the wire.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request)
        -> Result<RawResponse, TransportError>;
}

/// A [`Transport`] which uses `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self { HttpTransport { client } }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: Request,
    ) -> Result<RawResponse, TransportError> {
        let Request {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, &url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        log::trace!("Headers: {:#?}", response.headers());

        let status = response.status();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse { status, body })
    }
}

/// A handle to the clinic backend.
///
/// Every request is sent with the bearer token from the [`SessionStore`] (if
/// there is one) and every response goes through the same normalisation, so
/// callers only ever see a parsed JSON body or a single [`ApiError`].
#[derive(Clone)]
pub struct Client {
    config: ClientConfig,
    session: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Create a client which talks to the backend using `reqwest`.
    pub fn new(
        config: ClientConfig,
        session: Arc<SessionStore>,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Client::with_transport(
            config,
            session,
            HttpTransport::new(http),
        ))
    }

    pub fn with_transport<T>(
        config: ClientConfig,
        session: Arc<SessionStore>,
        transport: T,
    ) -> Self
    where
        T: Transport + 'static,
    {
        Client {
            config,
            session,
            transport: Arc::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig { &self.config }

    pub fn session(&self) -> &Arc<SessionStore> { &self.session }

    /// Build the [`Request`] for an endpoint, attaching credentials from the
    /// session. The `path` segments are relative to the base URL and are
    /// escaped individually.
    pub fn prepare(
        &self,
        method: Method,
        path: &[&str],
        body: Option<Vec<u8>>,
    ) -> Request {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json"),
        );

        if let Ok(user_agent) = HeaderValue::from_str(&self.config.user_agent)
        {
            headers.insert(header::USER_AGENT, user_agent);
        }

        if body.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        if let Some(token) = self.session.token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(header::AUTHORIZATION, value);
                },
                Err(_) => log::warn!(
                    "The stored token can't be sent as a header, sending the request without it"
                ),
            }
        }

        Request {
            method,
            url: self.config.url_for(path),
            headers,
            body,
        }
    }

    /// Send a request without a body and parse the response.
    pub(crate) async fn get<T>(&self, path: &[&str]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.call(Method::GET, path, None).await
    }

    pub(crate) async fn delete(
        &self,
        path: &[&str],
    ) -> Result<Value, ApiError> {
        self.call(Method::DELETE, path, None).await
    }

    /// Send a request with a JSON body and parse the response.
    pub(crate) async fn send_json<D, T>(
        &self,
        method: Method,
        path: &[&str],
        data: &D,
    ) -> Result<T, ApiError>
    where
        D: Debug + Serialize + ?Sized,
        T: DeserializeOwned,
    {
        log::trace!("Payload: {:#?}", data);
        let body = serde_json::to_vec(data).map_err(ApiError::Encode)?;
        self.call(method, path, Some(body)).await
    }

    async fn call<T>(
        &self,
        method: Method,
        path: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let request = self.prepare(method, path, body);
        let authenticated = request.headers.contains_key(header::AUTHORIZATION);

        log::debug!("Sending a {} request to {}", request.method, request.url);

        let response = self.transport.send(request).await.map_err(|inner| {
            log::error!("Request failed: {}", inner);
            ApiError::Network {
                base_url: self.config.base_url.to_string(),
                inner,
            }
        })?;

        log::trace!(
            "Response ({}): {}",
            response.status,
            String::from_utf8_lossy(&response.body)
        );

        let result = handle_response(response);

        if let Err(ApiError::Auth) = result {
            if authenticated {
                log::warn!("The server rejected our token, clearing the session");
                if let Err(e) = self.session.logout() {
                    log::warn!("Unable to clear the session: {}", e);
                }
            }
        }

        result
    }
}

impl Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

/// Turn a [`RawResponse`] into either the parsed body or an [`ApiError`].
pub fn handle_response<T>(response: RawResponse) -> Result<T, ApiError>
where
    T: DeserializeOwned,
{
    let RawResponse { status, body } = response;

    if !status.is_success() {
        return Err(ApiError::from_response(status, &body));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        // e.g. "204 No Content" after a delete
        return serde_json::from_value(Value::Null).map_err(ApiError::from);
    }

    serde_json::from_slice(&body).map_err(ApiError::from)
}
