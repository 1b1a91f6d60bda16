//! Authenticated API client used by every operation adapter.
//!
//! All outbound I/O goes through [`ApiClient::send`], so credential injection,
//! query encoding and non-success handling are defined exactly once. The
//! convenience verbs (`get`, `post`, ...) and the GraphQL/probe helpers are
//! provided methods layered on top of that primitive, which keeps test doubles
//! down to a single method.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::{json, Map, Value};

use super::error::ApiError;
use crate::config::Credential;

/// Path every GraphQL document is posted to, relative to the base URL.
pub const GRAPHQL_PATH: &str = "/graphql";

/// Default per-request deadline applied to the HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("toolbridge/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Patch => write!(f, "PATCH"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Delete => write!(f, "DELETE"),
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One outbound request, before the backend profile is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Relative to the backend base URL unless absolute.
    pub path: String,
    /// Raw parameter values; `null` entries are dropped at encoding time.
    pub query: Vec<(String, Value)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Result of a probe that treats "not found" as a value rather than a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Performs a single attempt at `request`. No retries, no caching.
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError>;

    async fn get(&self, path: &str, query: &[(&str, Value)]) -> Result<Value, ApiError> {
        let mut request = ApiRequest::new(HttpMethod::Get, path);
        for (key, value) in query {
            request = request.with_query(*key, value.clone());
        }
        self.send(request).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.send(with_optional_body(HttpMethod::Post, path, body)).await
    }

    async fn patch(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.send(with_optional_body(HttpMethod::Patch, path, body)).await
    }

    async fn put(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.send(with_optional_body(HttpMethod::Put, path, body)).await
    }

    async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.send(ApiRequest::new(HttpMethod::Delete, path)).await
    }

    /// Posts `{ query, variables }` to the GraphQL endpoint and returns `data`.
    async fn graphql(&self, document: &str, variables: Option<Value>) -> Result<Value, ApiError> {
        let mut body = json!({ "query": document });
        if let Some(variables) = variables.filter(|v| !is_empty_object(v)) {
            body["variables"] = variables;
        }
        let response = self.post(GRAPHQL_PATH, Some(body)).await?;
        graphql_data(response)
    }

    /// Like `send`, but a 404 becomes `Lookup::NotFound`.
    async fn probe(&self, request: ApiRequest) -> Result<Lookup<Value>, ApiError> {
        match self.send(request).await {
            Ok(value) => Ok(Lookup::Found(value)),
            Err(err) if err.is_not_found() => Ok(Lookup::NotFound),
            Err(err) => Err(err),
        }
    }
}

fn with_optional_body(method: HttpMethod, path: &str, body: Option<Value>) -> ApiRequest {
    let request = ApiRequest::new(method, path);
    match body {
        Some(body) => request.with_body(body),
        None => request,
    }
}

fn is_empty_object(value: &Value) -> bool {
    value.as_object().is_some_and(Map::is_empty)
}

/// Unwraps a GraphQL response body, raising on a non-empty `errors` array.
pub fn graphql_data(mut response: Value) -> Result<Value, ApiError> {
    if !response.is_object() {
        return Err(ApiError::InvalidResponse(format!(
            "expected a GraphQL response object, got {response}"
        )));
    }
    if let Some(errors) = response.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            return Err(ApiError::GraphQl(Value::Array(errors.clone()).to_string()));
        }
    }
    Ok(response
        .get_mut("data")
        .map(Value::take)
        .unwrap_or(Value::Null))
}

/// How the credential is presented to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// `Authorization: token <token>`
    Token,
    /// The raw token under a custom header name.
    Header(String),
}

/// Static per-backend settings shared by every request of a server process.
#[derive(Debug, Clone)]
pub struct BackendProfile {
    pub name: String,
    pub base_url: String,
    pub auth: AuthScheme,
    /// Protocol pins and content negotiation sent on every request.
    pub headers: Vec<(String, String)>,
    /// Appended to every query string (tenant selectors and the like).
    pub default_query: Vec<(String, String)>,
}

impl BackendProfile {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            auth: AuthScheme::Bearer,
            headers: Vec::new(),
            default_query: Vec::new(),
        }
    }

    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_default_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_query.push((key.into(), value.into()));
        self
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Resolves `path` against the base URL unless it is already absolute.
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Turns raw parameter values into query pairs.
///
/// `null` values are omitted, strings are used as-is and arrays are joined
/// with commas. Anything else uses its JSON rendering.
pub fn encode_query(params: &[(String, Value)]) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(key, value)| query_value(value).map(|v| (key.clone(), v)))
        .collect()
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(query_value)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

/// `ApiClient` backed by reqwest.
pub struct HttpApiClient {
    profile: BackendProfile,
    credential: Credential,
    client: reqwest::Client,
}

impl HttpApiClient {
    pub fn new(
        profile: BackendProfile,
        credential: Credential,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            profile,
            credential,
            client,
        })
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let token = self.credential.expose();
        match &self.profile.auth {
            AuthScheme::Bearer => builder.bearer_auth(token),
            AuthScheme::Token => builder.header(AUTHORIZATION, format!("token {token}")),
            AuthScheme::Header(name) => builder.header(name.as_str(), token),
        }
    }
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = self.profile.resolve_url(&request.path);
        let mut query = encode_query(&request.query);
        query.extend(self.profile.default_query.iter().cloned());

        let mut builder = self.client.request(request.method.into(), &url);
        if !self.profile.has_header(ACCEPT.as_str()) {
            builder = builder.header(ACCEPT, "application/json");
        }
        for (name, value) in &self.profile.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder = self.authorize(builder);

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        tracing::debug!(
            backend = %self.profile.name,
            method = %request.method,
            url = %url,
            status = status.as_u16(),
            "api response"
        );

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(parse_body(&text))
    }
}

/// Empty bodies become `null`; non-JSON bodies (diffs, plain text) are kept
/// as a string.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
