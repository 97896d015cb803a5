//! Wire layer between a [`Session`](crate::Session) and the content store.
//!
//! A transport only moves JSON; status interpretation and reference
//! rewriting happen in the session.

use std::{fmt, sync::Arc};

use base64::prelude::*;
use depot_config::BackendConfig;
use serde_json::Value;
use tracing::trace;
use ureq::{typestate::WithoutBody, Agent, RequestBuilder};

use crate::error::{GatewayError, Result};

pub const CORRELATION_HEADER: &str = "Correlation-ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        })
    }
}

/// A request against a path relative to the API root.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path).body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw status and decoded body. An empty body decodes to `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests to the content store.
///
/// Implementations must not treat non-2xx statuses as errors; only failures
/// to exchange a request at all are reported as `Err`.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        (**self).send(request)
    }
}

/// HTTP transport backed by a `ureq` agent.
///
/// Each instance owns its agent, credentials and correlation id; none of
/// them are shared with other transports.
pub struct UreqTransport {
    agent: Agent,
    root: String,
    authorization: Option<String>,
    correlation_id: String,
}

impl UreqTransport {
    pub fn new(config: &BackendConfig, correlation_id: impl Into<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout())
            .user_agent(config.user_agent())
            .build()
            .into();

        let authorization = config.credentials().map(|(user, pass)| {
            format!("Basic {}", BASE64_STANDARD.encode(format!("{user}:{pass}")))
        });

        Self {
            agent,
            root: format!("{}{}", config.base_url(), config.api_path),
            authorization,
            correlation_id: correlation_id.into(),
        }
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.root, path)
    }

    fn prepare<B>(&self, mut req: RequestBuilder<B>, request: &ApiRequest) -> RequestBuilder<B> {
        req = req
            .header("Accept", "application/json")
            .header(CORRELATION_HEADER, &self.correlation_id);
        if let Some(auth) = &self.authorization {
            req = req.header("Authorization", auth);
        }
        for (key, value) in &request.query {
            req = req.query(key, value);
        }
        req
    }

    fn without_body(
        &self,
        req: RequestBuilder<WithoutBody>,
        request: &ApiRequest,
    ) -> Result<ureq::http::Response<ureq::Body>> {
        Ok(self.prepare(req, request).call()?)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url(&request.path);
        trace!(method = %request.method, url = %url, "sending request");

        let empty = Value::Object(Default::default());
        let body = request.body.as_ref().unwrap_or(&empty);

        let mut response = match request.method {
            Method::Get => self.without_body(self.agent.get(&url), request)?,
            Method::Delete => self.without_body(self.agent.delete(&url), request)?,
            Method::Post => self.prepare(self.agent.post(&url), request).send_json(body)?,
            Method::Patch => self.prepare(self.agent.patch(&url), request).send_json(body)?,
        };

        let status = response.status().as_u16();
        let text = response.body_mut().read_to_string()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => value,
                // error pages from proxies are rarely JSON; keep the text for diagnostics
                Err(_) if !(200..300).contains(&status) => Value::String(text),
                Err(e) => {
                    return Err(GatewayError::InvalidResponse {
                        path: request.path.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        };

        Ok(ApiResponse { status, body })
    }
}
