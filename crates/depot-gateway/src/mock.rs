//! In-memory transport for testing.

use std::{collections::VecDeque, sync::Mutex};

use serde_json::{json, Value};

use crate::{
    error::Result,
    transport::{ApiRequest, ApiResponse, Method, Transport},
};

type Handler = Box<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

enum Responder {
    /// Answers in order; the last response repeats.
    Queue(VecDeque<ApiResponse>),
    Handler(Handler),
}

struct Route {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    responder: Responder,
}

impl Route {
    fn matches(&self, request: &ApiRequest) -> bool {
        self.method == request.method
            && self.path == request.path
            && self
                .query
                .iter()
                .all(|pair| request.query.iter().any(|q| q == pair))
    }
}

/// Scripted transport that records every request.
///
/// Routes are matched on method, path and a subset of query pairs. Later
/// routes take precedence over earlier ones, so a test can register a broad
/// default and then narrow it. Unmatched requests get a 404.
///
/// # Example
///
/// ```
/// use depot_gateway::mock::MockTransport;
/// use depot_gateway::transport::{ApiRequest, Method, Transport};
/// use serde_json::json;
///
/// let mock = MockTransport::new();
/// mock.on(Method::Get, "/tasks/").respond(200, json!({"count": 0, "results": []}));
///
/// let response = mock.send(&ApiRequest::get("/tasks/")).unwrap();
/// assert_eq!(response.status, 200);
/// assert_eq!(mock.count(Method::Get, "/tasks/"), 1);
/// ```
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

/// Builder returned by [`MockTransport::on`].
pub struct RouteBuilder<'a> {
    mock: &'a MockTransport,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
}

impl RouteBuilder<'_> {
    /// Only match requests carrying this query pair.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn respond(self, status: u16, body: Value) {
        self.respond_seq([(status, body)]);
    }

    /// Answers with each response in turn, repeating the last one.
    pub fn respond_seq(self, responses: impl IntoIterator<Item = (u16, Value)>) {
        let queue = responses
            .into_iter()
            .map(|(status, body)| ApiResponse::new(status, body))
            .collect();
        self.install(Responder::Queue(queue));
    }

    pub fn handle<F>(self, handler: F)
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        self.install(Responder::Handler(Box::new(handler)));
    }

    fn install(self, responder: Responder) {
        let route = Route {
            method: self.method,
            path: self.path,
            query: self.query,
            responder,
        };
        if let Ok(mut routes) = self.mock.routes.lock() {
            routes.push(route);
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, method: Method, path: impl Into<String>) -> RouteBuilder<'_> {
        RouteBuilder {
            mock: self,
            method,
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Requests with this method whose path starts with `prefix`.
    pub fn matching(&self, method: Method, prefix: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(prefix))
            .collect()
    }

    pub fn count(&self, method: Method, prefix: &str) -> usize {
        self.matching(method, prefix).len()
    }

    /// Number of requests that could change backend state.
    pub fn mutations(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method != Method::Get)
            .count()
    }

    pub fn clear_requests(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let not_found = || ApiResponse::new(404, json!({"detail": "Not found."}));
        let Ok(mut routes) = self.routes.lock() else {
            return Ok(not_found());
        };

        let Some(route) = routes.iter_mut().rev().find(|route| route.matches(request)) else {
            return Ok(not_found());
        };

        let response = match &mut route.responder {
            Responder::Queue(queue) => {
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or_else(not_found)
                } else {
                    queue.front().cloned().unwrap_or_else(not_found)
                }
            }
            Responder::Handler(handler) => handler(request),
        };
        Ok(response)
    }
}
