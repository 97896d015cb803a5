use std::sync::Arc;

use depot_config::{config::DEFAULT_PAGE_SIZE, Config, TaskConfig};
use depot_events::{DepotEvent, EventSinkHandle, NullSink};
use depot_id::Identifier;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{GatewayError, Result},
    transport::{ApiRequest, Transport, UreqTransport},
    translate::Translator,
};

/// Connection context for one request or one worker.
///
/// A session owns its transport, credentials and correlation id. Build a
/// new session for every unit of concurrent work instead of sharing one.
pub struct Session {
    transport: Box<dyn Transport>,
    translator: Translator,
    api_path: String,
    page_size: u32,
    tasks: TaskConfig,
    events: EventSinkHandle,
    correlation_id: String,
}

impl Session {
    /// Connects to the configured content store over HTTP.
    pub fn new(config: &Config) -> Self {
        let correlation_id = uuid::Uuid::new_v4().simple().to_string();
        let transport = UreqTransport::new(&config.backend, correlation_id.clone());
        Self {
            transport: Box::new(transport),
            translator: Translator::new(config.backend.api_path.clone()),
            api_path: config.backend.api_path.clone(),
            page_size: config.page_size(),
            tasks: config.tasks.clone(),
            events: Arc::new(NullSink),
            correlation_id,
        }
    }

    /// Builds a session over an arbitrary transport.
    pub fn with_transport(transport: impl Transport + 'static, api_path: impl Into<String>) -> Self {
        let api_path = api_path.into();
        Self {
            transport: Box::new(transport),
            translator: Translator::new(api_path.clone()),
            api_path,
            page_size: DEFAULT_PAGE_SIZE,
            tasks: TaskConfig::default(),
            events: Arc::new(NullSink),
            correlation_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_task_config(mut self, tasks: TaskConfig) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn api_path(&self) -> &str {
        &self.api_path
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn tasks(&self) -> &TaskConfig {
        &self.tasks
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn emit(&self, event: DepotEvent) {
        self.events.emit(event);
    }

    pub fn events(&self) -> &EventSinkHandle {
        &self.events
    }

    /// Full backend reference of an identifier, as sent in request bodies.
    pub fn reference(&self, id: &Identifier) -> String {
        id.to_reference(&self.api_path)
    }

    /// Sends a request and maps non-2xx statuses onto [`GatewayError`].
    ///
    /// The returned body is not yet translated.
    pub fn send(&self, request: &ApiRequest) -> Result<Value> {
        debug!(
            method = %request.method,
            path = %request.path,
            correlation_id = %self.correlation_id,
            "backend request"
        );

        let response = self.transport.send(request)?;
        let status = response.status;

        match status {
            200..=299 => Ok(response.body),
            404 => {
                Err(GatewayError::NotFound {
                    path: request.path.clone(),
                    detail: response.body,
                })
            }
            400..=499 => {
                Err(GatewayError::Validation {
                    status,
                    detail: response.body,
                })
            }
            _ => {
                Err(GatewayError::Upstream {
                    status,
                    path: request.path.clone(),
                    detail: response.body,
                })
            }
        }
    }

    /// Sends a request and translates the response body.
    pub fn request(&self, request: &ApiRequest) -> Result<Value> {
        self.send(request).map(|body| self.translator.response(body))
    }
}
