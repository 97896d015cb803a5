//! Generic list/read/create/update/destroy over one resource collection.

use std::collections::BTreeMap;

use depot_id::{Identifier, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{GatewayError, Result},
    pages::Pages,
    session::Session,
    transport::ApiRequest,
};

/// Backend field filters, sent as query parameters.
pub type Filters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: depot_config::config::DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }

    /// The page after one that returned `received` records. Backends may
    /// serve fewer records than `limit`, so the offset follows what arrived.
    pub fn after(self, received: usize) -> Self {
        let received = u32::try_from(received).unwrap_or(u32::MAX);
        Self {
            offset: self.offset.saturating_add(received),
            ..self
        }
    }
}

/// One page of a translated list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    pub results: Vec<Value>,
    pub count: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Reference to an asynchronous backend task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub task: Identifier,
}

impl TaskRef {
    /// Extracts the task from a translated `{"task": ...}` body.
    pub fn from_response(body: &Value) -> Result<Self> {
        let task = body
            .get("task")
            .and_then(Value::as_str)
            .ok_or(GatewayError::MissingField("task"))?;
        let task = Identifier::decode(task)?;
        if task.kind() != ResourceKind::Task {
            return Err(GatewayError::InvalidResponse {
                path: task.to_string(),
                reason: "expected a task reference".to_string(),
            });
        }
        Ok(Self { task })
    }
}

/// Result of a mutating call: either the record itself or a task that
/// will produce it.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Record(Value),
    Task(TaskRef),
    Empty,
}

impl Outcome {
    pub fn from_response(body: Value) -> Result<Self> {
        if body.is_null() {
            return Ok(Outcome::Empty);
        }
        if body.get("task").is_some() && body.get("id").is_none() {
            return TaskRef::from_response(&body).map(Outcome::Task);
        }
        Ok(Outcome::Record(body))
    }

    pub fn into_task(self) -> Result<TaskRef> {
        match self {
            Outcome::Task(task) => Ok(task),
            _ => Err(GatewayError::MissingField("task")),
        }
    }

    pub fn into_record(self) -> Result<Value> {
        match self {
            Outcome::Record(record) => Ok(record),
            _ => Err(GatewayError::MissingField("id")),
        }
    }
}

/// Paths of one resource collection.
///
/// `list` and `create` are fixed collection paths; detail paths are built
/// from the identifier, after checking it belongs to this collection.
#[derive(Debug, Clone)]
pub struct Endpoint {
    name: String,
    list: String,
    create: Option<String>,
    accepts: fn(ResourceKind) -> bool,
}

impl Endpoint {
    /// Endpoint for exactly one registered kind.
    pub fn for_kind(kind: ResourceKind) -> Result<Self> {
        let path = kind
            .collection_path()
            .ok_or_else(|| GatewayError::UnsupportedAction {
                action: "address",
                kind: format!("{kind:?}"),
            })?;
        let accepts: fn(ResourceKind) -> bool = match kind {
            ResourceKind::Repository(_) => |k| matches!(k, ResourceKind::Repository(_)),
            ResourceKind::Distribution(_) => |k| matches!(k, ResourceKind::Distribution(_)),
            ResourceKind::Publication(_) => |k| matches!(k, ResourceKind::Publication(_)),
            ResourceKind::Remote(_) => |k| matches!(k, ResourceKind::Remote(_)),
            ResourceKind::Package(_) => |k| matches!(k, ResourceKind::Package(_)),
            ResourceKind::Release => |k| k == ResourceKind::Release,
            ResourceKind::ReleaseComponent => |k| k == ResourceKind::ReleaseComponent,
            ResourceKind::ReleaseArchitecture => |k| k == ResourceKind::ReleaseArchitecture,
            ResourceKind::PackageReleaseComponent => {
                |k| k == ResourceKind::PackageReleaseComponent
            }
            ResourceKind::Task => |k| k == ResourceKind::Task,
            ResourceKind::Artifact => |k| k == ResourceKind::Artifact,
        };
        Ok(Self {
            name: format!("{kind:?}"),
            list: path.clone(),
            create: Some(path),
            accepts,
        })
    }

    /// Every repository regardless of type. Creation needs a type, so it is
    /// not offered here.
    pub fn repositories() -> Self {
        Self {
            name: "repositories".to_string(),
            list: "/repositories/".to_string(),
            create: None,
            accepts: |k| matches!(k, ResourceKind::Repository(_)),
        }
    }

    pub fn list_path(&self) -> &str {
        &self.list
    }

    pub fn create_path(&self) -> Result<&str> {
        self.create
            .as_deref()
            .ok_or_else(|| GatewayError::UnsupportedAction {
                action: "create",
                kind: self.name.clone(),
            })
    }

    /// API-relative detail path of `id`.
    pub fn detail_path(&self, id: &Identifier) -> Result<String> {
        if !(self.accepts)(id.kind()) {
            return Err(GatewayError::UnsupportedAction {
                action: "address",
                kind: format!("{} through {}", id, self.name),
            });
        }
        Ok(id.to_reference(""))
    }
}

/// CRUD primitives over one endpoint.
#[derive(Clone)]
pub struct ResourceApi<'s> {
    session: &'s Session,
    endpoint: Endpoint,
}

impl<'s> ResourceApi<'s> {
    pub fn new(session: &'s Session, endpoint: Endpoint) -> Self {
        Self { session, endpoint }
    }

    pub fn for_kind(session: &'s Session, kind: ResourceKind) -> Result<Self> {
        Ok(Self::new(session, Endpoint::for_kind(kind)?))
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetches one page. `limit` and `offset` are added to the filters.
    pub fn list(&self, pagination: Pagination, filters: &Filters) -> Result<ListPage> {
        let request = ApiRequest::get(self.endpoint.list_path())
            .query(filters.iter().map(|(k, v)| (k.clone(), v.clone())))
            .query([
                ("limit", pagination.limit.to_string()),
                ("offset", pagination.offset.to_string()),
            ]);

        let body = self.session.send(&request)?;
        let mut body = self.session.translator().list(body);

        let count = body
            .get("count")
            .and_then(Value::as_u64)
            .ok_or(GatewayError::MissingField("count"))?;
        let results = match body.get_mut("results").map(Value::take) {
            Some(Value::Array(results)) => results,
            _ => return Err(GatewayError::MissingField("results")),
        };

        Ok(ListPage {
            results,
            count,
            limit: pagination.limit,
            offset: pagination.offset,
        })
    }

    /// Iterates over every matching record, fetching pages as needed.
    pub fn pages(&self, filters: Filters) -> Pages<'s> {
        Pages::new(self.clone(), filters, self.session.page_size())
    }

    /// Collects every matching record.
    pub fn list_all(&self, filters: Filters) -> Result<Vec<Value>> {
        self.pages(filters).collect()
    }

    pub fn read(&self, id: &Identifier) -> Result<Value> {
        let path = self.endpoint.detail_path(id)?;
        self.session.request(&ApiRequest::get(path))
    }

    pub fn create(&self, data: Value) -> Result<Outcome> {
        let path = self.endpoint.create_path()?;
        let body = self.session.request(&ApiRequest::post(path, data))?;
        Outcome::from_response(body)
    }

    pub fn update(&self, id: &Identifier, partial: Value) -> Result<Outcome> {
        let path = self.endpoint.detail_path(id)?;
        let body = self.session.request(&ApiRequest::patch(path, partial))?;
        Outcome::from_response(body)
    }

    pub fn destroy(&self, id: &Identifier) -> Result<Outcome> {
        let path = self.endpoint.detail_path(id)?;
        let body = self.session.request(&ApiRequest::delete(path))?;
        Outcome::from_response(body)
    }
}

/// Reads a field holding an identifier from a translated record.
pub fn id_field(record: &Value, field: &'static str) -> Result<Identifier> {
    let value = record
        .get(field)
        .and_then(Value::as_str)
        .ok_or(GatewayError::MissingField(field))?;
    Ok(Identifier::decode(value)?)
}

/// Reads a string field from a translated record.
pub fn str_field<'v>(record: &'v Value, field: &'static str) -> Result<&'v str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .ok_or(GatewayError::MissingField(field))
}

/// Builds a [`Filters`] map from pairs.
pub fn filters<I, K, V>(pairs: I) -> Filters
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
