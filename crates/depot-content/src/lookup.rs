//! Resolving package ids and natural-key queries into package records.
//!
//! Small requests are resolved one item at a time, which keeps them
//! strongly consistent. Anything larger, or a request for everything, is
//! answered by draining the repository's package list once and matching
//! locally, so cost grows with the number of pages rather than the number
//! of requested packages.

use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use depot_events::DepotEvent;
use depot_gateway::{api::id_field, Filters, GatewayError, PackageApi, Pagination, Session};
use depot_id::{Identifier, PackageType};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ContentError, Result};

/// Requests smaller than this are resolved item by item.
pub const INDIVIDUAL_LOOKUP_LIMIT: usize = 10;

/// A package described by every natural key field of its type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageQuery {
    fields: BTreeMap<String, String>,
}

impl PackageQuery {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Queries are strict: every natural key field must be present and no
    /// other field may be.
    pub fn validate(&self, package_type: PackageType) -> Result<()> {
        let keys = package_type.natural_key_fields();
        if let Some(missing) = keys.iter().find(|key| !self.fields.contains_key(**key)) {
            return Err(ContentError::InvalidQuery(format!(
                "{package_type} query is missing `{missing}`"
            )));
        }
        if let Some(extra) = self.fields.keys().find(|field| !keys.contains(&field.as_str())) {
            return Err(ContentError::InvalidQuery(format!(
                "`{extra}` is not a natural key of {package_type} packages"
            )));
        }
        Ok(())
    }

    /// Field-by-field equality against a package record.
    pub fn matches(&self, record: &Value) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| field_text(record, field).as_deref() == Some(expected))
    }
}

impl fmt::Display for PackageQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, value) in &self.fields {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field}={value}")?;
            first = false;
        }
        Ok(())
    }
}

fn field_text(record: &Value, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Looks up packages of one type in a repository, optionally within one
/// release.
pub struct PackageLookup<'s> {
    session: &'s Session,
    repo: Identifier,
    package_type: PackageType,
    release: Option<Identifier>,
}

impl<'s> PackageLookup<'s> {
    pub fn new(session: &'s Session, repo: Identifier, package_type: PackageType) -> Self {
        Self {
            session,
            repo,
            package_type,
            release: None,
        }
    }

    pub fn with_release(mut self, release: Identifier) -> Self {
        self.release = Some(release);
        self
    }

    /// Records for the requested ids and queries.
    ///
    /// With nothing requested every package in scope is returned. Items
    /// that match nothing, or a query that matches several packages, are
    /// logged and skipped. Records from list scans only carry the natural
    /// key fields and `id`.
    ///
    /// Fewer than [`INDIVIDUAL_LOOKUP_LIMIT`] ids are read directly, and a
    /// direct read cannot tell whether the package is actually in the
    /// repository. Treat such results as likely but unverified members.
    /// A read the backend answers with 404 or 400 counts as a miss. Any
    /// other failure, such as a rejected credential, is returned.
    pub fn lookup(&self, ids: &[Identifier], queries: &[PackageQuery]) -> Result<Vec<Value>> {
        for id in ids {
            if id.package_type() != Some(self.package_type) {
                return Err(ContentError::InvalidQuery(format!(
                    "{id} is not a {} package",
                    self.package_type
                )));
            }
        }
        for query in queries {
            query.validate(self.package_type)?;
        }

        let requested = ids.len() + queries.len();
        debug!(
            repo = %self.repo,
            package_type = %self.package_type,
            requested,
            "package lookup"
        );
        if requested > 0 && requested < INDIVIDUAL_LOOKUP_LIMIT {
            self.individually(ids, queries)
        } else {
            self.scan(ids, queries)
        }
    }

    /// The one package matching `query`, strictly.
    ///
    /// Unlike [`PackageLookup::lookup`] several matches are an error.
    pub fn find_one(&self, query: &PackageQuery) -> Result<Option<Value>> {
        query.validate(self.package_type)?;
        let mut params = self.scope()?;
        self.find_one_in(&mut params, query)
    }

    fn find_one_in(&self, params: &mut Filters, query: &PackageQuery) -> Result<Option<Value>> {
        for (field, value) in query.fields() {
            params.insert(field.to_string(), value.to_string());
        }
        let page = PackageApi::new(self.session).list(
            self.package_type,
            Pagination::first(2),
            params,
        )?;
        match page.count {
            0 => Ok(None),
            1 => Ok(page.results.into_iter().next()),
            count => Err(ContentError::AmbiguousMatch {
                query: query.to_string(),
                count: count as usize,
            }),
        }
    }

    fn scope(&self) -> Result<Filters> {
        let mut params =
            PackageApi::new(self.session).scope_filters(&self.repo, self.release.as_ref())?;
        let mut fields: Vec<&str> = self.package_type.natural_key_fields().to_vec();
        fields.push("pulp_href");
        params.insert("fields".to_string(), fields.join(","));
        Ok(params)
    }

    fn individually(&self, ids: &[Identifier], queries: &[PackageQuery]) -> Result<Vec<Value>> {
        let mut found = Vec::new();

        if !queries.is_empty() {
            let scope = self.scope()?;
            for query in queries {
                let mut params = scope.clone();
                match self.find_one_in(&mut params, query) {
                    Ok(Some(record)) => found.push(record),
                    Ok(None) => self.miss(&query.to_string()),
                    Err(ContentError::AmbiguousMatch { query, count }) => self.ambiguous(query, count),
                    Err(e) => return Err(e),
                }
            }
        }

        let packages = PackageApi::new(self.session);
        for id in ids {
            match packages.read(id) {
                Ok(record) => found.push(record),
                Err(
                    GatewayError::NotFound { .. } | GatewayError::Validation { status: 400, .. },
                ) => self.miss(&id.to_string()),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(found)
    }

    fn scan(&self, ids: &[Identifier], queries: &[PackageQuery]) -> Result<Vec<Value>> {
        let want_all = ids.is_empty() && queries.is_empty();
        let wanted: Vec<String> = ids.iter().map(Identifier::to_string).collect();
        let mut id_hits = vec![false; ids.len()];
        let mut query_hits: Vec<Vec<Value>> = vec![Vec::new(); queries.len()];
        let mut found = Vec::new();
        let mut taken = HashSet::new();

        let resource = PackageApi::new(self.session).resource(self.package_type)?;
        for record in resource.pages(self.scope()?) {
            let record = record?;
            if want_all {
                found.push(record);
                continue;
            }

            // A record may answer an id and any number of queries at once.
            let id = id_field(&record, "id")?.to_string();
            for (query, hits) in queries.iter().zip(query_hits.iter_mut()) {
                if query.matches(&record) {
                    hits.push(record.clone());
                }
            }
            let mut requested = false;
            for (wanted, hit) in wanted.iter().zip(id_hits.iter_mut()) {
                if *wanted == id {
                    *hit = true;
                    requested = true;
                }
            }
            if requested && taken.insert(id) {
                found.push(record);
            }
        }

        for (id, hit) in wanted.iter().zip(&id_hits) {
            if !hit {
                self.miss(id);
            }
        }
        for (query, mut hits) in queries.iter().zip(query_hits) {
            match hits.len() {
                0 => self.miss(&query.to_string()),
                1 => {
                    let record = hits.remove(0);
                    if taken.insert(id_field(&record, "id")?.to_string()) {
                        found.push(record);
                    }
                }
                count => self.ambiguous(query.to_string(), count),
            }
        }
        Ok(found)
    }

    fn ambiguous(&self, item: String, count: usize) {
        warn!(repo = %self.repo, item = %item, count, "multiple packages found");
        self.session.emit(DepotEvent::LookupAmbiguous {
            repo: self.repo.to_string(),
            item,
            count,
        });
    }

    fn miss(&self, item: &str) {
        warn!(repo = %self.repo, item, "package not found");
        self.session.emit(DepotEvent::LookupMiss {
            repo: self.repo.to_string(),
            item: item.to_string(),
        });
    }
}
