//! Apt releases and the content hanging off them.
//!
//! A release owns components and architectures. Packages are linked into a
//! component through package release components, which are the only record
//! of a package being "in" a release.

use depot_id::{Identifier, ResourceKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{
    api::{filters, id_field, str_field, Filters, ListPage, Pagination, ResourceApi, TaskRef},
    error::Result,
    repository::RepositoryApi,
    session::Session,
};

/// Filters accepted by [`ReleaseApi::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseFilter {
    /// Only releases in the latest version of this repository.
    pub repository: Option<Identifier>,
    pub distribution: Option<String>,
    pub codename: Option<String>,
    pub suite: Option<String>,
    /// Only releases containing this package. Needs `repository`.
    pub package: Option<Identifier>,
}

/// A release to find or create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelease {
    pub distribution: String,
    pub codename: String,
    pub suite: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing)]
    pub components: Vec<String>,
    #[serde(default, skip_serializing)]
    pub architectures: Vec<String>,
}

pub struct ReleaseApi<'s> {
    session: &'s Session,
}

impl<'s> ReleaseApi<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn resource(&self) -> Result<ResourceApi<'s>> {
        ResourceApi::for_kind(self.session, ResourceKind::Release)
    }

    fn filters(&self, filter: &ReleaseFilter) -> Result<Filters> {
        let mut out = Filters::new();
        if let Some(repo) = &filter.repository {
            let version = RepositoryApi::new(self.session).latest_version(repo)?;
            let version = self.session.reference(&version);
            if let Some(package) = &filter.package {
                out.insert(
                    "package".to_string(),
                    format!("{},{version}", self.session.reference(package)),
                );
            }
            out.insert("repository_version".to_string(), version);
        }
        for (key, value) in [
            ("distribution", &filter.distribution),
            ("codename", &filter.codename),
            ("suite", &filter.suite),
        ] {
            if let Some(value) = value {
                out.insert(key.to_string(), value.clone());
            }
        }
        Ok(out)
    }

    /// One page of releases, each decorated with the names of its
    /// components and architectures.
    pub fn list(&self, pagination: Pagination, filter: &ReleaseFilter) -> Result<ListPage> {
        let mut page = self.resource()?.list(pagination, &self.filters(filter)?)?;

        let components = ReleaseComponentApi::new(self.session);
        let architectures = ReleaseArchitectureApi::new(self.session);
        for release in &mut page.results {
            let id = id_field(release, "id")?;
            release["components"] = json!(components.names(&id)?);
            release["architectures"] = json!(architectures.names(&id)?);
        }
        Ok(page)
    }

    /// Identifiers of every release matching `filter`, without decoration.
    pub fn ids(&self, filter: &ReleaseFilter) -> Result<Vec<Identifier>> {
        self.resource()?
            .pages(self.filters(filter)?)
            .map(|release| release.and_then(|r| id_field(&r, "id")))
            .collect()
    }

    /// The release named `distribution` in `repo`, if there is one.
    pub fn find(&self, repo: &Identifier, distribution: &str) -> Result<Option<Identifier>> {
        let filter = ReleaseFilter {
            repository: Some(*repo),
            distribution: Some(distribution.to_string()),
            ..Default::default()
        };
        Ok(self.ids(&filter)?.into_iter().next())
    }

    pub fn read(&self, release: &Identifier) -> Result<Value> {
        self.resource()?.read(release)
    }

    /// Finds or creates a release along with its components and
    /// architectures, then adds all of them to `repo` in one modify call.
    ///
    /// Releases are shared between repositories, so an existing release
    /// with the same distribution, codename and suite is reused.
    pub fn create(&self, repo: &Identifier, release: &NewRelease) -> Result<TaskRef> {
        let existing = self.resource()?.list(
            Pagination::first(1),
            &filters([
                ("distribution", release.distribution.as_str()),
                ("codename", release.codename.as_str()),
                ("suite", release.suite.as_str()),
            ]),
        )?;

        let release_id = match existing.results.first() {
            Some(record) => id_field(record, "id")?,
            None => {
                debug!(distribution = %release.distribution, "creating release");
                let record = self
                    .resource()?
                    .create(serde_json::to_value(release)?)?
                    .into_record()?;
                id_field(&record, "id")?
            }
        };

        let mut content = vec![release_id];
        content.extend(self.add_components(&release_id, &release.components)?);
        content.extend(self.add_architectures(&release_id, &release.architectures)?);

        RepositoryApi::new(self.session).modify_content(repo, &content, &[])
    }

    pub fn add_components(&self, release: &Identifier, names: &[String]) -> Result<Vec<Identifier>> {
        let api = ReleaseComponentApi::new(self.session);
        names
            .iter()
            .map(|name| api.find_or_create(release, name))
            .collect()
    }

    pub fn add_architectures(
        &self,
        release: &Identifier,
        names: &[String],
    ) -> Result<Vec<Identifier>> {
        let api = ReleaseArchitectureApi::new(self.session);
        names
            .iter()
            .map(|name| api.find_or_create(release, name))
            .collect()
    }
}

/// Named items owned by one release.
struct ReleaseItems<'s> {
    session: &'s Session,
    kind: ResourceKind,
    field: &'static str,
}

impl<'s> ReleaseItems<'s> {
    fn resource(&self) -> Result<ResourceApi<'s>> {
        ResourceApi::for_kind(self.session, self.kind)
    }

    fn filters(&self, release: &Identifier, name: Option<&str>) -> Filters {
        let mut out = filters([("release", self.session.reference(release))]);
        if let Some(name) = name {
            out.insert(self.field.to_string(), name.to_string());
        }
        out
    }

    fn records(&self, release: &Identifier, name: Option<&str>) -> Result<Vec<Value>> {
        self.resource()?.list_all(self.filters(release, name))
    }

    fn ids(&self, release: &Identifier, name: Option<&str>) -> Result<Vec<Identifier>> {
        self.records(release, name)?
            .iter()
            .map(|record| id_field(record, "id"))
            .collect()
    }

    fn names(&self, release: &Identifier) -> Result<Vec<String>> {
        self.records(release, None)?
            .iter()
            .map(|record| str_field(record, self.field).map(str::to_string))
            .collect()
    }

    fn find_or_create(&self, release: &Identifier, name: &str) -> Result<Identifier> {
        if let Some(id) = self.ids(release, Some(name))?.into_iter().next() {
            return Ok(id);
        }
        let mut body = Map::new();
        body.insert(self.field.to_string(), Value::String(name.to_string()));
        body.insert(
            "release".to_string(),
            Value::String(self.session.reference(release)),
        );
        let record = self
            .resource()?
            .create(Value::Object(body))?
            .into_record()?;
        id_field(&record, "id")
    }
}

/// Components of a release.
pub struct ReleaseComponentApi<'s> {
    items: ReleaseItems<'s>,
}

impl<'s> ReleaseComponentApi<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            items: ReleaseItems {
                session,
                kind: ResourceKind::ReleaseComponent,
                field: "component",
            },
        }
    }

    /// Components of `release`, optionally only the one named `component`.
    pub fn list(&self, release: &Identifier, component: Option<&str>) -> Result<Vec<Identifier>> {
        self.items.ids(release, component)
    }

    pub fn names(&self, release: &Identifier) -> Result<Vec<String>> {
        self.items.names(release)
    }

    pub fn find_or_create(&self, release: &Identifier, component: &str) -> Result<Identifier> {
        self.items.find_or_create(release, component)
    }
}

/// Architectures of a release.
pub struct ReleaseArchitectureApi<'s> {
    items: ReleaseItems<'s>,
}

impl<'s> ReleaseArchitectureApi<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            items: ReleaseItems {
                session,
                kind: ResourceKind::ReleaseArchitecture,
                field: "architecture",
            },
        }
    }

    pub fn list(
        &self,
        release: &Identifier,
        architecture: Option<&str>,
    ) -> Result<Vec<Identifier>> {
        self.items.ids(release, architecture)
    }

    pub fn names(&self, release: &Identifier) -> Result<Vec<String>> {
        self.items.names(release)
    }

    pub fn find_or_create(&self, release: &Identifier, architecture: &str) -> Result<Identifier> {
        self.items.find_or_create(release, architecture)
    }
}

/// Links between packages and release components.
pub struct PackageReleaseComponentApi<'s> {
    session: &'s Session,
}

impl<'s> PackageReleaseComponentApi<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn resource(&self) -> Result<ResourceApi<'s>> {
        ResourceApi::for_kind(self.session, ResourceKind::PackageReleaseComponent)
    }

    /// The link between `package` and `component`, if it exists.
    pub fn find(&self, package: &Identifier, component: &Identifier) -> Result<Option<Identifier>> {
        let page = self.resource()?.list(
            Pagination::first(1),
            &filters([
                ("package", self.session.reference(package)),
                ("release_component", self.session.reference(component)),
            ]),
        )?;
        page.results
            .first()
            .map(|record| id_field(record, "id"))
            .transpose()
    }

    /// Returns the existing link, creating it first if needed.
    pub fn find_or_create(&self, package: &Identifier, component: &Identifier) -> Result<Identifier> {
        if let Some(prc) = self.find(package, component)? {
            return Ok(prc);
        }
        let record = self
            .resource()?
            .create(json!({
                "package": self.session.reference(package),
                "release_component": self.session.reference(component),
            }))?
            .into_record()?;
        id_field(&record, "id")
    }
}
