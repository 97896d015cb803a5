use depot_id::{Identifier, PackageType, ResourceKind};
use serde_json::{json, Value};

use crate::{
    api::{str_field, Filters, ListPage, Pagination, ResourceApi, TaskRef},
    error::{GatewayError, Result},
    repository::RepositoryApi,
    session::Session,
};

/// Package content units of every type.
pub struct PackageApi<'s> {
    session: &'s Session,
}

impl<'s> PackageApi<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    /// Generic operations on one package type.
    pub fn resource(&self, package_type: PackageType) -> Result<ResourceApi<'s>> {
        ResourceApi::for_kind(self.session, ResourceKind::Package(package_type))
    }

    pub fn list(
        &self,
        package_type: PackageType,
        pagination: Pagination,
        filters: &Filters,
    ) -> Result<ListPage> {
        self.resource(package_type)?.list(pagination, filters)
    }

    pub fn read(&self, id: &Identifier) -> Result<Value> {
        let package_type = id.package_type().ok_or_else(|| {
            GatewayError::UnsupportedAction {
                action: "read as a package",
                kind: id.to_string(),
            }
        })?;
        self.resource(package_type)?.read(id)
    }

    /// Filters that scope a package list to the latest version of `repo`,
    /// and to one release of it when given.
    pub fn scope_filters(&self, repo: &Identifier, release: Option<&Identifier>) -> Result<Filters> {
        let version = RepositoryApi::new(self.session).latest_version(repo)?;
        let version = self.session.reference(&version);

        let mut filters = Filters::new();
        if let Some(release) = release {
            filters.insert("release".to_string(), format!("{},{version}", release.uuid()));
        }
        filters.insert("repository_version".to_string(), version);
        Ok(filters)
    }

    /// One page of the packages in a repository's latest version.
    pub fn repository_packages(
        &self,
        repo: &Identifier,
        package_type: PackageType,
        pagination: Pagination,
        release: Option<&Identifier>,
    ) -> Result<ListPage> {
        let filters = self.scope_filters(repo, release)?;
        self.list(package_type, pagination, &filters)
    }

    /// Asks the backend to fetch a package from a URL and create it.
    pub fn create_from_url(
        &self,
        package_type: PackageType,
        url: &str,
        relative_path: Option<&str>,
    ) -> Result<TaskRef> {
        let mut body = json!({ "file_url": url });
        if let Some(path) = relative_path {
            body["relative_path"] = Value::String(path.to_string());
        }
        self.resource(package_type)?.create(body)?.into_task()
    }

    /// The package's name, read from the type's name field.
    pub fn package_name(&self, id: &Identifier) -> Result<String> {
        let record = self.read(id)?;
        let package_type = id
            .package_type()
            .ok_or(GatewayError::MissingField("package type"))?;
        str_field(&record, package_type.name_field()).map(str::to_string)
    }
}
