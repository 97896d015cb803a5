use depot_id::{Identifier, RepoType, ResourceKind};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{
    api::{id_field, Endpoint, Filters, ListPage, Pagination, ResourceApi, TaskRef},
    error::{GatewayError, Result},
    session::Session,
    transport::ApiRequest,
};

/// Repositories and their content.
pub struct RepositoryApi<'s> {
    session: &'s Session,
}

impl<'s> RepositoryApi<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    fn all(&self) -> ResourceApi<'s> {
        ResourceApi::new(self.session, Endpoint::repositories())
    }

    fn typed(&self, repo_type: RepoType) -> Result<ResourceApi<'s>> {
        ResourceApi::for_kind(self.session, ResourceKind::Repository(repo_type))
    }

    pub fn list(&self, pagination: Pagination, filters: &Filters) -> Result<ListPage> {
        self.all().list(pagination, filters)
    }

    pub fn read(&self, repo: &Identifier) -> Result<Value> {
        self.all().read(&repo_only(repo)?)
    }

    /// Creates a repository. A `remote` identifier in `data` is converted to
    /// a backend reference.
    pub fn create(&self, repo_type: RepoType, mut data: Value) -> Result<Value> {
        self.reference_field(&mut data, "remote")?;
        self.typed(repo_type)?.create(data)?.into_record()
    }

    pub fn update(&self, repo: &Identifier, mut partial: Value) -> Result<TaskRef> {
        self.reference_field(&mut partial, "remote")?;
        self.all().update(&repo_only(repo)?, partial)?.into_task()
    }

    pub fn destroy(&self, repo: &Identifier) -> Result<TaskRef> {
        self.all().destroy(&repo_only(repo)?)?.into_task()
    }

    /// Adds and removes content units in one new repository version.
    ///
    /// Empty sets are left out of the request body.
    pub fn modify_content(
        &self,
        repo: &Identifier,
        add: &[Identifier],
        remove: &[Identifier],
    ) -> Result<TaskRef> {
        let repo = repo_only(repo)?;
        let mut body = Map::new();
        if !add.is_empty() {
            body.insert("add_content_units".to_string(), self.references(add));
        }
        if !remove.is_empty() {
            body.insert("remove_content_units".to_string(), self.references(remove));
        }

        debug!(
            repo = %repo,
            add = add.len(),
            remove = remove.len(),
            "modifying repository content"
        );
        self.action(&repo, "modify", Value::Object(body))
    }

    /// Identifier of the repository's latest version.
    pub fn latest_version(&self, repo: &Identifier) -> Result<Identifier> {
        let record = self.read(repo)?;
        id_field(&record, "latest_version_href")
    }

    pub fn sync(&self, repo: &Identifier, remote: Option<&Identifier>) -> Result<TaskRef> {
        let repo = repo_only(repo)?;
        let body = match remote {
            Some(remote) => json!({ "remote": self.session.reference(remote) }),
            None => json!({}),
        };
        self.action(&repo, "sync", body)
    }

    /// Publishes the latest version of a repository.
    ///
    /// Apt publications are structured and carry the repository's metadata
    /// signing service, which is kept in its labels.
    pub fn publish(&self, repo: &Identifier) -> Result<TaskRef> {
        let repo = repo_only(repo)?;
        let repo_type = repo
            .repo_type()
            .ok_or(GatewayError::MissingField("repository type"))?;

        let mut body = json!({ "repository": self.session.reference(&repo) });
        if repo_type == RepoType::Apt {
            body["structured"] = Value::Bool(true);
            let record = self.read(&repo)?;
            if let Some(service) = record
                .pointer("/pulp_labels/signing_service")
                .and_then(Value::as_str)
            {
                body["signing_service"] = Value::String(service.to_string());
            }
        }

        let publications = ResourceApi::for_kind(self.session, ResourceKind::Publication(repo_type))?;
        publications.create(body)?.into_task()
    }

    fn action(&self, repo: &Identifier, action: &str, body: Value) -> Result<TaskRef> {
        let path = format!("{}{action}/", repo.to_reference(""));
        let response = self.session.request(&ApiRequest::post(path, body))?;
        TaskRef::from_response(&response)
    }

    fn references(&self, ids: &[Identifier]) -> Value {
        Value::Array(
            ids.iter()
                .map(|id| Value::String(self.session.reference(id)))
                .collect(),
        )
    }

    fn reference_field(&self, data: &mut Value, field: &str) -> Result<()> {
        if let Some(value) = data.get_mut(field) {
            if let Some(id) = value.as_str() {
                let id = Identifier::decode(id)?;
                *value = Value::String(self.session.reference(&id));
            }
        }
        Ok(())
    }
}

/// Strips a version from a repository identifier, rejecting anything else.
fn repo_only(id: &Identifier) -> Result<Identifier> {
    id.repository().ok_or_else(|| {
        GatewayError::UnsupportedAction {
            action: "treat as a repository",
            kind: id.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::{mock::MockTransport, transport::Method};

    const API: &str = "/pulp/api/v3";
    const REPO: &str = "13104a41-ba7a-4de0-98b3-ae6f5c263558";
    const TASK: &str = "7788448d-b112-47a8-a310-3ccfe088e809";
    const PKG: &str = "39a63a9e-2081-4dfe-80eb-2c27af4b6024";

    fn setup() -> (Arc<MockTransport>, Session) {
        let mock = Arc::new(MockTransport::new());
        let session = Session::with_transport(mock.clone(), API);
        (mock, session)
    }

    fn repo() -> Identifier {
        Identifier::decode(&format!("repositories-deb-apt-{REPO}")).unwrap()
    }

    fn task_body() -> Value {
        json!({"task": format!("/pulp/api/v3/tasks/{TASK}/")})
    }

    #[test]
    fn test_modify_content_body() {
        let (mock, session) = setup();
        let path = format!("/repositories/deb/apt/{REPO}/modify/");
        mock.on(Method::Post, path.as_str()).respond(202, task_body());

        let pkg = Identifier::decode(&format!("content-deb-packages-{PKG}")).unwrap();
        let task = RepositoryApi::new(&session)
            .modify_content(&repo(), &[pkg], &[])
            .unwrap();
        assert_eq!(task.task.to_string(), format!("tasks-{TASK}"));

        let request = &mock.matching(Method::Post, &path)[0];
        let body = request.body.as_ref().unwrap();
        assert_eq!(
            body["add_content_units"],
            json!([format!("/pulp/api/v3/content/deb/packages/{PKG}/")])
        );
        assert!(body.get("remove_content_units").is_none());
    }

    #[test]
    fn test_latest_version() {
        let (mock, session) = setup();
        mock.on(Method::Get, format!("/repositories/deb/apt/{REPO}/")).respond(
            200,
            json!({
                "pulp_href": format!("/pulp/api/v3/repositories/deb/apt/{REPO}/"),
                "latest_version_href": format!("/pulp/api/v3/repositories/deb/apt/{REPO}/versions/4/"),
            }),
        );

        let version = RepositoryApi::new(&session).latest_version(&repo()).unwrap();
        assert_eq!(version.version(), Some(4));
        assert_eq!(version.repository(), Some(repo()));
    }

    #[test]
    fn test_sync_with_remote() {
        let (mock, session) = setup();
        let path = format!("/repositories/deb/apt/{REPO}/sync/");
        mock.on(Method::Post, path.as_str()).respond(202, task_body());

        let remote = Identifier::decode(&format!("remotes-deb-apt-{PKG}")).unwrap();
        RepositoryApi::new(&session)
            .sync(&repo(), Some(&remote))
            .unwrap();

        let body = mock.matching(Method::Post, &path)[0].body.clone().unwrap();
        assert_eq!(body["remote"], format!("/pulp/api/v3/remotes/deb/apt/{PKG}/"));
    }

    #[test]
    fn test_publish_apt_uses_signing_label() {
        let (mock, session) = setup();
        mock.on(Method::Get, format!("/repositories/deb/apt/{REPO}/")).respond(
            200,
            json!({
                "pulp_href": format!("/pulp/api/v3/repositories/deb/apt/{REPO}/"),
                "pulp_labels": {"signing_service": "/pulp/api/v3/signing-services/abc/"},
            }),
        );
        mock.on(Method::Post, "/publications/deb/apt/")
            .respond(202, task_body());

        RepositoryApi::new(&session).publish(&repo()).unwrap();

        let body = mock.matching(Method::Post, "/publications/")[0]
            .body
            .clone()
            .unwrap();
        assert_eq!(body["structured"], true);
        assert_eq!(body["signing_service"], "/pulp/api/v3/signing-services/abc/");
        assert_eq!(body["repository"], format!("/pulp/api/v3/repositories/deb/apt/{REPO}/"));
    }

    #[test]
    fn test_publish_yum_skips_read() {
        let (mock, session) = setup();
        mock.on(Method::Post, "/publications/rpm/rpm/")
            .respond(202, task_body());

        let repo = Identifier::decode(&format!("repositories-rpm-rpm-{REPO}")).unwrap();
        RepositoryApi::new(&session).publish(&repo).unwrap();
        assert_eq!(mock.count(Method::Get, "/"), 0);
    }

    #[test]
    fn test_rejects_non_repositories() {
        let (mock, session) = setup();
        let pkg = Identifier::decode(&format!("content-deb-packages-{PKG}")).unwrap();
        let err = RepositoryApi::new(&session)
            .modify_content(&pkg, &[], &[])
            .unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedAction { .. }));
        assert!(mock.requests().is_empty());
    }
}
