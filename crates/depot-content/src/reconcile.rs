//! Adding packages to and removing packages from repositories.
//!
//! Yum, python and file repositories hold packages directly, so their
//! changes go to the backend untouched. Apt repositories subdivide content
//! into releases and components: a package is in a release's component only
//! while a package release component (PRC) links the two. Adding a package
//! therefore also adds its PRCs, and removing one removes its PRCs and, once
//! no release references it any more, the package itself.

use std::sync::Arc;

use depot_events::{DepotEvent, EventSinkHandle, NullSink};
use depot_gateway::{
    api::id_field, GatewayError, PackageReleaseComponentApi, ReleaseApi, ReleaseArchitectureApi,
    ReleaseComponentApi, ReleaseFilter, RepositoryApi, Session, TaskRef,
};
use depot_id::{Identifier, PackageType, RepoType, ResourceKind};
use tracing::{debug, info};

use crate::{
    error::{ContentError, Result},
    lookup::PackageLookup,
};

/// The reads and writes reconciliation needs from the content store.
pub trait ContentGraph {
    /// Every release in the latest version of `repo`.
    fn release_ids(&self, repo: &Identifier) -> Result<Vec<Identifier>>;

    /// The release of `repo` whose distribution is `name`.
    fn find_release(&self, repo: &Identifier, name: &str) -> Result<Option<Identifier>>;

    fn component_ids(&self, release: &Identifier, name: Option<&str>) -> Result<Vec<Identifier>>;

    fn architecture_ids(&self, release: &Identifier, name: Option<&str>)
        -> Result<Vec<Identifier>>;

    fn find_prc(&self, package: &Identifier, component: &Identifier) -> Result<Option<Identifier>>;

    fn find_or_create_prc(&self, package: &Identifier, component: &Identifier)
        -> Result<Identifier>;

    /// Every deb and deb_src package linked into `release` within `repo`.
    fn release_packages(&self, repo: &Identifier, release: &Identifier)
        -> Result<Vec<Identifier>>;

    /// Submits one content change to `repo`.
    fn modify(&self, repo: &Identifier, add: &[Identifier], remove: &[Identifier])
        -> Result<TaskRef>;
}

/// [`ContentGraph`] backed by the gateway.
pub struct GatewayGraph<'s> {
    session: &'s Session,
}

impl<'s> GatewayGraph<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }
}

impl ContentGraph for GatewayGraph<'_> {
    fn release_ids(&self, repo: &Identifier) -> Result<Vec<Identifier>> {
        let filter = ReleaseFilter {
            repository: Some(*repo),
            ..Default::default()
        };
        Ok(ReleaseApi::new(self.session).ids(&filter)?)
    }

    fn find_release(&self, repo: &Identifier, name: &str) -> Result<Option<Identifier>> {
        Ok(ReleaseApi::new(self.session).find(repo, name)?)
    }

    fn component_ids(&self, release: &Identifier, name: Option<&str>) -> Result<Vec<Identifier>> {
        Ok(ReleaseComponentApi::new(self.session).list(release, name)?)
    }

    fn architecture_ids(
        &self,
        release: &Identifier,
        name: Option<&str>,
    ) -> Result<Vec<Identifier>> {
        Ok(ReleaseArchitectureApi::new(self.session).list(release, name)?)
    }

    fn find_prc(&self, package: &Identifier, component: &Identifier) -> Result<Option<Identifier>> {
        Ok(PackageReleaseComponentApi::new(self.session).find(package, component)?)
    }

    fn find_or_create_prc(
        &self,
        package: &Identifier,
        component: &Identifier,
    ) -> Result<Identifier> {
        Ok(PackageReleaseComponentApi::new(self.session).find_or_create(package, component)?)
    }

    fn release_packages(
        &self,
        repo: &Identifier,
        release: &Identifier,
    ) -> Result<Vec<Identifier>> {
        let mut ids = Vec::new();
        for package_type in [PackageType::Deb, PackageType::DebSrc] {
            let records = PackageLookup::new(self.session, *repo, package_type)
                .with_release(*release)
                .lookup(&[], &[])?;
            for record in &records {
                ids.push(id_field(record, "id")?);
            }
        }
        Ok(ids)
    }

    fn modify(
        &self,
        repo: &Identifier,
        add: &[Identifier],
        remove: &[Identifier],
    ) -> Result<TaskRef> {
        Ok(RepositoryApi::new(self.session).modify_content(repo, add, remove)?)
    }
}

/// Content sets computed for one change, before submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPlan {
    pub add: Vec<Identifier>,
    pub remove: Vec<Identifier>,
    /// Packages asked to be removed that another release still links, so
    /// only their PRCs are removed.
    pub retained: Vec<Identifier>,
}

/// Computes and submits content changes for one repository.
///
/// `release`, `component` and `architecture` narrow an apt change the
/// same way for every call on this manager.
pub struct ContentManager<G> {
    graph: G,
    repo: Identifier,
    release: Option<String>,
    component: Option<String>,
    architecture: Option<String>,
    events: EventSinkHandle,
}

impl<'s> ContentManager<GatewayGraph<'s>> {
    pub fn new(session: &'s Session, repo: Identifier) -> Self {
        Self::with_graph(GatewayGraph::new(session), repo).with_events(session.events().clone())
    }
}

impl<G: ContentGraph> ContentManager<G> {
    pub fn with_graph(graph: G, repo: Identifier) -> Self {
        Self {
            graph,
            repo,
            release: None,
            component: None,
            architecture: None,
            events: Arc::new(NullSink),
        }
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = Some(architecture.into());
        self
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    fn repo_type(&self) -> Result<RepoType> {
        match self.repo.kind() {
            ResourceKind::Repository(repo_type) => Ok(repo_type),
            _ => Err(GatewayError::UnsupportedAction {
                action: "modify the content of",
                kind: self.repo.to_string(),
            }
            .into()),
        }
    }

    /// Works out the content sets for adding `add` and removing `remove`.
    ///
    /// Every policy check runs before the first backend call. Adding to an
    /// apt repository needs a release; removing from a single release is
    /// refused, so remove from the whole repository and add the packages
    /// back to the releases that should keep them.
    pub fn plan(&self, add: &[Identifier], remove: &[Identifier]) -> Result<ContentPlan> {
        if !self.repo_type()?.has_releases() {
            return Ok(ContentPlan {
                add: add.to_vec(),
                remove: remove.to_vec(),
                retained: Vec::new(),
            });
        }

        if !add.is_empty() && self.release.is_none() {
            return Err(ContentError::MissingRelease);
        }
        if !remove.is_empty() && self.release.is_some() {
            return Err(ContentError::UnsupportedOperation);
        }

        let target = match &self.release {
            Some(name) => Some(self.graph.find_release(&self.repo, name)?.ok_or_else(|| {
                ContentError::ReleaseNotFound {
                    release: name.clone(),
                }
            })?),
            None => None,
        };

        self.compute(add, remove, target.as_ref())
    }

    /// Plans the change and submits it in one modify call.
    pub fn add_and_remove_packages(
        &self,
        add: &[Identifier],
        remove: &[Identifier],
    ) -> Result<TaskRef> {
        let plan = self.plan(add, remove)?;
        self.submit(&plan)
    }

    /// Removes a release with every package in it.
    ///
    /// Packages another release still links keep their content unit; only
    /// their PRCs in this release go. The release itself goes along with
    /// its components and architectures.
    pub fn remove_release(&self, release: &Identifier) -> Result<TaskRef> {
        if !self.repo_type()?.has_releases() || release.kind() != ResourceKind::Release {
            return Err(GatewayError::UnsupportedAction {
                action: "remove release",
                kind: release.to_string(),
            }
            .into());
        }

        let packages = self.graph.release_packages(&self.repo, release)?;
        let mut plan = self.compute(&[], &packages, Some(release))?;

        push_unique(&mut plan.remove, *release);
        for component in self.graph.component_ids(release, self.component.as_deref())? {
            push_unique(&mut plan.remove, component);
        }
        for architecture in self
            .graph
            .architecture_ids(release, self.architecture.as_deref())?
        {
            push_unique(&mut plan.remove, architecture);
        }

        self.submit(&plan)
    }

    /// Walks the release graph. With a target release, additions link into
    /// its components and removals unlink only there; without one, removals
    /// unlink everywhere.
    fn compute(
        &self,
        add: &[Identifier],
        remove: &[Identifier],
        target: Option<&Identifier>,
    ) -> Result<ContentPlan> {
        let mut plan = ContentPlan::default();
        for package in add {
            push_unique(&mut plan.add, *package);
        }

        let releases = match target {
            Some(target) if remove.is_empty() => vec![*target],
            _ => self.graph.release_ids(&self.repo)?,
        };

        for release in &releases {
            let is_target = target == Some(release);
            for component in self
                .graph
                .component_ids(release, self.component.as_deref())?
            {
                if is_target {
                    for package in add {
                        let prc = self.graph.find_or_create_prc(package, &component)?;
                        push_unique(&mut plan.add, prc);
                    }
                }

                for package in remove {
                    let Some(prc) = self.graph.find_prc(package, &component)? else {
                        continue;
                    };
                    if target.is_none() || is_target {
                        push_unique(&mut plan.remove, prc);
                    } else {
                        debug!(package = %package, release = %release, "package still linked");
                        push_unique(&mut plan.retained, *package);
                    }
                }
            }
        }

        for package in remove {
            if !plan.retained.contains(package) {
                push_unique(&mut plan.remove, *package);
            }
        }
        Ok(plan)
    }

    fn submit(&self, plan: &ContentPlan) -> Result<TaskRef> {
        info!(
            repo = %self.repo,
            add = plan.add.len(),
            remove = plan.remove.len(),
            retained = plan.retained.len(),
            "submitting content change"
        );
        self.events.emit(DepotEvent::ReconcilePlanned {
            repo: self.repo.to_string(),
            release: self.release.clone(),
            add: plan.add.len(),
            remove: plan.remove.len(),
            retained: plan.retained.len(),
        });
        self.graph.modify(&self.repo, &plan.add, &plan.remove)
    }
}

fn push_unique(set: &mut Vec<Identifier>, id: Identifier) {
    if !set.contains(&id) {
        set.push(id);
    }
}
