use std::sync::{Arc, Mutex};

use depot_content::{ContentError, ContentGraph, ContentManager, Result};
use depot_events::{CollectorSink, DepotEvent};
use depot_gateway::TaskRef;
use depot_id::{Identifier, PackageType, RepoType, ResourceKind, Uuid};

fn new_id(kind: ResourceKind) -> Identifier {
    Identifier::new(kind, Uuid::new_v4()).unwrap()
}

fn package() -> Identifier {
    new_id(ResourceKind::Package(PackageType::Deb))
}

fn apt_repo() -> Identifier {
    new_id(ResourceKind::Repository(RepoType::Apt))
}

/// In-memory release graph that records every call.
#[derive(Default)]
struct FakeGraph {
    releases: Vec<(Identifier, String)>,
    components: Vec<(Identifier, Identifier, String)>,
    architectures: Vec<(Identifier, Identifier, String)>,
    prcs: Mutex<Vec<(Identifier, Identifier, Identifier)>>,
    calls: Mutex<Vec<&'static str>>,
    submitted: Mutex<Vec<(Vec<Identifier>, Vec<Identifier>)>>,
}

impl FakeGraph {
    fn release(&mut self, name: &str) -> Identifier {
        let id = new_id(ResourceKind::Release);
        self.releases.push((id, name.to_string()));
        id
    }

    fn component(&mut self, release: Identifier, name: &str) -> Identifier {
        let id = new_id(ResourceKind::ReleaseComponent);
        self.components.push((release, id, name.to_string()));
        id
    }

    fn architecture(&mut self, release: Identifier, name: &str) -> Identifier {
        let id = new_id(ResourceKind::ReleaseArchitecture);
        self.architectures.push((release, id, name.to_string()));
        id
    }

    fn link(&self, package: Identifier, component: Identifier) -> Identifier {
        let prc = new_id(ResourceKind::PackageReleaseComponent);
        self.prcs.lock().unwrap().push((package, component, prc));
        prc
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn prc_count(&self) -> usize {
        self.prcs.lock().unwrap().len()
    }

    fn last_submission(&self) -> (Vec<Identifier>, Vec<Identifier>) {
        self.submitted.lock().unwrap().last().cloned().unwrap()
    }
}

impl ContentGraph for FakeGraph {
    fn release_ids(&self, _repo: &Identifier) -> Result<Vec<Identifier>> {
        self.record("release_ids");
        Ok(self.releases.iter().map(|(id, _)| *id).collect())
    }

    fn find_release(&self, _repo: &Identifier, name: &str) -> Result<Option<Identifier>> {
        self.record("find_release");
        Ok(self
            .releases
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| *id))
    }

    fn component_ids(&self, release: &Identifier, name: Option<&str>) -> Result<Vec<Identifier>> {
        self.record("component_ids");
        Ok(self
            .components
            .iter()
            .filter(|(r, _, n)| r == release && name.map_or(true, |name| name == n))
            .map(|(_, id, _)| *id)
            .collect())
    }

    fn architecture_ids(
        &self,
        release: &Identifier,
        name: Option<&str>,
    ) -> Result<Vec<Identifier>> {
        self.record("architecture_ids");
        Ok(self
            .architectures
            .iter()
            .filter(|(r, _, n)| r == release && name.map_or(true, |name| name == n))
            .map(|(_, id, _)| *id)
            .collect())
    }

    fn find_prc(&self, package: &Identifier, component: &Identifier) -> Result<Option<Identifier>> {
        self.record("find_prc");
        Ok(self
            .prcs
            .lock()
            .unwrap()
            .iter()
            .find(|(p, c, _)| p == package && c == component)
            .map(|(_, _, prc)| *prc))
    }

    fn find_or_create_prc(
        &self,
        package: &Identifier,
        component: &Identifier,
    ) -> Result<Identifier> {
        self.record("find_or_create_prc");
        let existing = self
            .prcs
            .lock()
            .unwrap()
            .iter()
            .find(|(p, c, _)| p == package && c == component)
            .map(|(_, _, prc)| *prc);
        Ok(existing.unwrap_or_else(|| self.link(*package, *component)))
    }

    fn release_packages(
        &self,
        _repo: &Identifier,
        release: &Identifier,
    ) -> Result<Vec<Identifier>> {
        self.record("release_packages");
        let components: Vec<Identifier> = self
            .components
            .iter()
            .filter(|(r, _, _)| r == release)
            .map(|(_, id, _)| *id)
            .collect();
        let mut packages = Vec::new();
        for (package, component, _) in self.prcs.lock().unwrap().iter() {
            if components.contains(component) && !packages.contains(package) {
                packages.push(*package);
            }
        }
        Ok(packages)
    }

    fn modify(
        &self,
        _repo: &Identifier,
        add: &[Identifier],
        remove: &[Identifier],
    ) -> Result<TaskRef> {
        self.record("modify");
        self.submitted
            .lock()
            .unwrap()
            .push((add.to_vec(), remove.to_vec()));
        Ok(TaskRef {
            task: new_id(ResourceKind::Task),
        })
    }
}

fn sorted(mut ids: Vec<Identifier>) -> Vec<String> {
    let mut out: Vec<String> = ids.drain(..).map(|id| id.to_string()).collect();
    out.sort();
    out
}

#[test]
fn non_apt_content_passes_straight_through() {
    for repo_type in [RepoType::Yum, RepoType::File, RepoType::Python] {
        let repo = new_id(ResourceKind::Repository(repo_type));
        let pkg_type = repo_type.primary_package_type();
        let add = vec![new_id(ResourceKind::Package(pkg_type))];
        let remove = vec![new_id(ResourceKind::Package(pkg_type))];

        let manager = ContentManager::with_graph(FakeGraph::default(), repo);
        manager.add_and_remove_packages(&add, &remove).unwrap();

        assert_eq!(manager.graph().calls(), vec!["modify"]);
        assert_eq!(manager.graph().last_submission(), (add, remove));
    }
}

#[test]
fn apt_add_without_release_is_rejected() {
    let manager = ContentManager::with_graph(FakeGraph::default(), apt_repo());
    let err = manager
        .add_and_remove_packages(&[package()], &[])
        .unwrap_err();

    assert!(matches!(err, ContentError::MissingRelease));
    assert_eq!(err.status_code(), 422);
    assert!(manager.graph().calls().is_empty());
}

#[test]
fn apt_remove_with_release_is_rejected() {
    let mut graph = FakeGraph::default();
    graph.release("jammy");
    let manager = ContentManager::with_graph(graph, apt_repo()).with_release("jammy");
    let err = manager
        .add_and_remove_packages(&[], &[package()])
        .unwrap_err();

    assert!(matches!(err, ContentError::UnsupportedOperation));
    assert!(manager.graph().calls().is_empty());
}

#[test]
fn apt_unknown_release_is_rejected_before_any_change() {
    let mut graph = FakeGraph::default();
    graph.release("jammy");
    let manager = ContentManager::with_graph(graph, apt_repo()).with_release("noble");
    let err = manager
        .add_and_remove_packages(&[package()], &[])
        .unwrap_err();

    assert!(matches!(err, ContentError::ReleaseNotFound { ref release } if release == "noble"));
    assert_eq!(err.to_string(), "Specified release not found!");
    assert_eq!(manager.graph().calls(), vec!["find_release"]);
}

#[test]
fn apt_add_links_package_into_release_components() {
    let mut graph = FakeGraph::default();
    let jammy = graph.release("jammy");
    let main = graph.component(jammy, "main");
    let other = graph.release("focal");
    graph.component(other, "main");

    let pkg = package();
    let manager = ContentManager::with_graph(graph, apt_repo()).with_release("jammy");
    let plan = manager.plan(&[pkg], &[]).unwrap();

    assert_eq!(plan.add.len(), 2);
    assert_eq!(plan.add[0], pkg);
    assert_eq!(plan.add[1].kind(), ResourceKind::PackageReleaseComponent);
    assert!(plan.remove.is_empty());
    assert!(!manager.graph().calls().contains(&"release_ids"));
    assert!(!manager.graph().calls().contains(&"find_prc"));
    assert!(manager.graph().find_prc(&pkg, &main).unwrap().is_some());
}

#[test]
fn apt_add_honours_component_filter() {
    let mut graph = FakeGraph::default();
    let jammy = graph.release("jammy");
    let main = graph.component(jammy, "main");
    let contrib = graph.component(jammy, "contrib");

    let pkg = package();
    let manager = ContentManager::with_graph(graph, apt_repo())
        .with_release("jammy")
        .with_component("main");
    manager.add_and_remove_packages(&[pkg], &[]).unwrap();

    let graph = manager.graph();
    assert!(graph.find_prc(&pkg, &main).unwrap().is_some());
    assert!(graph.find_prc(&pkg, &contrib).unwrap().is_none());
}

#[test]
fn apt_add_twice_reuses_link() {
    let mut graph = FakeGraph::default();
    let jammy = graph.release("jammy");
    graph.component(jammy, "main");

    let pkg = package();
    let manager = ContentManager::with_graph(graph, apt_repo()).with_release("jammy");
    let first = manager.plan(&[pkg], &[]).unwrap();
    let second = manager.plan(&[pkg], &[]).unwrap();

    assert_eq!(first, second);
    assert_eq!(manager.graph().prc_count(), 1);
}

#[test]
fn apt_remove_everywhere_purges_links_and_package() {
    let mut graph = FakeGraph::default();
    let r1 = graph.release("jammy");
    let a = graph.component(r1, "main");
    let r2 = graph.release("focal");
    let b = graph.component(r2, "contrib");

    let x = package();
    let prc1 = graph.link(x, a);
    let prc2 = graph.link(x, b);

    let manager = ContentManager::with_graph(graph, apt_repo());
    manager.add_and_remove_packages(&[], &[x]).unwrap();

    let (add, remove) = manager.graph().last_submission();
    assert!(add.is_empty());
    assert_eq!(sorted(remove), sorted(vec![prc1, prc2, x]));
}

#[test]
fn apt_remove_unlinked_package_is_safe() {
    let mut graph = FakeGraph::default();
    let r1 = graph.release("jammy");
    graph.component(r1, "main");

    let x = package();
    let manager = ContentManager::with_graph(graph, apt_repo());
    let plan = manager.plan(&[], &[x]).unwrap();
    assert_eq!(plan.remove, vec![x]);
    assert!(plan.retained.is_empty());
}

#[test]
fn removing_release_keeps_package_linked_elsewhere() {
    let mut graph = FakeGraph::default();
    let r1 = graph.release("jammy");
    let a = graph.component(r1, "main");
    let amd64 = graph.architecture(r1, "amd64");
    let r2 = graph.release("focal");
    let b = graph.component(r2, "main");

    let x = package();
    let only_here = package();
    let prc1 = graph.link(x, a);
    graph.link(x, b);
    let prc3 = graph.link(only_here, a);

    let manager = ContentManager::with_graph(graph, apt_repo());
    manager.remove_release(&r1).unwrap();

    let (add, remove) = manager.graph().last_submission();
    assert!(add.is_empty());
    assert!(!remove.contains(&x));
    assert_eq!(
        sorted(remove),
        sorted(vec![prc1, prc3, only_here, r1, a, amd64])
    );
}

#[test]
fn removing_release_rejects_other_identifiers() {
    let manager = ContentManager::with_graph(FakeGraph::default(), apt_repo());
    let err = manager.remove_release(&package()).unwrap_err();
    assert_eq!(err.status_code(), 422);
    assert!(manager.graph().calls().is_empty());
}

#[test]
fn submission_emits_plan_event() {
    let mut graph = FakeGraph::default();
    let jammy = graph.release("jammy");
    graph.component(jammy, "main");

    let sink = Arc::new(CollectorSink::default());
    let repo = apt_repo();
    let manager = ContentManager::with_graph(graph, repo)
        .with_release("jammy")
        .with_events(sink.clone());
    manager.add_and_remove_packages(&[package()], &[]).unwrap();

    assert_eq!(
        sink.events(),
        vec![DepotEvent::ReconcilePlanned {
            repo: repo.to_string(),
            release: Some("jammy".to_string()),
            add: 2,
            remove: 0,
            retained: 0,
        }]
    );
}
