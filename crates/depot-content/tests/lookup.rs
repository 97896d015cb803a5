use std::sync::Arc;

use depot_content::{ContentError, PackageLookup, PackageQuery};
use depot_events::{CollectorSink, DepotEvent};
use depot_gateway::{mock::MockTransport, ApiResponse, Method, Session};
use depot_id::{Identifier, PackageType, RepoType, ResourceKind, Uuid};
use rstest::rstest;
use serde_json::{json, Value};

const API: &str = "/pulp/api/v3";
const PACKAGES: &str = "/content/deb/packages/";

struct Repo {
    mock: Arc<MockTransport>,
    id: Identifier,
    packages: Vec<Identifier>,
}

fn record(id: &Identifier, index: usize) -> Value {
    json!({
        "pulp_href": id.to_reference(API),
        "package": format!("pkg{index}"),
        "version": "1.0",
        "architecture": "amd64",
    })
}

/// An apt repository holding `size` deb packages, served in pages.
fn repo_with(size: usize) -> Repo {
    let mock = Arc::new(MockTransport::new());
    let id = Identifier::new(ResourceKind::Repository(RepoType::Apt), Uuid::new_v4()).unwrap();
    mock.on(Method::Get, id.to_reference("")).respond(
        200,
        json!({
            "pulp_href": id.to_reference(API),
            "latest_version_href": id.with_version(4).unwrap().to_reference(API),
        }),
    );

    let packages: Vec<Identifier> = (0..size)
        .map(|_| Identifier::new(ResourceKind::Package(PackageType::Deb), Uuid::new_v4()).unwrap())
        .collect();
    for (index, package) in packages.iter().enumerate() {
        mock.on(Method::Get, package.to_reference(""))
            .respond(200, record(package, index));
    }

    let all: Vec<Value> = packages
        .iter()
        .enumerate()
        .map(|(index, package)| record(package, index))
        .collect();
    mock.on(Method::Get, PACKAGES).handle(move |request| {
        let param = |key: &str| {
            request
                .query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        let matching: Vec<Value> = all
            .iter()
            .filter(|record| match param("package") {
                Some(name) => record["package"] == name.as_str(),
                None => true,
            })
            .cloned()
            .collect();
        let offset: usize = param("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
        let limit: usize = param("limit").and_then(|v| v.parse().ok()).unwrap_or(100);
        let results: Vec<Value> = matching.iter().skip(offset).take(limit).cloned().collect();
        ApiResponse::new(200, json!({"count": matching.len(), "results": results}))
    });

    Repo { mock, id, packages }
}

fn reads(mock: &MockTransport) -> usize {
    mock.matching(Method::Get, PACKAGES)
        .iter()
        .filter(|r| r.path != PACKAGES)
        .count()
}

fn lists(mock: &MockTransport) -> usize {
    mock.matching(Method::Get, PACKAGES)
        .iter()
        .filter(|r| r.path == PACKAGES)
        .count()
}

fn deb_query(index: usize) -> PackageQuery {
    PackageQuery::new([
        ("package", format!("pkg{index}")),
        ("version", "1.0".to_string()),
        ("architecture", "amd64".to_string()),
    ])
}

#[test]
fn few_ids_are_read_individually() {
    let repo = repo_with(15);
    let session = Session::with_transport(repo.mock.clone(), API);

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&repo.packages[..3], &[])
        .unwrap();

    assert_eq!(found.len(), 3);
    assert_eq!(reads(&repo.mock), 3);
    assert_eq!(lists(&repo.mock), 0);
}

#[test]
fn many_ids_drain_the_list_once() {
    let repo = repo_with(15);
    let session = Session::with_transport(repo.mock.clone(), API).with_page_size(10);

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&repo.packages[..12], &[])
        .unwrap();

    assert_eq!(found.len(), 12);
    assert_eq!(reads(&repo.mock), 0);
    assert_eq!(lists(&repo.mock), 2);

    let first = &repo.mock.matching(Method::Get, PACKAGES)[0];
    assert!(first.query.contains(&(
        "fields".to_string(),
        "package,version,architecture,pulp_href".to_string()
    )));
    assert!(first.query.contains(&(
        "repository_version".to_string(),
        repo.id.with_version(4).unwrap().to_reference(API)
    )));
}

#[rstest]
#[case(9, 9, 0)]
#[case(10, 0, 1)]
fn switches_to_scan_at_ten(
    #[case] requested: usize,
    #[case] expected_reads: usize,
    #[case] expected_lists: usize,
) {
    let repo = repo_with(15);
    let session = Session::with_transport(repo.mock.clone(), API);

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&repo.packages[..requested], &[])
        .unwrap();

    assert_eq!(found.len(), requested);
    assert_eq!(reads(&repo.mock), expected_reads);
    assert_eq!(lists(&repo.mock), expected_lists);
}

#[test]
fn nothing_requested_returns_everything() {
    let repo = repo_with(15);
    let session = Session::with_transport(repo.mock.clone(), API).with_page_size(4);

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&[], &[])
        .unwrap();

    assert_eq!(found.len(), 15);
    assert_eq!(lists(&repo.mock), 4);
    assert_eq!(found[14]["id"], repo.packages[14].to_string());
}

#[test]
fn few_queries_are_listed_individually() {
    let repo = repo_with(15);
    let session = Session::with_transport(repo.mock.clone(), API);

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&[], &[deb_query(2), deb_query(7)])
        .unwrap();

    assert_eq!(found.len(), 2);
    assert_eq!(found[1]["id"], repo.packages[7].to_string());
    assert_eq!(lists(&repo.mock), 2);
    assert_eq!(repo.mock.count(Method::Get, &repo.id.to_reference("")), 1);
}

#[test]
fn many_queries_match_locally() {
    let repo = repo_with(15);
    let session = Session::with_transport(repo.mock.clone(), API).with_page_size(100);
    let queries: Vec<PackageQuery> = (0..10).map(deb_query).collect();

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&[], &queries)
        .unwrap();

    assert_eq!(found.len(), 10);
    assert_eq!(lists(&repo.mock), 1);
}

#[test]
fn misses_are_reported_not_raised() {
    let repo = repo_with(15);
    let sink = Arc::new(CollectorSink::default());
    let session = Session::with_transport(repo.mock.clone(), API).with_events(sink.clone());

    let stranger =
        Identifier::new(ResourceKind::Package(PackageType::Deb), Uuid::new_v4()).unwrap();
    let mut ids = repo.packages[..11].to_vec();
    ids.push(stranger);

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&ids, &[])
        .unwrap();

    assert_eq!(found.len(), 11);
    assert_eq!(
        sink.events(),
        vec![DepotEvent::LookupMiss {
            repo: repo.id.to_string(),
            item: stranger.to_string(),
        }]
    );
}

#[test]
fn small_lookup_skips_unknown_id() {
    let repo = repo_with(3);
    let sink = Arc::new(CollectorSink::default());
    let session = Session::with_transport(repo.mock.clone(), API).with_events(sink.clone());
    let stranger =
        Identifier::new(ResourceKind::Package(PackageType::Deb), Uuid::new_v4()).unwrap();

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&[repo.packages[0], stranger], &[])
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(sink.len(), 1);
}

#[test]
fn small_lookup_treats_rejected_read_as_miss() {
    let repo = repo_with(3);
    let rejected =
        Identifier::new(ResourceKind::Package(PackageType::Deb), Uuid::new_v4()).unwrap();
    repo.mock
        .on(Method::Get, rejected.to_reference(""))
        .respond(400, json!({"detail": "Invalid uuid."}));
    let sink = Arc::new(CollectorSink::default());
    let session = Session::with_transport(repo.mock.clone(), API).with_events(sink.clone());

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&[rejected, repo.packages[1]], &[])
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(
        sink.events(),
        vec![DepotEvent::LookupMiss {
            repo: repo.id.to_string(),
            item: rejected.to_string(),
        }]
    );
}

#[test]
fn small_lookup_propagates_unauthorized_read() {
    let repo = repo_with(1);
    repo.mock
        .on(Method::Get, repo.packages[0].to_reference(""))
        .respond(403, json!({"detail": "Forbidden."}));
    let session = Session::with_transport(repo.mock.clone(), API);

    let err = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&repo.packages, &[])
        .unwrap_err();
    assert!(matches!(err, ContentError::Gateway(_)));
}

#[test]
fn scan_credits_a_record_to_both_id_and_query() {
    let repo = repo_with(15);
    let sink = Arc::new(CollectorSink::default());
    let session = Session::with_transport(repo.mock.clone(), API).with_events(sink.clone());

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&repo.packages[..9], &[deb_query(0), deb_query(10)])
        .unwrap();

    assert_eq!(found.len(), 10);
    assert!(sink.is_empty());
    assert_eq!(lists(&repo.mock), 1);
}

#[test]
fn scan_satisfies_repeated_queries() {
    let repo = repo_with(15);
    let sink = Arc::new(CollectorSink::default());
    let session = Session::with_transport(repo.mock.clone(), API).with_events(sink.clone());
    let mut queries: Vec<PackageQuery> = (0..9).map(deb_query).collect();
    queries.push(deb_query(3));

    let found = PackageLookup::new(&session, repo.id, PackageType::Deb)
        .lookup(&[], &queries)
        .unwrap();

    assert_eq!(found.len(), 9);
    assert!(sink.is_empty());
}

#[test]
fn ambiguous_query_is_skipped_in_lookup_but_raised_by_find_one() {
    let repo = repo_with(2);
    let extra = Identifier::new(ResourceKind::Package(PackageType::Deb), Uuid::new_v4()).unwrap();
    let duplicate = record(&extra, 0);
    let original = record(&repo.packages[0], 0);
    repo.mock
        .on(Method::Get, PACKAGES)
        .with_query("package", "pkg0")
        .respond(200, json!({"count": 2, "results": [original, duplicate]}));

    let sink = Arc::new(CollectorSink::default());
    let session = Session::with_transport(repo.mock.clone(), API).with_events(sink.clone());
    let lookup = PackageLookup::new(&session, repo.id, PackageType::Deb);

    let found = lookup.lookup(&[], &[deb_query(0)]).unwrap();
    assert!(found.is_empty());
    assert!(matches!(
        sink.events()[0],
        DepotEvent::LookupAmbiguous { count: 2, .. }
    ));

    let err = lookup.find_one(&deb_query(0)).unwrap_err();
    assert!(matches!(err, ContentError::AmbiguousMatch { count: 2, .. }));
}

#[test]
fn invalid_requests_fail_before_any_call() {
    let repo = repo_with(1);
    let session = Session::with_transport(repo.mock.clone(), API);
    let lookup = PackageLookup::new(&session, repo.id, PackageType::Deb);

    let partial = PackageQuery::new([("package", "pkg0")]);
    assert!(matches!(
        lookup.lookup(&[], &[partial]),
        Err(ContentError::InvalidQuery(_))
    ));

    let rpm = Identifier::new(ResourceKind::Package(PackageType::Rpm), Uuid::new_v4()).unwrap();
    assert!(matches!(
        lookup.lookup(&[rpm], &[]),
        Err(ContentError::InvalidQuery(_))
    ));
    assert!(repo.mock.requests().is_empty());
}
