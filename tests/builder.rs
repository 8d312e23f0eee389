use filemaster::{
    ArchiveBuilder, BuildState, BuildStatus, CatalogEntry, ExportConfig, ExportError,
    FailurePolicy, ShopContext,
};
use std::collections::BTreeSet;
use std::io::{Cursor, Read};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn acme() -> ShopContext {
    ShopContext {
        id: "gid://shopify/Shop/1".to_string(),
        name: "Acme".to_string(),
        email: Some("owner@acme.test".to_string()),
        myshopify_domain: "acme.myshopify.com".to_string(),
    }
}

/// Image, external video and PDF, in that order.
fn three_entries(server: &MockServer) -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::Image {
            id: "gid://shopify/MediaImage/1".to_string(),
            url: Some(format!("{}/cdn/a.jpg?v=1700000000", server.uri())),
            alt: None,
        },
        CatalogEntry::ExternalVideo {
            id: "gid://shopify/ExternalVideo/2".to_string(),
            embed_url: Some(format!("{}/y", server.uri())),
            alt: None,
        },
        CatalogEntry::GenericFile {
            id: "gid://shopify/GenericFile/3".to_string(),
            url: Some(format!("{}/cdn/doc.pdf", server.uri())),
            alt: None,
            mime_type: Some("application/pdf".to_string()),
        },
    ]
}

async fn serve(server: &MockServer, route: &str, status: u16, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
        .mount(server)
        .await;
}

fn builder(policy: FailurePolicy) -> ArchiveBuilder {
    ArchiveBuilder::new(&ExportConfig {
        failure_policy: policy,
        ..ExportConfig::default()
    })
}

fn file_names(bytes: &[u8]) -> BTreeSet<String> {
    let archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    archive
        .file_names()
        .filter(|n| !n.ends_with('/'))
        .map(str::to_string)
        .collect()
}

fn read_file(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut content = Vec::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn test_three_entry_scenario() {
    let server = MockServer::start().await;
    serve(&server, "/cdn/a.jpg", 200, b"jpeg").await;
    serve(&server, "/y", 200, b"<html>embed</html>").await;
    serve(&server, "/cdn/doc.pdf", 200, b"%PDF-1.7").await;

    let mut seen: Vec<BuildState> = Vec::new();
    let report = builder(FailurePolicy::Isolate)
        .build(&acme(), &three_entries(&server), |state| {
            assert!(state.settled() <= state.total);
            seen.push(state.clone());
        })
        .await
        .unwrap();

    assert_eq!(report.archive.file_name, "Acme-media.zip");
    assert_eq!(
        file_names(&report.archive.bytes),
        BTreeSet::from([
            "Acme_File-Master/images/a.jpg".to_string(),
            "Acme_File-Master/files/Acme_external_1.url".to_string(),
            "Acme_File-Master/files/doc.pdf".to_string(),
        ])
    );
    assert_eq!(
        read_file(&report.archive.bytes, "Acme_File-Master/files/doc.pdf"),
        b"%PDF-1.7"
    );

    let percents: Vec<u8> = seen
        .iter()
        .filter(|s| s.status == BuildStatus::Fetching)
        .map(BuildState::percent)
        .collect();
    assert_eq!(percents, vec![33, 67, 100]);

    let last = seen.last().unwrap();
    assert_eq!(last.status, BuildStatus::Succeeded);
    assert_eq!(last.completed, 3);
    assert_eq!(report.state, *last);
    assert!(report.is_complete());
    assert!(report.gaps.is_empty());
}

#[tokio::test]
async fn test_failed_fetch_is_isolated() {
    let server = MockServer::start().await;
    serve(&server, "/cdn/a.jpg", 200, b"jpeg").await;
    serve(&server, "/y", 404, b"").await;
    serve(&server, "/cdn/doc.pdf", 200, b"%PDF-1.7").await;

    let mut statuses = Vec::new();
    let report = builder(FailurePolicy::Isolate)
        .build(&acme(), &three_entries(&server), |state| {
            statuses.push(state.status)
        })
        .await
        .unwrap();

    assert_eq!(
        file_names(&report.archive.bytes),
        BTreeSet::from([
            "Acme_File-Master/images/a.jpg".to_string(),
            "Acme_File-Master/files/doc.pdf".to_string(),
        ])
    );
    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].task.index, 1);
    assert!(report.failures[0].reason.contains("404"));
    assert_eq!(report.state.completed, 2);
    assert_eq!(report.state.failed, 1);
    assert_eq!(report.state.percent(), 100);
    assert_eq!(statuses.last(), Some(&BuildStatus::Succeeded));
}

#[tokio::test]
async fn test_failed_fetch_aborts_under_abort_policy() {
    let server = MockServer::start().await;
    serve(&server, "/cdn/a.jpg", 200, b"jpeg").await;
    serve(&server, "/y", 200, b"embed").await;
    serve(&server, "/cdn/doc.pdf", 404, b"").await;

    let mut last = None;
    let result = builder(FailurePolicy::Abort)
        .build(&acme(), &three_entries(&server), |state| {
            last = Some(state.clone())
        })
        .await;

    match result {
        Err(ExportError::AssetFetch { url, reason }) => {
            assert!(url.ends_with("/cdn/doc.pdf"));
            assert!(reason.contains("404"));
        }
        other => panic!("expected an asset fetch error, got {:?}", other.map(|r| r.state)),
    }

    let last = last.unwrap();
    assert_eq!(last.status, BuildStatus::Failed);
    assert_eq!(last.failed, 1);
    assert!(last.completed < last.total);
}

#[tokio::test]
async fn test_rebuild_yields_same_file_set() {
    let server = MockServer::start().await;
    serve(&server, "/cdn/a.jpg", 200, b"jpeg").await;
    serve(&server, "/y", 200, b"embed").await;
    serve(&server, "/cdn/doc.pdf", 200, b"%PDF-1.7").await;

    let entries = three_entries(&server);
    let builder = builder(FailurePolicy::Isolate);

    let first = builder.build(&acme(), &entries, |_| {}).await.unwrap();
    let second = builder.build(&acme(), &entries, |_| {}).await.unwrap();

    assert_eq!(
        file_names(&first.archive.bytes),
        file_names(&second.archive.bytes)
    );
}

#[tokio::test]
async fn test_capped_concurrency_limits_fetches_in_flight() {
    let server = MockServer::start().await;
    let delay = Duration::from_millis(150);
    let mut entries = Vec::new();
    for n in 0..6 {
        let route = format!("/cdn/{}.png", n);
        Mock::given(method("GET"))
            .and(path(route.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![n as u8; 16])
                    .set_delay(delay),
            )
            .expect(1)
            .mount(&server)
            .await;
        entries.push(CatalogEntry::Model {
            id: format!("gid://shopify/Model3d/{}", n),
            preview_url: Some(format!("{}{}", server.uri(), route)),
            alt: None,
        });
    }

    let builder = ArchiveBuilder::new(&ExportConfig {
        max_concurrent_downloads: Some(2),
        ..ExportConfig::default()
    });
    let started = Instant::now();
    let report = builder.build(&acme(), &entries, |_| {}).await.unwrap();
    let elapsed = started.elapsed();

    // Six delayed responses two at a time take at least three rounds.
    assert!(elapsed >= delay * 3, "finished in {:?}", elapsed);
    assert_eq!(report.state.completed, 6);
    assert_eq!(file_names(&report.archive.bytes).len(), 6);
    assert!(report
        .entries
        .iter()
        .all(|p| p.starts_with("Acme_File-Master/images/")));
}

#[tokio::test]
async fn test_skipped_entries_do_not_count_toward_total() {
    let server = MockServer::start().await;
    serve(&server, "/cdn/a.jpg", 200, b"jpeg").await;

    let entries = vec![
        CatalogEntry::Unsupported,
        CatalogEntry::Image {
            id: "gid://shopify/MediaImage/1".to_string(),
            url: Some(format!("{}/cdn/a.jpg", server.uri())),
            alt: None,
        },
        CatalogEntry::GenericFile {
            id: "gid://shopify/GenericFile/2".to_string(),
            url: None,
            alt: None,
            mime_type: None,
        },
    ];

    let mut percents = Vec::new();
    let report = builder(FailurePolicy::Isolate)
        .build(&acme(), &entries, |state| percents.push(state.percent()))
        .await
        .unwrap();

    assert_eq!(report.state.total, 1);
    assert_eq!(report.gaps.len(), 2);
    assert_eq!(percents, vec![100, 100]);
}

#[tokio::test]
async fn test_repeated_names_are_kept_apart() {
    let server = MockServer::start().await;
    serve(&server, "/one/logo.png", 200, b"first").await;
    serve(&server, "/two/logo.png", 200, b"second").await;

    let entries: Vec<CatalogEntry> = ["one", "two"]
        .iter()
        .map(|dir| CatalogEntry::Image {
            id: format!("gid://shopify/MediaImage/{}", dir),
            url: Some(format!("{}/{}/logo.png", server.uri(), dir)),
            alt: None,
        })
        .collect();

    let report = builder(FailurePolicy::Isolate)
        .build(&acme(), &entries, |_| {})
        .await
        .unwrap();

    assert_eq!(
        file_names(&report.archive.bytes),
        BTreeSet::from([
            "Acme_File-Master/images/logo.png".to_string(),
            "Acme_File-Master/images/logo (1).png".to_string(),
        ])
    );
}
