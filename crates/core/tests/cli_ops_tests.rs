use std::collections::HashMap;
use std::fs;

use httpmock::prelude::*;
use sourcemapper_core::{
    inline_map_url, run_all, run_extract, CLIError, DiskStorage, FetchError, FetchOptions, Fetcher, HttpFetcher,
    MemoryStorage,
};
use sourcemapper_core::storage::AssetStorage;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Serves fixed bodies without a network.
struct StaticFetcher(HashMap<String, String>);

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str, _accept: &str) -> Result<String, FetchError> {
        self.0.get(url).cloned().ok_or(FetchError::HttpStatus(404))
    }
}

#[tokio::test]
async fn extract_command_continues_after_failures() {
    let dir = tempdir().unwrap();
    let fetcher = StaticFetcher(HashMap::from([
        (
            "https://x.test/app.js.map".to_string(),
            r#"{"version":3,"sources":["src/app.js"],"sourcesContent":["app()"]}"#.to_string(),
        ),
        ("https://x.test/empty.js.map".to_string(), r#"{"version":3,"sources":[]}"#.to_string()),
    ]));
    let urls = vec![
        "https://x.test/missing.js.map".to_string(),
        "https://x.test/empty.js.map".to_string(),
        "https://x.test/app.js.map".to_string(),
    ];

    let report = run_extract(&fetcher, &urls, dir.path(), true, &CancellationToken::new()).await;

    assert_eq!(report.maps, 2);
    assert_eq!(report.extracted, 1);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(report.failures[0].1, CLIError::Fetch(FetchError::HttpStatus(404))));
    assert!(matches!(report.failures[1].1, CLIError::Extract(_)));
    assert!(!report.is_clean());
    assert_eq!(
        fs::read_to_string(dir.path().join("app.js").join("src").join("app.js")).unwrap(),
        "app()"
    );
}

#[tokio::test]
async fn extract_command_honours_cancellation() {
    let dir = tempdir().unwrap();
    let fetcher = StaticFetcher(HashMap::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run_extract(&fetcher, &["https://x.test/a.map".to_string()], dir.path(), false, &cancel).await;
    assert!(report.cancelled);
    assert_eq!(report.maps, 0);
    assert!(report.failures.is_empty());
}

#[tokio::test]
async fn page_scan_downloads_and_extracts_maps() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/p.html");
            then.status(200).body(
                r#"<html><head><link rel="stylesheet" href="site.css"></head>
                <body><script src="/app.js"></script><script src="/broken.js"></script></body></html>"#,
            );
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/app.js");
            then.status(200).body("run();\n//# sourceMappingURL=app.js.map\n");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/app.js.map");
            then.status(200)
                .body(r#"{"version":3,"sources":["../src/main.js"],"sourcesContent":["run()"]}"#);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/broken.js");
            then.status(500);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/site.css");
            then.status(200).body("body{margin:0}");
        })
        .await;

    let dir = tempdir().unwrap();
    let store = MemoryStorage::new();
    let fetcher = HttpFetcher::new(&FetchOptions { retries: 0, ..FetchOptions::default() }).unwrap();
    let page = server.url("/p.html");

    let report = run_all(&fetcher, &store, &page, dir.path(), true, false, &CancellationToken::new()).await;

    assert_eq!(report.maps, 1);
    assert_eq!(report.extracted, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].0.ends_with("/broken.js"));
    assert_eq!(
        fs::read_to_string(dir.path().join("extract").join("src").join("main.js")).unwrap(),
        "run()"
    );

    let stored: Vec<String> = ["/app.js", "/app.js.map", "/p.html", "/site.css"]
        .iter()
        .map(|p| server.url(*p))
        .collect();
    assert_eq!(store.urls().await, stored);
    let map_url = Url::parse(&server.url("/app.js.map")).unwrap();
    assert!(store.get(&map_url).await.unwrap().contains("sourcesContent"));
}

#[tokio::test]
async fn page_scan_without_extract_only_downloads() {
    let page = "https://x.test/index.html".to_string();
    let fetcher = StaticFetcher(HashMap::from([
        (page.clone(), r#"<script src="bundle.js"></script>"#.to_string()),
        (
            "https://x.test/bundle.js".to_string(),
            // {"version":3,"sources":["a.js"],"sourcesContent":["a"]}
            "x()\n//# sourceMappingURL=data:application/json;base64,eyJ2ZXJzaW9uIjozLCJzb3VyY2VzIjpbImEuanMiXSwic291cmNlc0NvbnRlbnQiOlsiYSJdfQ==".to_string(),
        ),
    ]));
    let dir = tempdir().unwrap();
    let store = MemoryStorage::new();

    let report = run_all(&fetcher, &store, &page, dir.path(), false, false, &CancellationToken::new()).await;

    assert!(report.is_clean());
    assert_eq!(report.maps, 1);
    assert_eq!(report.extracted, 0);
    assert!(!dir.path().join("extract").exists());
    let inline = Url::parse("https://x.test/bundle.js.map").unwrap();
    assert!(store.get(&inline).await.unwrap().contains("\"sources\""));
}

#[tokio::test]
async fn page_fetch_failure_ends_the_run() {
    let fetcher = StaticFetcher(HashMap::new());
    let dir = tempdir().unwrap();
    let store = MemoryStorage::new();

    let report = run_all(&fetcher, &store, "https://x.test/", dir.path(), true, false, &CancellationToken::new()).await;
    assert_eq!(report.failures.len(), 1);
    assert!(store.urls().await.is_empty());
}

// {"version":3,"sources":["a.js"],"sourcesContent":["a"]}
const INLINE_MAP: &str = "data:application/json;base64,eyJ2ZXJzaW9uIjozLCJzb3VyY2VzIjpbImEuanMiXSwic291cmNlc0NvbnRlbnQiOlsiYSJdfQ==";

#[test]
fn inline_map_url_drops_query_and_fragment() {
    let asset = Url::parse("https://x.test/js/bundle.js?v=1#top").unwrap();
    assert_eq!(inline_map_url(&asset).as_str(), "https://x.test/js/bundle.js.map");
}

#[tokio::test]
async fn inline_map_of_versioned_asset_keeps_both_files() {
    let page = "https://x.test/index.html".to_string();
    let bundle = format!("x()\n//# sourceMappingURL={INLINE_MAP}");
    let fetcher = StaticFetcher(HashMap::from([
        (page.clone(), r#"<script src="bundle.js?v=1"></script>"#.to_string()),
        ("https://x.test/bundle.js?v=1".to_string(), bundle.clone()),
    ]));
    let dir = tempdir().unwrap();
    let store = DiskStorage::new(dir.path());

    let report = run_all(&fetcher, &store, &page, dir.path(), true, true, &CancellationToken::new()).await;

    assert!(report.is_clean(), "{:?}", report.failures);
    assert_eq!(report.extracted, 1);
    assert_eq!(fs::read_to_string(dir.path().join("bundle.js")).unwrap(), bundle);
    assert!(fs::read_to_string(dir.path().join("bundle.js.map")).unwrap().contains("\"sources\""));
    assert_eq!(
        fs::read_to_string(dir.path().join("extract").join("bundle.js").join("a.js")).unwrap(),
        "a"
    );
}
