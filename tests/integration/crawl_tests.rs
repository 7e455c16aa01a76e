//! End-to-end crawls over HTTP
//!
//! Each test serves a small site from a wiremock server and checks what the
//! crawler fetched, stored and reported.

use crate::common::{crawler_for, requested_paths, serve, unit_for, PERMISSION_PAGE};
use au_crawler::crawler::{CrawlStatusCode, START_URL_ERR_MSG};
use au_crawler::rules::{CrawlRule, PatternAction};
use au_crawler::storage::{ContentStore, MemoryStore, SqliteStore};
use au_crawler::CrawlPhase;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts a site with HTML, CSS and RealMedia children
///
/// ```text
/// index.html (0)
/// ├── level1.html (1) ── level2.html (2)
/// ├── style.css (1) ── images/bg.png (2)
/// ├── media/clip.ram (1) ── media/clip.rm (2)
/// ├── private/secret.html (excluded by rule)
/// └── elsewhere.invalid (excluded, other host)
/// ```
async fn mount_site(server: &MockServer) {
    let base = server.uri();

    serve(server, "/lockss.html", "text/html", PERMISSION_PAGE).await;
    serve(
        server,
        "/index.html",
        "text/html",
        r#"<html><head>
            <link rel="stylesheet" href="/style.css">
        </head><body>
            <a href="level1.html">Level 1</a>
            <a href="/media/clip.ram">Clip</a>
            <a href="/private/secret.html">Secret</a>
            <a href="http://elsewhere.invalid/page.html">Elsewhere</a>
        </body></html>"#,
    )
    .await;
    serve(
        server,
        "/level1.html",
        "text/html; charset=utf-8",
        r#"<a href="level2.html">Level 2</a><a href="index.html">Home</a>"#,
    )
    .await;
    serve(server, "/level2.html", "text/html", "<p>leaf</p>").await;
    serve(
        server,
        "/style.css",
        "text/css",
        r#"body { background: url("images/bg.png"); }"#,
    )
    .await;
    serve(server, "/images/bg.png", "image/png", "PNG").await;
    serve(
        server,
        "/media/clip.ram",
        "audio/x-pn-realaudio",
        format!("# clip\n{}/media/clip.rm?start=0\n", base),
    )
    .await;
    serve(server, "/media/clip.rm", "application/octet-stream", "RM").await;
}

#[tokio::test]
async fn test_full_crawl_follows_in_scope_links() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let base = server.uri();

    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = Arc::new(
        SqliteStore::new(&temp_dir.path().join("content.db")).expect("Failed to open store"),
    );

    let unit = unit_for(&server, 3).with_rule(CrawlRule::FirstMatch(vec![
        CrawlRule::pattern("/private/", PatternAction::MatchExclude, false).unwrap(),
        CrawlRule::pattern(
            &format!("^{}/", regex::escape(&base)),
            PatternAction::MatchInclude,
            false,
        )
        .unwrap(),
    ]));
    let mut crawler = crawler_for(unit, store.clone()).build().unwrap();

    let phase = crawler.do_crawl().await.unwrap();
    assert_eq!(phase, CrawlPhase::Success);

    for page in [
        "/lockss.html",
        "/index.html",
        "/level1.html",
        "/level2.html",
        "/style.css",
        "/images/bg.png",
        "/media/clip.ram",
        "/media/clip.rm",
    ] {
        let url = format!("{}{}", base, page);
        assert!(store.has_content("test-unit", &url).unwrap(), "{} not stored", url);
    }

    let requested = requested_paths(&server).await;
    assert!(!requested.contains(&"/private/secret.html".to_string()));
    assert_eq!(
        requested.iter().filter(|p| *p == "/index.html").count(),
        1,
        "index.html fetched more than once"
    );

    let status = crawler.status();
    assert!(status
        .urls_excluded()
        .contains_key(&format!("{}/private/secret.html", base)));
    assert!(status
        .urls_excluded()
        .contains_key("http://elsewhere.invalid/page.html"));
    assert_eq!(status.depth(), 2);
    assert!(status
        .urls_parsed()
        .contains(&format!("{}/style.css", base)));

    let state = store.load_au_state("test-unit").unwrap();
    assert_eq!(state.last_crawl_result, Some(CrawlPhase::Success));
    assert!(state.has_crawled());
}

#[tokio::test]
async fn test_depth_limit_stops_deep_links() {
    let server = MockServer::start().await;
    mount_site(&server).await;

    let mut crawler = crawler_for(unit_for(&server, 1), Arc::new(MemoryStore::new()))
        .build()
        .unwrap();

    let phase = crawler.do_crawl().await.unwrap();

    assert_eq!(phase, CrawlPhase::Error);
    assert_eq!(
        crawler.status().crawl_error_message(),
        "Site depth exceeds max crawl depth (1)"
    );

    let requested = requested_paths(&server).await;
    assert!(requested.contains(&"/level1.html".to_string()));
    assert!(!requested.contains(&"/level2.html".to_string()));
    assert!(!requested.contains(&"/images/bg.png".to_string()));
}

#[tokio::test]
async fn test_missing_permission_statement_fetches_nothing_else() {
    let server = MockServer::start().await;
    serve(&server, "/lockss.html", "text/html", "<html>Welcome</html>").await;
    serve(&server, "/index.html", "text/html", "<p>content</p>").await;

    let store = Arc::new(MemoryStore::new());
    let mut crawler = crawler_for(unit_for(&server, 3), store.clone())
        .build()
        .unwrap();

    let phase = crawler.do_crawl().await.unwrap();

    assert_eq!(phase, CrawlPhase::Error);
    assert_eq!(
        crawler.status().crawl_status(),
        CrawlStatusCode::NoPubPermission
    );
    assert_eq!(requested_paths(&server).await, vec!["/lockss.html"]);
    assert!(store.urls("test-unit").unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_start_url_fails_crawl() {
    let server = MockServer::start().await;
    serve(&server, "/lockss.html", "text/html", PERMISSION_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/index.html"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut crawler = crawler_for(unit_for(&server, 3), Arc::new(MemoryStore::new()))
        .build()
        .unwrap();

    let phase = crawler.do_crawl().await.unwrap();

    assert_eq!(phase, CrawlPhase::Error);
    assert_eq!(crawler.status().crawl_status(), CrawlStatusCode::FetchError);
    assert_eq!(crawler.status().crawl_error_message(), START_URL_ERR_MSG);
    assert_eq!(crawler.state().last_crawl_result, Some(CrawlPhase::Error));
    assert!(!crawler.state().has_crawled());
}
