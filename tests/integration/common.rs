use au_crawler::crawler::{CrawlSpec, Crawler, CrawlerBuilder, DefinableUnit, HttpFetcher};
use au_crawler::permission::StatementPermissionChecker;
use au_crawler::rules::{CrawlRule, PatternAction};
use au_crawler::storage::ContentStore;
use au_crawler::AuState;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PERMISSION_PAGE: &str = "<html><body><p>LOCKSS system has permission to collect, \
    preserve, and serve this Archival Unit</p></body></html>";

/// Serves `body` at `route` with the given content type
pub async fn serve(server: &MockServer, route: &str, content_type: &str, body: impl Into<String>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body.into())
                .insert_header("content-type", content_type),
        )
        .mount(server)
        .await;
}

/// Paths requested from the server, in order
pub async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| r.url.path().to_string())
        .collect()
}

/// A unit rooted at the server that includes everything on it
pub fn unit_for(server: &MockServer, max_depth: u32) -> DefinableUnit {
    let base = server.uri();
    DefinableUnit::new("test-unit", max_depth)
        .with_start_urls([format!("{}/index.html", base)])
        .with_permission_urls([format!("{}/lockss.html", base)])
        .with_rule(
            CrawlRule::pattern(
                &format!("^{}/", regex::escape(&base)),
                PatternAction::MatchInclude,
                false,
            )
            .expect("Failed to compile rule"),
        )
}

pub fn crawler_for(unit: DefinableUnit, store: Arc<dyn ContentStore>) -> CrawlerBuilder {
    let spec = CrawlSpec::from_unit(&unit);
    Crawler::builder()
        .unit(Arc::new(unit))
        .spec(spec)
        .state(AuState::new("test-unit"))
        .fetcher(Arc::new(HttpFetcher::new(reqwest::Client::new())))
        .store(store)
        .daemon_checkers(vec![Arc::new(StatementPermissionChecker::lockss())])
}
