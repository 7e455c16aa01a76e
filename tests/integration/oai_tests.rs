//! Crawls seeded from an OAI-PMH repository

use crate::common::{crawler_for, requested_paths, serve, unit_for, PERMISSION_PAGE};
use au_crawler::config::OaiConfig;
use au_crawler::crawler::{CrawlSpec, Crawler, DefinableUnit, HttpFetcher};
use au_crawler::permission::StatementPermissionChecker;
use au_crawler::storage::{ContentStore, MemoryStore};
use au_crawler::{AuState, CrawlPhase};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn list_records(urls: &[String], token: Option<&str>) -> String {
    let records: String = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                r#"<record>
                  <header><identifier>oai:test:{i}</identifier></header>
                  <metadata>
                    <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"
                               xmlns:dc="http://purl.org/dc/elements/1.1/">
                      <dc:identifier>{url}</dc:identifier>
                    </oai_dc:dc>
                  </metadata>
                </record>"#
            )
        })
        .collect();
    let token = token
        .map(|t| format!("<resumptionToken>{}</resumptionToken>", t))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2024-05-01T00:00:00Z</responseDate>
  <ListRecords>{records}{token}</ListRecords>
</OAI-PMH>"#
    )
}

fn oai_unit(server: &MockServer, follow_links: bool) -> DefinableUnit {
    unit_for(server, 3).with_oai(OaiConfig {
        base_url: format!("{}/oai", server.uri()),
        metadata_prefix: "oai_dc".to_string(),
        set: None,
        follow_links,
    })
}

async fn mount_articles(server: &MockServer) {
    serve(server, "/lockss.html", "text/html", PERMISSION_PAGE).await;
    for article in ["1", "2", "3"] {
        serve(
            server,
            &format!("/articles/{}.html", article),
            "text/html",
            r#"<a href="/articles/related.html">Related</a>"#,
        )
        .await;
    }
    serve(server, "/articles/related.html", "text/html", "<p>related</p>").await;
}

#[tokio::test]
async fn test_oai_harvest_seeds_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_articles(&server).await;

    Mock::given(method("GET"))
        .and(path("/oai"))
        .and(query_param("verb", "ListRecords"))
        .and(query_param("metadataPrefix", "oai_dc"))
        .and(query_param("from", "1970-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_records(
            &[
                format!("{}/articles/1.html", base),
                format!("{}/articles/2.html", base),
            ],
            Some("page-2"),
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/oai"))
        .and(query_param("resumptionToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_records(
            &[
                format!("{}/articles/3.html", base),
                format!("{}/articles/1.html", base),
            ],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut crawler = crawler_for(oai_unit(&server, false), store.clone())
        .build()
        .unwrap();

    let phase = crawler.do_crawl().await.unwrap();

    assert_eq!(phase, CrawlPhase::Success);
    for article in ["1", "2", "3"] {
        let url = format!("{}/articles/{}.html", base, article);
        assert!(store.has_content("test-unit", &url).unwrap(), "{} not stored", url);
    }

    let requested = requested_paths(&server).await;
    assert!(!requested.contains(&"/index.html".to_string()));
    assert!(!requested.contains(&"/articles/related.html".to_string()));
    assert_eq!(
        requested.iter().filter(|p| *p == "/articles/1.html").count(),
        1
    );
}

#[tokio::test]
async fn test_oai_follow_links_spiders_articles() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_articles(&server).await;

    Mock::given(method("GET"))
        .and(path("/oai"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_records(
            &[format!("{}/articles/1.html", base)],
            None,
        )))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let mut crawler = crawler_for(oai_unit(&server, true), store.clone())
        .build()
        .unwrap();

    assert_eq!(crawler.do_crawl().await.unwrap(), CrawlPhase::Success);
    assert!(store
        .has_content("test-unit", &format!("{}/articles/related.html", base))
        .unwrap());
}

#[tokio::test]
async fn test_oai_harvest_starts_after_last_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_articles(&server).await;

    Mock::given(method("GET"))
        .and(path("/oai"))
        .and(query_param("from", "2024-03-15"))
        .respond_with(ResponseTemplate::new(200).set_body_string(list_records(
            &[format!("{}/articles/2.html", base)],
            None,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut state = AuState::new("test-unit");
    state.last_crawl_time = Some(Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap());

    let unit = oai_unit(&server, false);
    let spec = CrawlSpec::from_unit(&unit);
    let mut crawler = Crawler::builder()
        .unit(Arc::new(unit))
        .spec(spec)
        .state(state)
        .fetcher(Arc::new(HttpFetcher::new(reqwest::Client::new())))
        .store(Arc::new(MemoryStore::new()))
        .daemon_checkers(vec![Arc::new(StatementPermissionChecker::lockss())])
        .build()
        .unwrap();

    assert_eq!(crawler.do_crawl().await.unwrap(), CrawlPhase::Success);
    assert!(crawler
        .status()
        .urls_fetched()
        .contains(&format!("{}/articles/2.html", base)));
}

#[tokio::test]
async fn test_oai_protocol_error_is_fetch_error() {
    let server = MockServer::start().await;
    serve(&server, "/lockss.html", "text/html", PERMISSION_PAGE).await;
    Mock::given(method("GET"))
        .and(path("/oai"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <error code="badArgument">Illegal date</error>
</OAI-PMH>"#,
        ))
        .mount(&server)
        .await;

    let mut crawler = crawler_for(oai_unit(&server, false), Arc::new(MemoryStore::new()))
        .build()
        .unwrap();

    let phase = crawler.do_crawl().await.unwrap();

    assert_eq!(phase, CrawlPhase::Error);
    assert_eq!(
        crawler.status().crawl_status(),
        au_crawler::crawler::CrawlStatusCode::FetchError
    );
    assert_eq!(requested_paths(&server).await, vec!["/lockss.html", "/oai"]);
}
