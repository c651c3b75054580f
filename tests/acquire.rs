use std::time::Duration;

use tokio::time::Instant;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use textgrab::app::{Engine, NetworkError};
use textgrab::config::{Config, FetchConfig};
use textgrab::domain::{Confidence, Outcome, TierKind};
use textgrab::fetcher::{Fetcher, HttpFetcher};

#[path = "../src/document/fixtures.rs"]
mod fixtures;

use fixtures::pdf_with_lines;

const JOB_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Postdoc</title><script>var tracking = "ignored";</script></head>
<body>
  <nav>Home | Jobs</nav>
  <h1>Postdoctoral Researcher in Computational Biology</h1>
  <p>The Department of Genetics invites applications for a two-year postdoctoral position.
     Candidates should hold a PhD in bioinformatics or a related field.</p>
  <p>Applications close on 30 November.</p>
</body>
</html>"#;

fn config(cache: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.cache.root = Some(cache.to_path_buf());
    config.fetch.backoff_base_ms = 10;
    config
}

#[tokio::test]
async fn static_page_is_accepted_by_the_first_tier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/123"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(JOB_PAGE, "text/html; charset=utf-8"))
        .expect(1)
        .mount(&server)
        .await;
    let cache = tempfile::tempdir().unwrap();
    let engine = Engine::new(config(cache.path())).unwrap();

    let request = engine.request(&format!("{}/jobs/123", server.uri()), None).unwrap();
    let result = engine.fetch(request).await;

    assert_eq!(result.source_tier, Some(TierKind::Static));
    assert_eq!(result.confidence, Confidence::High);
    assert_eq!(result.tiers_tried(), vec![TierKind::Static]);
    assert!(result.text.contains("Postdoctoral Researcher"));
    assert!(result.text.contains("PhD in bioinformatics"));
    assert!(!result.text.contains("tracking"));
    assert!(!result.deadline_hit);
}

#[tokio::test]
async fn pdf_link_falls_through_to_the_document_tier() {
    let pdf = pdf_with_lines(&[
        "Research Fellow in Marine Ecology",
        "The institute offers a fully funded position for three years",
        "starting in spring, working on coastal ecosystem models.",
        "Applicants must hold a doctorate in ecology or oceanography.",
    ]);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/posting.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf, "application/pdf"))
        .expect(1)
        .mount(&server)
        .await;
    let cache = tempfile::tempdir().unwrap();
    let engine = Engine::new(config(cache.path())).unwrap();

    let request = engine
        .request(&format!("{}/files/posting.pdf", server.uri()), None)
        .unwrap();
    let result = engine.fetch(request).await;

    assert_eq!(result.source_tier, Some(TierKind::Document));
    assert_eq!(result.confidence, Confidence::Medium);
    assert_eq!(
        result.tiers_tried(),
        vec![TierKind::Static, TierKind::Rendered, TierKind::Document]
    );
    assert!(matches!(result.attempts[0].outcome, Outcome::Failure(_)));
    assert!(result.text.contains("Ecology"));
    assert!(!result.attempts[2].details.is_empty());
    // Per-request artifacts are gone once the result is returned
    assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let fetcher = HttpFetcher::new(FetchConfig::default()).unwrap();
    let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();

    let err = fetcher
        .get(&url, 3, Instant::now() + Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::Status { status: 404, .. }));
}

#[tokio::test]
async fn server_errors_use_the_whole_attempt_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    let fetcher = HttpFetcher::new(FetchConfig {
        backoff_base_ms: 10,
        ..Default::default()
    })
    .unwrap();
    let url = Url::parse(&format!("{}/flaky", server.uri())).unwrap();

    let err = fetcher
        .get(&url, 3, Instant::now() + Duration::from_secs(30))
        .await
        .unwrap_err();

    assert!(matches!(err, NetworkError::Status { status: 503, .. }));
}

#[tokio::test]
async fn retry_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<p>hello</p>", "text/html"))
        .mount(&server)
        .await;
    let fetcher = HttpFetcher::new(FetchConfig {
        backoff_base_ms: 10,
        ..Default::default()
    })
    .unwrap();
    let url = Url::parse(&format!("{}/page", server.uri())).unwrap();

    let download = fetcher
        .get(&url, 3, Instant::now() + Duration::from_secs(30))
        .await
        .unwrap();

    assert!(download.is_html());
    assert_eq!(download.bytes, b"<p>hello</p>");
}
