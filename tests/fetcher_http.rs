//! HTTP fetcher tests against a local mock server
//!
//! Verifies that the reqwest-backed fetcher returns non-2xx statuses as
//! data, folds timeouts into the classifier vocabulary, and follows
//! redirects to the final URL.

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use leadflow::domain::gateways::{FailureKind, Fetcher};
use leadflow::infrastructure::config::HttpConfig;
use leadflow::infrastructure::http_fetcher::HttpFetcher;

fn config(timeout_seconds: u64) -> HttpConfig {
    HttpConfig {
        max_requests_per_second: 0, // no rate limiting in tests
        request_timeout_seconds: timeout_seconds,
        user_agent: "leadflow-tests/0.2".to_string(),
    }
}

#[tokio::test]
async fn successful_fetch_returns_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>ok</body></html>"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::from_config(&config(5)).expect("fetcher");
    let page = fetcher
        .fetch(&format!("{}/page", server.uri()))
        .await
        .expect("fetch succeeds");

    assert_eq!(page.status, 200);
    assert!(page.is_success());
    assert!(page.body.contains("ok"));
}

#[tokio::test]
async fn http_error_statuses_are_returned_as_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::from_config(&config(5)).expect("fetcher");
    let page = fetcher
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .expect("status is data, not an error");

    assert_eq!(page.status, 404);
    assert!(!page.is_success());
}

#[tokio::test]
async fn slow_responses_fold_into_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::from_config(&config(1)).expect("fetcher");
    let error = fetcher
        .fetch(&format!("{}/slow", server.uri()))
        .await
        .expect_err("times out");

    assert_eq!(error, FailureKind::Timeout { seconds: 1 });
}

#[tokio::test]
async fn redirects_are_followed_to_the_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/new", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::from_config(&config(5)).expect("fetcher");
    let page = fetcher
        .fetch(&format!("{}/old", server.uri()))
        .await
        .expect("fetch succeeds");

    assert_eq!(page.status, 200);
    assert!(page.final_url.ends_with("/new"));
    assert_eq!(page.body, "moved here");
}
