//! Wire-level tests of the top-level retry and streaming behavior.

use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use licitaradar_sdk::{CancelToken, SdkConfig, SdkError, SearchClient, SearchRequest};

fn fast_config(base_url: &str) -> SdkConfig {
    SdkConfig::new(base_url)
        .with_timeout(Duration::from_secs(5))
        .with_retry_backoff(vec![Duration::from_millis(20), Duration::from_millis(40)])
}

fn ok_body() -> serde_json::Value {
    serde_json::json!({
        "search_id": "7b1e9a44-31f0-4c8e-9a31-5a3a8a2f9d10",
        "status": "complete",
        "total": 3,
        "from_cache": false,
        "results": {"regions": {"SP": {"notices": []}}},
        "failed": {}
    })
}

#[tokio::test]
async fn two_gateway_failures_then_success_makes_exactly_three_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    let response = client
        .search(SearchRequest::new("pregão merenda"))
        .await
        .expect("third attempt succeeds");

    // Final state is the success, with no residual error.
    assert_eq!(response.total, 3);
    assert!(client.last_successful().is_some());
}

#[tokio::test]
async fn persistent_bad_gateway_stops_after_three_attempts_total() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    let error = client
        .search(SearchRequest::new("obras"))
        .await
        .expect_err("all attempts fail");

    match error {
        SdkError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 3);
            assert_eq!(source.status_code(), Some(502));
        }
        other => panic!("expected Exhausted, got {:?}", other),
    }
    assert!(client.last_successful().is_none());
}

#[tokio::test]
async fn auth_failures_are_not_retried_by_this_layer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    let error = client.search(SearchRequest::new("obras")).await.unwrap_err();

    match error {
        SdkError::Api { status, .. } => assert_eq!(status, 401),
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn rate_limit_responses_are_not_retried_by_this_layer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    let error = client.search(SearchRequest::new("obras")).await.unwrap_err();
    assert_eq!(error.status_code(), Some(429));
}

#[tokio::test]
async fn cancel_during_backoff_aborts_promptly() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let config = SdkConfig::new(server.uri())
        .with_timeout(Duration::from_secs(5))
        .with_retry_backoff(vec![Duration::from_secs(30)]);
    let client = SearchClient::new(config).unwrap();

    let cancel = CancelToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let error = client
        .search_with_cancel(SearchRequest::new("obras"), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(error, SdkError::Cancelled));
    // Nowhere near the 30s backoff.
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn force_fresh_reaches_the_wire_only_when_requested() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_partial_json(serde_json::json!({"force_fresh": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    client
        .search(SearchRequest::new("obras").fresh())
        .await
        .expect("refresh succeeds");
}

#[tokio::test]
async fn retries_never_add_force_fresh() {
    let server = MockServer::start().await;

    // Both the initial attempt and the retry must carry the original
    // force_fresh=false; a request with force_fresh=true matches nothing
    // and would fail the expectations.
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_partial_json(serde_json::json!({"force_fresh": false})))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .and(body_partial_json(serde_json::json!({"force_fresh": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    client
        .search(SearchRequest::new("obras"))
        .await
        .expect("retry succeeds");
}

#[tokio::test]
async fn event_stream_parses_the_feed() {
    let server = MockServer::start().await;
    let search_id = "7b1e9a44-31f0-4c8e-9a31-5a3a8a2f9d10";

    let body = concat!(
        "event: uf_status\n",
        "data: {\"type\":\"uf_status\",\"uf\":\"SP\",\"status\":\"fetching\"}\n",
        "\n",
        "event: uf_status\n",
        "data: {\"type\":\"uf_status\",\"uf\":\"SP\",\"status\":\"success\",\"count\":7}\n",
        "\n",
        "event: complete\n",
        "data: {\"type\":\"complete\",\"total\":7,\"succeeded\":1,\"failed\":0,\"from_cache\":false}\n",
        "\n",
    );

    Mock::given(method("GET"))
        .and(path(format!("/api/search/{}/events", search_id)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    let id = licitaradar_core::SearchId::from_uuid(search_id.parse().unwrap());
    let mut stream = client.subscribe(id).await.expect("stream connects");

    let mut events = Vec::new();
    while let Some(event) = stream.next_event().await {
        events.push(event.expect("well-formed event"));
    }

    assert_eq!(events.len(), 3);
    assert!(events.last().unwrap().is_complete());
}

#[tokio::test]
async fn unreachable_stream_maps_to_stream_unavailable() {
    let server = MockServer::start().await;
    // No mock mounted: the endpoint answers 404.

    let client = SearchClient::new(fast_config(&server.uri())).unwrap();
    let error = client
        .subscribe(licitaradar_core::SearchId::new())
        .await
        .unwrap_err();

    assert!(matches!(error, SdkError::StreamUnavailable(_)));
}
