//! Integration tests for `YoutubeClient` and `YoutubeSource` using wiremock HTTP mocks.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use viewtrend_core::{MetricSource, ScopeConfig, SourceError};
use viewtrend_youtube::{YoutubeClient, YoutubeError, YoutubeSource};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> YoutubeClient {
    YoutubeClient::with_base_url("test-key", 30, base_url)
        .expect("client construction should not fail")
        .with_retry(2, 0)
}

fn video_json(id: &str, views: Option<&str>, duration: &str) -> serde_json::Value {
    let mut statistics = serde_json::Map::new();
    if let Some(v) = views {
        statistics.insert("viewCount".to_owned(), serde_json::json!(v));
    }
    serde_json::json!({
        "kind": "youtube#video",
        "id": id,
        "snippet": {
            "title": format!("Video {id}"),
            "channelTitle": "Some Channel",
            "publishedAt": "2026-10-01T12:00:00Z",
            "thumbnails": {
                "default": { "url": format!("https://i.ytimg.com/vi/{id}/default.jpg") },
                "medium": { "url": format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg") }
            }
        },
        "statistics": statistics,
        "contentDetails": { "duration": duration }
    })
}

fn list(items: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({ "kind": "youtube#videoListResponse", "items": items })
}

fn search_list(ids: &[&str]) -> serde_json::Value {
    let items: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({ "id": { "kind": "youtube#video", "videoId": id } }))
        .collect();
    serde_json::json!({ "kind": "youtube#searchListResponse", "items": items })
}

async fn mount_trending(server: &MockServer, region: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("chart", "mostPopular"))
        .and(query_param("regionCode", region))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(server)
        .await;
}

fn scope(name: &str, regions: &[&str], limit: u32) -> ScopeConfig {
    ScopeConfig {
        name: name.to_owned(),
        regions: regions.iter().map(|r| (*r).to_owned()).collect(),
        keyword: None,
        limit,
        shorts: None,
        published_within_days: None,
    }
}

#[tokio::test]
async fn most_popular_returns_parsed_videos() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("part", "snippet,statistics,contentDetails"))
        .and(query_param("chart", "mostPopular"))
        .and(query_param("regionCode", "KR"))
        .and(query_param("maxResults", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
            video_json("a", Some("1000"), "PT3M"),
            video_json("b", None, "PT30S"),
        ])))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let videos = client.most_popular("KR", 200).await.expect("should parse");

    assert_eq!(videos.len(), 2);
    let first = videos[0].to_observation();
    assert_eq!(first.id, "a");
    assert_eq!(first.metric, 1000);
    assert_eq!(first.channel, "Some Channel");
    assert_eq!(
        first.thumbnail.as_deref(),
        Some("https://i.ytimg.com/vi/a/mqdefault.jpg")
    );
    assert_eq!(videos[1].view_count(), 0, "missing viewCount parses as 0");
    assert_eq!(videos[1].duration_secs(), Some(30));
}

#[tokio::test]
async fn quota_exceeded_is_surfaced_without_retry() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "error": {
            "code": 403,
            "message": "The request cannot be completed because you have exceeded your quota.",
            "errors": [{ "domain": "youtube.quota", "reason": "quotaExceeded" }]
        }
    });
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(403).set_body_json(&body))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.most_popular("KR", 10).await.unwrap_err();

    assert!(matches!(err, YoutubeError::QuotaExceeded(_)), "{err:?}");
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_trending(&server, "KR", list(vec![video_json("a", Some("5"), "PT1M")])).await;

    let client = test_client(&server.uri());
    let videos = client.most_popular("KR", 10).await.expect("third attempt succeeds");

    assert_eq!(videos.len(), 1);
}

#[tokio::test]
async fn error_messages_do_not_leak_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = YoutubeClient::with_base_url("secret-key-123", 30, &server.uri())
        .unwrap()
        .with_retry(0, 0);
    let err = client.most_popular("KR", 10).await.unwrap_err();

    assert!(matches!(err, YoutubeError::Http(_)));
    assert!(!err.to_string().contains("secret-key-123"), "{err}");
}

#[tokio::test]
async fn videos_by_id_chunks_requests_at_fifty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![video_json(
            "x",
            Some("1"),
            "PT1M",
        )])))
        .expect(2)
        .mount(&server)
        .await;

    let ids: Vec<String> = (0..75).map(|i| format!("id{i}")).collect();
    let client = test_client(&server.uri());
    let videos = client.videos_by_id(&ids).await.expect("should fetch");

    assert_eq!(videos.len(), 2, "one item per mocked page");
}

#[tokio::test]
async fn source_merges_regions_by_view_count() {
    let server = MockServer::start().await;
    mount_trending(
        &server,
        "US",
        list(vec![
            video_json("shared", Some("900"), "PT5M"),
            video_json("us-only", Some("100"), "PT5M"),
        ]),
    )
    .await;
    mount_trending(
        &server,
        "JP",
        list(vec![
            video_json("jp-only", Some("500"), "PT5M"),
            video_json("shared", Some("900"), "PT5M"),
        ]),
    )
    .await;

    let source = YoutubeSource::new(test_client(&server.uri()));
    let observations = source
        .fetch(&scope("GLOBAL", &["US", "JP"], 2))
        .await
        .expect("fetch should succeed");

    let ids: Vec<&str> = observations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["shared", "jp-only"]);
}

#[tokio::test]
async fn source_keyword_search_uses_preferred_languages_and_filters_shorts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "cricket"))
        .and(query_param("regionCode", "IN"))
        .and(query_param("relevanceLanguage", "en"))
        .and(query_param("order", "viewCount"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_list(&["s1", "l1"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("relevanceLanguage", "hi"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_list(&["l1", "l2"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "s1,l1,l2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
            video_json("s1", Some("300"), "PT45S"),
            video_json("l1", Some("200"), "PT10M"),
            video_json("l2", Some("100"), "PT1H"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut keyword_scope = scope("cricket-long", &["IN"], 10);
    keyword_scope.keyword = Some("  cricket ".to_owned());
    keyword_scope.shorts = Some(false);

    let source = YoutubeSource::new(test_client(&server.uri()));
    let observations = source.fetch(&keyword_scope).await.expect("fetch");

    let ids: Vec<&str> = observations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(ids, vec!["l1", "l2"]);
}

#[tokio::test]
async fn source_maps_invalid_key_to_configuration_error() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "error": {
            "code": 400,
            "message": "API key not valid. Please pass a valid API key.",
            "errors": [{ "reason": "keyInvalid" }]
        }
    });
    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(400).set_body_json(&body))
        .mount(&server)
        .await;

    let source = YoutubeSource::new(test_client(&server.uri()));
    let err = source.fetch(&scope("KR", &["KR"], 50)).await.unwrap_err();

    assert!(matches!(err, SourceError::Configuration(_)), "{err:?}");
}

#[tokio::test]
async fn keyword_scope_with_day_window_sends_published_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "election"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_list(&["n1"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("id", "n1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list(vec![video_json("n1", Some("10"), "PT4M")])),
        )
        .mount(&server)
        .await;

    let mut recent = scope("recent-news", &["KR"], 5);
    recent.keyword = Some("election".to_owned());
    recent.published_within_days = Some(7);

    let source = YoutubeSource::new(test_client(&server.uri()));
    let observations = source.fetch(&recent).await.expect("fetch");
    assert_eq!(observations.len(), 1);

    let requests = server.received_requests().await.expect("recording enabled");
    let search = requests
        .iter()
        .find(|r| r.url.path() == "/search")
        .expect("search request");
    let after = search
        .url
        .query_pairs()
        .find(|(k, _)| k == "publishedAfter")
        .map(|(_, v)| v.into_owned())
        .expect("publishedAfter param");
    let after: DateTime<Utc> = after.parse().expect("RFC 3339 timestamp");
    let age = Utc::now() - after;
    let week = chrono::Duration::days(7);
    assert!(
        age >= week && age < week + chrono::Duration::minutes(1),
        "publishedAfter should be seven days back, got {after}"
    );
}

#[tokio::test]
async fn scope_without_day_window_omits_published_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_list(&[])))
        .mount(&server)
        .await;

    let mut any_date = scope("kpop", &["US"], 5);
    any_date.keyword = Some("kpop".to_owned());

    let source = YoutubeSource::new(test_client(&server.uri()));
    let observations = source.fetch(&any_date).await.expect("fetch");
    assert!(observations.is_empty());

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests
        .iter()
        .all(|r| !r.url.query_pairs().any(|(k, _)| k == "publishedAfter")));
}

#[tokio::test]
async fn regions_are_fetched_concurrently() {
    let server = MockServer::start().await;
    let regions = ["US", "KR", "JP", "IN", "BR", "ID", "MX", "DE"];
    for region in regions {
        Mock::given(method("GET"))
            .and(path("/videos"))
            .and(query_param("regionCode", region))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(list(vec![video_json(region, Some("1"), "PT5M")]))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;
    }

    let source = YoutubeSource::new(test_client(&server.uri()));
    let started = Instant::now();
    let observations = source
        .fetch(&scope("EIGHT", &regions, 50))
        .await
        .expect("fetch should succeed");
    let elapsed = started.elapsed();

    assert_eq!(observations.len(), regions.len());
    assert!(
        elapsed < Duration::from_millis(400 * 6),
        "eight delayed regions took {elapsed:?}; they should overlap"
    );
}

#[tokio::test]
async fn live_query_tags_regions_and_computes_views_per_day() {
    let server = MockServer::start().await;
    let now = Utc::now();
    let published = now - chrono::Duration::days(3) - chrono::Duration::hours(1);
    let mut old = video_json("old", Some("3000"), "PT5M");
    old["snippet"]["publishedAt"] = serde_json::json!(published.to_rfc3339());
    mount_trending(
        &server,
        "US",
        list(vec![old, video_json("us-small", Some("5"), "PT5M")]),
    )
    .await;
    mount_trending(
        &server,
        "KR",
        list(vec![video_json("kr-top", Some("9000"), "PT5M")]),
    )
    .await;

    let source = YoutubeSource::new(test_client(&server.uri()));
    let videos = source
        .live(&scope("LIVE", &["US", "KR"], 2))
        .await
        .expect("live query");

    let summary: Vec<(&str, &str, u64)> = videos
        .iter()
        .map(|v| (v.id.as_str(), v.region.as_str(), v.views))
        .collect();
    assert_eq!(summary, vec![("kr-top", "KR", 9000), ("old", "US", 3000)]);
    assert_eq!(videos[1].views_per_day, Some(1000.0));
    assert_eq!(videos[1].url, "https://www.youtube.com/watch?v=old");
    assert!(videos[0].published_at.is_some());
}
