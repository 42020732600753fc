//! HTTP API integration tests.
//!
//! Tests for REST API endpoints (health check, connection list).

mod fixtures;
use fixtures::TestServer;

#[tokio::test]
async fn test_health_endpoint() {
    // テスト項目: /api/health エンドポイントが正常に動作する
    // given (前提条件):
    let server = TestServer::start(&[]).await;
    let client = reqwest::Client::new();

    // when (操作):
    let response = client
        .get(format!("{}/api/health", server.base_url()))
        .send()
        .await
        .expect("Failed to send request");

    // then (期待する結果):
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_connections_endpoint_empty() {
    // テスト項目: 接続がない場合 /api/connections は空の一覧を返す
    // given (前提条件):
    let server = TestServer::start(&[]).await;
    let client = reqwest::Client::new();

    // when (操作):
    let response = client
        .get(format!("{}/api/connections", server.base_url()))
        .send()
        .await
        .expect("Failed to send request");

    // then (期待する結果):
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["count"], 0);
    assert!(body["connections"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_connections_endpoint_lists_identities() {
    // テスト項目: /api/connections が接続ごとの会員番号と接続時刻を返す
    // given (前提条件): user 1 が 2 タブ、匿名が 1 接続
    let server = TestServer::start(&["--anonymous-policy", "admit"]).await;
    let _c1_a = server.connect_as(1).await;
    let _c1_b = server.connect_as(1).await;
    let _anonymous = server
        .connect_with_headers(&[])
        .await
        .expect("Anonymous connection should be admitted");
    server.wait_for_connections(3).await;
    let client = reqwest::Client::new();

    // when (操作):
    let response = client
        .get(format!("{}/api/connections", server.base_url()))
        .send()
        .await
        .expect("Failed to send request");

    // then (期待する結果):
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["count"], 3);

    let connections = body["connections"].as_array().unwrap();
    let mut user_ids: Vec<Option<i64>> = connections
        .iter()
        .map(|c| c["userId"].as_i64())
        .collect();
    user_ids.sort();
    assert_eq!(user_ids, vec![None, Some(1), Some(1)]);

    for connection in connections {
        assert!(connection["connectionId"].is_string());
        // connectedAt は JST の RFC 3339
        let connected_at = connection["connectedAt"].as_str().unwrap();
        assert!(connected_at.ends_with("+09:00"));
    }
}
