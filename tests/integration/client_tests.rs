//! Integration tests for the HTTP API client
//!
//! These tests use wiremock to stand in for the game-data API and check how
//! every response class is mapped onto the error taxonomy.

use clanwar_archiver::api::{ApiClient, ApiError, HttpApiClient, WarState};
use clanwar_archiver::config::ApiConfig;
use clanwar_archiver::tag::ClanTag;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAR_LOG_PATH: &str = "/v1/clans/%232PP2PQ9L/warlog";
const CURRENT_WAR_PATH: &str = "/v1/clans/%232PP2PQ9L/currentwar";

fn client_for(server: &MockServer) -> HttpApiClient {
    let config = ApiConfig {
        base_url: format!("{}/v1", server.uri()),
        token: "test-token".to_string(),
        timeout_secs: 2,
        requests_per_window: 100,
        window_secs: 1,
    };
    HttpApiClient::new(&config).expect("client builds")
}

fn tag() -> ClanTag {
    ClanTag::parse("#2PP2PQ9L").unwrap()
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_war_log_success() {
    let server = MockServer::start().await;
    let body = serde_json::json!({
        "items": [{
            "result": "win",
            "endTime": "20240101T000000.000Z",
            "teamSize": 10,
            "attacksPerMember": 2,
            "clan": {"tag": "#2PP2PQ9L", "name": "Home", "stars": 25, "destructionPercentage": 83.2},
            "opponent": {"tag": "#9PYLQGR", "name": "Away", "stars": 20, "destructionPercentage": 71.0}
        }]
    });

    Mock::given(method("GET"))
        .and(path(WAR_LOG_PATH))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let entries = client_for(&server).fetch_war_log(&tag()).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result.as_deref(), Some("win"));
    assert_eq!(entries[0].opponent.tag.as_deref(), Some("#9PYLQGR"));
}

#[tokio::test]
async fn test_fetch_current_war_success() {
    let server = MockServer::start().await;
    mount(
        &server,
        CURRENT_WAR_PATH,
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "state": "preparation",
            "teamSize": 15,
            "startTime": "20240101T120000.000Z",
            "endTime": "20240102T120000.000Z",
            "clan": {"tag": "#2PP2PQ9L"},
            "opponent": {"tag": "#9PYLQGR", "name": "Away"}
        })),
    )
    .await;

    let war = client_for(&server).fetch_current_war(&tag()).await.unwrap();

    assert_eq!(war.state, WarState::Preparation);
    assert_eq!(war.start_time.as_deref(), Some("20240101T120000.000Z"));
}

#[tokio::test]
async fn test_invalid_token_is_forbidden() {
    let server = MockServer::start().await;
    mount(
        &server,
        WAR_LOG_PATH,
        ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "reason": "accessDenied",
            "message": "Invalid authorization"
        })),
    )
    .await;

    let err = client_for(&server).fetch_war_log(&tag()).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_private_war_log_is_not_found() {
    let server = MockServer::start().await;
    mount(
        &server,
        WAR_LOG_PATH,
        ResponseTemplate::new(403).set_body_json(serde_json::json!({"reason": "privateWarLog"})),
    )
    .await;

    let err = client_for(&server).fetch_war_log(&tag()).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(!err.is_fatal());
}

#[tokio::test]
async fn test_unknown_clan_is_not_found() {
    let server = MockServer::start().await;
    mount(
        &server,
        WAR_LOG_PATH,
        ResponseTemplate::new(404).set_body_json(serde_json::json!({"reason": "notFound"})),
    )
    .await;

    let err = client_for(&server).fetch_war_log(&tag()).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_maintenance_is_transient() {
    let server = MockServer::start().await;
    mount(
        &server,
        WAR_LOG_PATH,
        ResponseTemplate::new(503).set_body_json(serde_json::json!({"reason": "inMaintenance"})),
    )
    .await;

    let err = client_for(&server).fetch_war_log(&tag()).await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_throttling_is_transient() {
    let server = MockServer::start().await;
    mount(&server, WAR_LOG_PATH, ResponseTemplate::new(429)).await;

    let err = client_for(&server).fetch_war_log(&tag()).await.unwrap_err();
    assert!(matches!(err, ApiError::Transient(_)));
}

#[tokio::test]
async fn test_undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    mount(
        &server,
        WAR_LOG_PATH,
        ResponseTemplate::new(200).set_body_string("<html>not json</html>"),
    )
    .await;

    let err = client_for(&server).fetch_war_log(&tag()).await.unwrap_err();
    assert!(matches!(err, ApiError::Malformed(_)));
}

#[tokio::test]
async fn test_slow_response_is_transient() {
    let server = MockServer::start().await;
    mount(
        &server,
        WAR_LOG_PATH,
        ResponseTemplate::new(200)
            .set_body_json(serde_json::json!({"items": []}))
            .set_delay(std::time::Duration::from_secs(5)),
    )
    .await;

    let err = client_for(&server).fetch_war_log(&tag()).await.unwrap_err();
    assert!(matches!(err, ApiError::Transient(_)));
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    // Grab a free port, then close it so nothing is listening there
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ApiConfig {
        base_url: format!("http://127.0.0.1:{}/v1", port),
        token: "test-token".to_string(),
        timeout_secs: 2,
        requests_per_window: 100,
        window_secs: 1,
    };
    let client = HttpApiClient::new(&config).unwrap();

    let err = client.fetch_war_log(&tag()).await.unwrap_err();
    assert!(matches!(err, ApiError::Transient(_)), "got {:?}", err);
    assert!(err.is_retryable());
}
