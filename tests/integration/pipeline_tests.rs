//! End-to-end tests for the crawl and monitor pipelines
//!
//! The game-data API is served by wiremock and the ledger lives in a
//! temporary SQLite file, so these tests exercise the same code paths as a
//! real run, including reopening the database between runs.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use clanwar_archiver::api::{ApiClient, HttpApiClient};
use clanwar_archiver::config::{ApiConfig, CrawlerConfig};
use clanwar_archiver::crawler::{Coordinator, RequestLimiter};
use clanwar_archiver::monitor::{LiveWarMonitor, MonitorSettings, PollOutcome};
use clanwar_archiver::notify::{NotificationSink, NotifyError};
use clanwar_archiver::output::load_statistics;
use clanwar_archiver::storage::{SqliteStorage, Storage, SOURCE_SEED};
use clanwar_archiver::{CandidateStatus, ClanTag, WarResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HOME_TAG: &str = "#2PP2PQ9L";
const OPPONENT_TAG: &str = "#9PYLQGR";

fn api_config(server: &MockServer) -> ApiConfig {
    ApiConfig {
        base_url: format!("{}/v1", server.uri()),
        token: "test-token".to_string(),
        timeout_secs: 2,
        requests_per_window: 1000,
        window_secs: 1,
    }
}

fn crawler_config(seed_tags: &[&str]) -> CrawlerConfig {
    CrawlerConfig {
        workers: 2,
        queue_capacity: 4,
        min_length: 7,
        max_length: 7,
        seed_tags: seed_tags.iter().map(|t| t.to_string()).collect(),
        idle_poll_ms: 10,
        max_transient_attempts: 3,
        retry_backoff_ms: 100,
        retry_backoff_max_ms: 400,
        progress_every: 10,
    }
}

fn open(dir: &TempDir) -> Arc<dyn Storage> {
    let db = dir.path().join("wars.db");
    Arc::new(SqliteStorage::new(&db).unwrap())
}

/// Points the brute-force cursor at the last 7-symbol tag so the
/// enumerator is exhausted and only seeded or discovered tags are crawled
fn skip_brute_force(storage: &dyn Storage) {
    storage.set_cursor("#VVVVVVV").unwrap();
}

fn build_coordinator(
    server: &MockServer,
    config: CrawlerConfig,
    storage: Arc<dyn Storage>,
) -> (Coordinator, watch::Receiver<bool>) {
    let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(&api_config(server)).unwrap());
    let limiter = Arc::new(RequestLimiter::new(1000, Duration::from_secs(1)).unwrap());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let coordinator =
        Coordinator::new(config, api, storage, limiter, Arc::new(shutdown_tx)).unwrap();
    (coordinator, shutdown_rx)
}

fn home_war_log() -> serde_json::Value {
    serde_json::json!({
        "items": [
            {
                "result": "win",
                "endTime": "20240101T000000.000Z",
                "teamSize": 10,
                "attacksPerMember": 2,
                "clan": {
                    "tag": HOME_TAG, "name": "Home", "stars": 25,
                    "destructionPercentage": 83.2, "attacks": 18
                },
                "opponent": {
                    "tag": OPPONENT_TAG, "name": "Away", "stars": 20,
                    "destructionPercentage": 71.0
                }
            },
            {
                "result": "lose",
                "endTime": "",
                "teamSize": 10,
                "clan": {"tag": HOME_TAG},
                "opponent": {"tag": "#2PP2PQ9"}
            }
        ]
    })
}

async fn mount_war_log(server: &MockServer, tag_body: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/clans/%23{}/warlog", tag_body)))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_archives_seed_and_follows_opponent() {
    let server = MockServer::start().await;
    mount_war_log(
        &server,
        "2PP2PQ9L",
        ResponseTemplate::new(200).set_body_json(home_war_log()),
    )
    .await;
    mount_war_log(
        &server,
        "9PYLQGR",
        ResponseTemplate::new(403).set_body_json(serde_json::json!({"reason": "privateWarLog"})),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let storage = open(&dir);
    skip_brute_force(storage.as_ref());

    let (coordinator, _shutdown) =
        build_coordinator(&server, crawler_config(&[HOME_TAG]), Arc::clone(&storage));
    let summary = coordinator.run().await.unwrap();

    assert!(summary.frontier.exhausted);
    assert_eq!(summary.startup.seeded, 1);
    assert_eq!(summary.workers.wars_archived, 1);
    assert_eq!(summary.workers.tags_discovered, 1);

    let war = storage.get_war("2024-01-01T00:00:00Z").unwrap().unwrap();
    assert_eq!(war.result, WarResult::Win);
    assert_eq!(war.clan_tag, HOME_TAG);
    assert_eq!(war.opponent_tag.as_deref(), Some(OPPONENT_TAG));
    assert_eq!(war.attacks_used, 18);

    let home = storage.get_candidate(HOME_TAG).unwrap().unwrap();
    assert_eq!(home.status, CandidateStatus::Done);
    assert_eq!(home.discovered_from, SOURCE_SEED);

    let opponent = storage.get_candidate(OPPONENT_TAG).unwrap().unwrap();
    assert_eq!(opponent.status, CandidateStatus::Skipped);
    assert_eq!(opponent.discovered_from, HOME_TAG);

    // The in-progress war with an empty end time never reaches the store
    assert_eq!(storage.count_wars().unwrap(), 1);
    assert!(storage.get_candidate("#2PP2PQ9").unwrap().is_none());
}

#[tokio::test]
async fn test_second_run_resumes_without_rearchiving() {
    let server = MockServer::start().await;
    mount_war_log(
        &server,
        "2PP2PQ9L",
        ResponseTemplate::new(200).set_body_json(home_war_log()),
    )
    .await;
    mount_war_log(&server, "9PYLQGR", ResponseTemplate::new(404)).await;

    let dir = TempDir::new().unwrap();
    {
        let storage = open(&dir);
        skip_brute_force(storage.as_ref());
        let (coordinator, _shutdown) =
            build_coordinator(&server, crawler_config(&[HOME_TAG]), storage);
        coordinator.run().await.unwrap();
    }

    let storage = open(&dir);
    assert_eq!(storage.get_cursor().unwrap().as_deref(), Some("#VVVVVVV"));

    let (coordinator, _shutdown) =
        build_coordinator(&server, crawler_config(&[HOME_TAG]), Arc::clone(&storage));
    let summary = coordinator.run().await.unwrap();

    // Seed is already in the ledger and finished, so nothing is crawled again
    assert_eq!(summary.startup.seeded, 0);
    assert_eq!(summary.workers.processed, 0);
    assert_eq!(storage.count_wars().unwrap(), 1);

    let stats = load_statistics(storage.as_ref()).unwrap();
    assert_eq!(stats.total_candidates, 2);
    assert_eq!(stats.count(CandidateStatus::Done), 1);
    assert_eq!(stats.count(CandidateStatus::Skipped), 1);
    assert_eq!(stats.total_wars, 1);
}

#[tokio::test]
async fn test_transient_failures_exhaust_into_failed() {
    let server = MockServer::start().await;
    mount_war_log(
        &server,
        "2PP2PQ9L",
        ResponseTemplate::new(503).set_body_json(serde_json::json!({"reason": "inMaintenance"})),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let storage = open(&dir);
    skip_brute_force(storage.as_ref());

    let (coordinator, _shutdown) =
        build_coordinator(&server, crawler_config(&[HOME_TAG]), Arc::clone(&storage));
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.workers.retried, 3);
    let home = storage.get_candidate(HOME_TAG).unwrap().unwrap();
    assert_eq!(home.status, CandidateStatus::Failed);
    assert_eq!(home.attempts, 3);

    // Operator requeue puts it back in line
    assert_eq!(storage.requeue_failed().unwrap(), 1);
    let home = storage.get_candidate(HOME_TAG).unwrap().unwrap();
    assert_eq!(home.status, CandidateStatus::Pending);
}

#[tokio::test]
async fn test_forbidden_halts_crawl() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/clans/.+/warlog$"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(serde_json::json!({"reason": "accessDenied.invalidIp"})),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let storage = open(&dir);
    skip_brute_force(storage.as_ref());

    let mut config = crawler_config(&[HOME_TAG, OPPONENT_TAG]);
    config.workers = 1;
    let (coordinator, shutdown) = build_coordinator(&server, config, Arc::clone(&storage));
    let err = coordinator.run().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(*shutdown.borrow());

    let counts = storage.count_candidates_by_status().unwrap();
    assert_eq!(counts.get(&CandidateStatus::Done).copied().unwrap_or(0), 0);
    assert_eq!(counts.get(&CandidateStatus::Skipped).copied().unwrap_or(0), 1);

    // Whatever was queued but untouched is recovered on the next start
    let pending_or_reserved = counts.get(&CandidateStatus::Pending).copied().unwrap_or(0)
        + counts.get(&CandidateStatus::Reserved).copied().unwrap_or(0);
    assert_eq!(pending_or_reserved, 1);
}

/// Records every delivered message
#[derive(Default)]
struct CountingSink {
    sent: Mutex<Vec<(String, String)>>,
}

impl CountingSink {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for CountingSink {
    fn name(&self) -> &str {
        "counting"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

fn build_monitor(
    server: &MockServer,
    storage: Arc<dyn Storage>,
    sink: Arc<CountingSink>,
) -> LiveWarMonitor {
    let api: Arc<dyn ApiClient> = Arc::new(HttpApiClient::new(&api_config(server)).unwrap());
    let settings = MonitorSettings {
        clan_tag: ClanTag::parse(HOME_TAG).unwrap(),
        poll_interval: Duration::from_secs(60),
        lead_window: ChronoDuration::minutes(60),
        recipients: vec!["alice".to_string(), "bob".to_string()],
    };
    LiveWarMonitor::new(
        api,
        storage,
        sink,
        Arc::new(RequestLimiter::new(1000, Duration::from_secs(1)).unwrap()),
        settings,
    )
}

async fn mount_current_war(server: &MockServer, body: serde_json::Value) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/v1/clans/%232PP2PQ9L/currentwar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_monitor_notifies_once_then_archives() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let storage = open(&dir);
    let sink = Arc::new(CountingSink::default());
    let mut monitor = build_monitor(&server, Arc::clone(&storage), Arc::clone(&sink));

    let now = Utc.with_ymd_and_hms(2024, 1, 1, 11, 30, 0).unwrap();
    mount_current_war(
        &server,
        serde_json::json!({
            "state": "preparation",
            "teamSize": 10,
            "startTime": "20240101T120000.000Z",
            "endTime": "20240102T120000.000Z",
            "clan": {"tag": HOME_TAG, "name": "Home"},
            "opponent": {"tag": OPPONENT_TAG, "name": "Away"}
        }),
    )
    .await;

    let outcome = monitor.poll_once(now).await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Notified {
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            delivered: 2,
        }
    );
    assert_eq!(sink.count(), 2);

    // Five minutes later the same war is still in preparation
    let later = now + ChronoDuration::minutes(5);
    let outcome = monitor.poll_once(later).await.unwrap();
    assert!(matches!(outcome, PollOutcome::NoChange(_)));
    assert_eq!(sink.count(), 2);

    mount_current_war(
        &server,
        serde_json::json!({
            "state": "warEnded",
            "teamSize": 10,
            "attacksPerMember": 2,
            "startTime": "20240101T120000.000Z",
            "endTime": "20240102T120000.000Z",
            "clan": {"tag": HOME_TAG, "name": "Home", "stars": 22, "destructionPercentage": 75.0},
            "opponent": {"tag": OPPONENT_TAG, "name": "Away", "stars": 24, "destructionPercentage": 80.0}
        }),
    )
    .await;

    let after_end = Utc.with_ymd_and_hms(2024, 1, 2, 12, 5, 0).unwrap();
    let outcome = monitor.poll_once(after_end).await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Archived {
            end_time: "2024-01-02T12:00:00Z".to_string()
        }
    );

    let war = storage.get_war("2024-01-02T12:00:00Z").unwrap().unwrap();
    assert_eq!(war.result, WarResult::Lose);

    // Repeated polls of the ended war leave the store alone
    let outcome = monitor.poll_once(after_end).await.unwrap();
    assert!(matches!(outcome, PollOutcome::NoChange(_)));
    assert_eq!(storage.count_wars().unwrap(), 1);
    assert_eq!(sink.count(), 2);
}

#[tokio::test]
async fn test_monitor_backfill_shares_store_with_crawler() {
    let server = MockServer::start().await;
    mount_war_log(
        &server,
        "2PP2PQ9L",
        ResponseTemplate::new(200).set_body_json(home_war_log()),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let storage = open(&dir);
    let sink = Arc::new(CountingSink::default());
    let mut monitor = build_monitor(&server, Arc::clone(&storage), Arc::clone(&sink));

    assert_eq!(monitor.backfill().await.unwrap(), 1);
    assert_eq!(monitor.backfill().await.unwrap(), 0);
    assert!(storage.war_exists("2024-01-01T00:00:00Z").unwrap());
    assert_eq!(sink.count(), 0);
}
