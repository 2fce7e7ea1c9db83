use esvolve::{HistoryRepository, MigrationScriptProtocol, MigrationState};

mod common;

use crate::common::StubEngine;

const INDEX: &str = "es_evolution";

fn repository(engine: StubEngine) -> HistoryRepository {
    HistoryRepository::new(engine, INDEX)
}

#[tokio::test]
async fn find_all_failed() {
    let repository = repository(StubEngine::new().fail("test error"));

    let err = repository.find_all().await.unwrap_err();

    assert_eq!(err.to_string(), "findAll failed!");
}

#[tokio::test]
async fn find_all_failed_on_non_2xx() {
    let repository = repository(StubEngine::new().respond(500, ""));

    let err = repository.find_all().await.unwrap_err();

    assert_eq!(err.to_string(), "findAll failed!");
}

#[tokio::test]
async fn save_or_update_failed() {
    let repository = repository(StubEngine::new().fail("test error"));
    let protocol = MigrationScriptProtocol::new("1", MigrationState::Pending);

    let err = repository.save_or_update(&protocol).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        format!("saveOrUpdate of '{protocol}' failed!")
    );
}

#[tokio::test]
async fn is_locked_failed() {
    // First call is the refresh, which must succeed.
    let repository = repository(StubEngine::new().respond(200, "").fail("test error"));

    let err = repository.is_locked().await.unwrap_err();

    assert_eq!(err.to_string(), "isLocked check failed!");
}

#[tokio::test]
async fn lock_returns_false_on_transport_error() {
    let repository = repository(StubEngine::new().fail("test error"));

    assert!(!repository.lock().await);
}

#[tokio::test]
async fn lock_returns_false_on_conflicting_writer() {
    let engine = StubEngine::new()
        .respond(200, "")
        .respond(
            200,
            r#"{"_id":"lock","found":true,"_seq_no":5,"_primary_term":1,"_source":{"locked":false}}"#,
        )
        // another process wrote first, the conditional write is rejected
        .respond(409, r#"{"error":{"type":"version_conflict_engine_exception"}}"#);
    let repository = repository(engine);

    assert!(!repository.lock().await);
}

#[tokio::test]
async fn lock_returns_false_when_already_locked() {
    let engine = StubEngine::new().respond(200, "").respond(
        200,
        r#"{"_id":"lock","found":true,"_seq_no":7,"_primary_term":1,"_source":{"locked":true}}"#,
    );
    let repository = repository(engine);

    assert!(!repository.lock().await);
}

#[tokio::test]
async fn unlock_returns_false_when_update_fails_after_refresh() {
    let repository = repository(StubEngine::new().respond(200, "").fail("test error"));

    assert!(!repository.unlock().await);
}

#[tokio::test]
async fn unlock_returns_false_when_refresh_fails() {
    let repository = repository(StubEngine::new().fail("test error"));

    assert!(!repository.unlock().await);
}

#[tokio::test]
async fn create_index_if_absent_failed_checking_index() {
    let repository = repository(StubEngine::new().fail("test error"));

    let err = repository.create_index_if_absent().await.unwrap_err();

    assert_eq!(err.to_string(), "createIndexIfAbsent failed!");
}

#[tokio::test]
async fn create_index_if_absent_failed_on_create() {
    let repository = repository(StubEngine::new().respond(404, "").respond(500, ""));

    let err = repository.create_index_if_absent().await.unwrap_err();

    assert_eq!(err.to_string(), "createIndexIfAbsent failed!");
}

#[tokio::test]
async fn create_index_if_absent_creates_when_probe_says_404() {
    let repository = repository(
        StubEngine::new()
            .respond(404, "")
            .respond(200, r#"{"acknowledged":true}"#),
    );

    repository.create_index_if_absent().await.unwrap();
}

#[tokio::test]
async fn refresh_failed() {
    let repository = repository(StubEngine::new().fail("foo"));

    let err = repository.refresh().await.unwrap_err();

    assert_eq!(err.to_string(), "refresh failed!");
}

#[tokio::test]
async fn validate_http_status_accepts_all_2xx() {
    let repository = repository(StubEngine::new());

    for status in 200..=299 {
        repository.validate_http_status_2xx(status, "isOK").unwrap();
    }
}

#[tokio::test]
async fn validate_http_status_rejects_non_2xx_with_exact_message() {
    let repository = repository(StubEngine::new());

    for status in [100, 199, 300, 302, 400, 404, 409, 500, 503] {
        let err = repository
            .validate_http_status_2xx(status, "failed")
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("failed - response status is not OK: {status}")
        );
    }
}
