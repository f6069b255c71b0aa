use axum::http::StatusCode;
use podrank::api::{self, AppState};
use podrank::config::Config;
use podrank::db::init_db;
use podrank::engine::{DecayParams, RatingPipeline};
use podrank::orchestration::LeagueService;
use podrank::Repository;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

fn test_config() -> Config {
    Config {
        port: 0,
        database_path: ":memory:".to_string(),
        ledger_capacity: 100,
        pending_ttl_ms: 120_000,
        decay_enabled: false,
        decay_sweep_interval_ms: 3_600_000,
        decay: DecayParams {
            grace_ms: 30 * 24 * 3_600_000,
            interval_ms: 7 * 24 * 3_600_000,
            elo_per_step: 5.0,
            elo_floor: 900.0,
            sigma_growth: 0.5,
        },
        pipeline: RatingPipeline::default(),
    }
}

async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let service = Arc::new(LeagueService::new(repo, test_config()));
    let app = api::create_router(AppState::new(service));

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn request(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let res = app.oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn game_body(winner: &str, losers: [&str; 3]) -> Value {
    let mut participants = vec![json!({"id": winner, "outcome": "w"})];
    for id in losers {
        participants.push(json!({"id": id, "outcome": "l"}));
    }
    json!({
        "kind": "player",
        "participants": participants,
        "submittedBy": winner,
    })
}

#[tokio::test]
async fn test_health_and_ready() {
    let test_app = setup_test_app().await;
    let (status, body) = request(test_app.app.clone(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = request(test_app.app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_submit_game_returns_movements() {
    let test_app = setup_test_app().await;
    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        "/v1/games",
        Some(game_body("a", ["b", "c", "d"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gameId"], 1);
    assert_eq!(body["sequence"], 1.0);

    let participants = body["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 4);
    assert_eq!(participants[0]["id"], "a");
    assert_eq!(participants[0]["before"]["elo"], 1000);
    assert!(participants[0]["after"]["elo"].as_i64().unwrap() >= 1003);
    assert!(participants[1]["after"]["elo"].as_i64().unwrap() <= 999);
}

#[tokio::test]
async fn test_submit_rejects_bad_outcome_with_400() {
    let test_app = setup_test_app().await;
    let body = json!({
        "kind": "player",
        "participants": [
            {"id": "a", "outcome": "victory"},
            {"id": "b", "outcome": "l"},
            {"id": "c", "outcome": "l"},
        ],
        "submittedBy": "a",
    });
    let (status, body) = request(test_app.app, "POST", "/v1/games", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("outcome"));
}

#[tokio::test]
async fn test_standings_rank_by_elo() {
    let test_app = setup_test_app().await;
    request(
        test_app.app.clone(),
        "POST",
        "/v1/games",
        Some(game_body("a", ["b", "c", "d"])),
    )
    .await;

    let (status, body) = request(test_app.app, "GET", "/v1/standings?kind=player", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[0]["id"], "a");
    assert!(entries[0]["elo"].as_i64().unwrap() > entries[1]["elo"].as_i64().unwrap());
}

#[tokio::test]
async fn test_get_player_includes_recent_changes() {
    let test_app = setup_test_app().await;
    request(
        test_app.app.clone(),
        "POST",
        "/v1/games",
        Some(game_body("a", ["b", "c", "d"])),
    )
    .await;

    let (status, body) = request(test_app.app.clone(), "GET", "/v1/players/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "a");
    assert_eq!(body["gamesPlayed"], 1);
    assert_eq!(body["recentChanges"].as_array().unwrap().len(), 1);
    assert_eq!(body["recentChanges"][0]["changeKind"], "game");

    let (status, _) = request(test_app.app, "GET", "/v1/players/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_staged_flow_conflicts_with_409() {
    let test_app = setup_test_app().await;
    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        "/v1/games/staged",
        Some(game_body("a", ["b", "c", "d"])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    // Overlapping participant while staged.
    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        "/v1/games",
        Some(game_body("b", ["e", "f", "g"])),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("pending"));

    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        &format!("/v1/games/staged/{}/confirm", token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gameId"], 1);

    // Cancelling an already-confirmed token is a 404.
    let (status, _) = request(
        test_app.app,
        "DELETE",
        &format!("/v1/games/staged/{}", token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_undo_and_redo_endpoints() {
    let test_app = setup_test_app().await;
    request(
        test_app.app.clone(),
        "POST",
        "/v1/games",
        Some(game_body("a", ["b", "c", "d"])),
    )
    .await;

    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        "/v1/undo",
        Some(json!({"actor": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["undone"].as_str().unwrap().contains("game #1"));

    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        "/v1/redo",
        Some(json!({"actor": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["redone"].as_str().is_some());

    // Empty redo stack is a null, not an error.
    let (status, body) = request(
        test_app.app,
        "POST",
        "/v1/redo",
        Some(json!({"actor": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["redone"].is_null());
}

#[tokio::test]
async fn test_override_endpoint_reports_before_and_after() {
    let test_app = setup_test_app().await;
    request(
        test_app.app.clone(),
        "POST",
        "/v1/games",
        Some(game_body("a", ["b", "c", "d"])),
    )
    .await;

    let (status, body) = request(
        test_app.app.clone(),
        "POST",
        "/v1/ratings/override",
        Some(json!({
            "kind": "player",
            "id": "a",
            "elo": 1150.0,
            "actor": "admin",
            "reason": "manual correction",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["after"]["elo"], 1150);
    assert!(body["before"]["elo"].as_i64().unwrap() < 1150);

    let (status, _) = request(
        test_app.app,
        "POST",
        "/v1/ratings/override",
        Some(json!({
            "kind": "player",
            "id": "ghost",
            "elo": 1000.0,
            "actor": "admin",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_toggle_active_and_audit_endpoints() {
    let test_app = setup_test_app().await;
    request(
        test_app.app.clone(),
        "POST",
        "/v1/games",
        Some(game_body("a", ["b", "c", "d"])),
    )
    .await;

    let (status, _) = request(
        test_app.app.clone(),
        "PATCH",
        "/v1/games/1/active",
        Some(json!({"active": false, "actor": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Toggling to the current state is rejected.
    let (status, _) = request(
        test_app.app.clone(),
        "PATCH",
        "/v1/games/1/active",
        Some(json!({"active": false, "actor": "admin"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = request(
        test_app.app,
        "GET",
        "/v1/audit?kind=player&targetId=a",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.as_array().unwrap().is_empty());
    assert_eq!(body[0]["targetId"], "a");
}
