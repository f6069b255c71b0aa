use podrank::config::Config;
use podrank::db::init_db;
use podrank::domain::{Actor, ChangeKind, EntityKind, PlayerId, PlayerRecord, Rating, TimeMs};
use podrank::engine::{DecayParams, RatingPipeline};
use podrank::orchestration::LeagueService;
use podrank::Repository;
use std::sync::Arc;
use tempfile::TempDir;

const GRACE_MS: i64 = 1_000_000;
const INTERVAL_MS: i64 = 1_000_000;

fn test_config(decay_enabled: bool) -> Config {
    Config {
        port: 0,
        database_path: ":memory:".to_string(),
        ledger_capacity: 100,
        pending_ttl_ms: 120_000,
        decay_enabled,
        decay_sweep_interval_ms: 3_600_000,
        decay: DecayParams {
            grace_ms: GRACE_MS,
            interval_ms: INTERVAL_MS,
            elo_per_step: 5.0,
            elo_floor: 900.0,
            sigma_growth: 0.5,
        },
        pipeline: RatingPipeline::default(),
    }
}

async fn setup(decay_enabled: bool) -> (LeagueService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    (LeagueService::new(repo, test_config(decay_enabled)), temp_dir)
}

/// A player whose last game finished `idle_ms` before now. Seeded with a
/// settled (sub-prior) sigma so decay's uncertainty growth is observable.
async fn idle_player(service: &LeagueService, id: &str, idle_ms: i64) -> PlayerRecord {
    let mut player = PlayerRecord::new(
        PlayerId::new(id.to_string()),
        TimeMs::new(TimeMs::now().as_ms() - idle_ms - 1),
    );
    player.last_active = Some(TimeMs::new(TimeMs::now().as_ms() - idle_ms));
    player.rating = Rating::new(28.0, 5.0);
    player.wins = 1;
    service.repo().upsert_player(&player).await.unwrap();
    player
}

#[tokio::test]
async fn test_sweep_decays_idle_players_once() {
    let (service, _temp) = setup(true).await;
    let before = idle_player(&service, "idle", GRACE_MS + 2 * INTERVAL_MS).await;
    idle_player(&service, "fresh", 0).await;

    let report = service
        .run_decay_sweep(Actor::new("scheduler".into()))
        .await
        .unwrap()
        .expect("sweep should decay someone");
    assert_eq!(report.players, 1);
    assert_eq!(report.steps, 3);

    let decayed = service
        .get_player(&PlayerId::new("idle".into()))
        .await
        .unwrap()
        .unwrap();
    assert!(decayed.rating.elo_f() < before.rating.elo_f());
    assert_eq!(decayed.decay_steps, 3);
    assert!(decayed.rating.sigma > before.rating.sigma);

    let fresh = service
        .get_player(&PlayerId::new("fresh".into()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fresh.decay_steps, 0);
    assert_eq!(fresh.rating, before.rating);

    // A second sweep owes nothing new.
    assert!(service
        .run_decay_sweep(Actor::new("scheduler".into()))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_sweep_is_a_noop_when_disabled() {
    let (service, _temp) = setup(false).await;
    idle_player(&service, "idle", GRACE_MS + 5 * INTERVAL_MS).await;

    assert!(service
        .run_decay_sweep(Actor::new("scheduler".into()))
        .await
        .unwrap()
        .is_none());
    let player = service
        .get_player(&PlayerId::new("idle".into()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(player.rating, Rating::new(28.0, 5.0));
    assert_eq!(player.decay_steps, 0);
}

#[tokio::test]
async fn test_sweep_never_decays_below_floor() {
    let (service, _temp) = setup(true).await;
    // Enough owed steps to walk well past the floor from the prior.
    idle_player(&service, "idle", GRACE_MS + 50 * INTERVAL_MS).await;

    service
        .run_decay_sweep(Actor::new("scheduler".into()))
        .await
        .unwrap()
        .expect("sweep should decay someone");

    let decayed = service
        .get_player(&PlayerId::new("idle".into()))
        .await
        .unwrap()
        .unwrap();
    assert!((decayed.rating.elo_f() - 900.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_undo_reverses_a_decay_sweep() {
    let (service, _temp) = setup(true).await;
    let before = idle_player(&service, "idle", GRACE_MS + INTERVAL_MS).await;

    service
        .run_decay_sweep(Actor::new("scheduler".into()))
        .await
        .unwrap()
        .expect("sweep should decay someone");

    let undone = service.undo(Actor::new("admin".into())).await.unwrap();
    assert_eq!(undone.unwrap(), "decay sweep over 1 players");

    let restored = service
        .get_player(&PlayerId::new("idle".into()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.rating, before.rating);
    assert_eq!(restored.decay_steps, 0);

    // Redo applies the same steps again.
    service.redo(Actor::new("admin".into())).await.unwrap();
    let redone = service
        .get_player(&PlayerId::new("idle".into()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(redone.decay_steps, 2);
}

#[tokio::test]
async fn test_sweep_writes_decay_audit_entries() {
    let (service, _temp) = setup(true).await;
    idle_player(&service, "idle", GRACE_MS + INTERVAL_MS).await;

    service
        .run_decay_sweep(Actor::new("scheduler".into()))
        .await
        .unwrap()
        .expect("sweep should decay someone");

    let history = service
        .audit_history(EntityKind::Player, "idle", 10)
        .await
        .unwrap();
    assert_eq!(history[0].change_kind, ChangeKind::Decay);
    assert_eq!(history[0].params["steps"], 2);
    assert!(history[0].after.elo < history[0].before.elo);
}
