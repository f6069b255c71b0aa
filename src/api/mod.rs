pub mod decks;
pub mod games;
pub mod health;
pub mod history;
pub mod players;
pub mod ratings;
pub mod standings;

use crate::domain::EntityImage;
use crate::orchestration::LeagueService;
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LeagueService>,
}

impl AppState {
    pub fn new(service: Arc<LeagueService>) -> Self {
        Self { service }
    }
}

/// Rating image as it appears on the wire.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireImage {
    pub mu: f64,
    pub sigma: f64,
    pub elo: i64,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
}

impl From<EntityImage> for WireImage {
    fn from(image: EntityImage) -> Self {
        WireImage {
            mu: image.mu,
            sigma: image.sigma,
            elo: image.elo,
            wins: image.wins,
            losses: image.losses,
            draws: image.draws,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/games", post(games::submit_game))
        .route("/v1/games/staged", post(games::stage_game))
        .route(
            "/v1/games/staged/:token/confirm",
            post(games::confirm_game),
        )
        .route("/v1/games/staged/:token", delete(games::cancel_game))
        .route("/v1/games/:id/active", patch(games::set_active))
        .route("/v1/games/:id/turn-order", patch(games::set_turn_order))
        .route(
            "/v1/games/:id/players/:player_id/deck",
            patch(games::set_match_deck),
        )
        .route(
            "/v1/players/:id/default-deck",
            post(players::set_default_deck),
        )
        .route("/v1/players/:id", get(players::get_player))
        .route("/v1/decks/:name", get(decks::get_deck))
        .route("/v1/ratings/override", post(ratings::override_rating))
        .route("/v1/undo", post(history::undo))
        .route("/v1/redo", post(history::redo))
        .route("/v1/standings", get(standings::get_standings))
        .route("/v1/audit", get(history::get_audit))
        .layer(cors)
        .with_state(state)
}
