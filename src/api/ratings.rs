//! Manual rating and counter overrides.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::games::parse_kind;
use crate::api::{AppState, WireImage};
use crate::domain::Actor;
use crate::error::AppError;
use crate::orchestration::RatingOverride;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideRequest {
    /// "player" or "deck".
    pub kind: String,
    pub id: String,
    pub mu: Option<f64>,
    pub sigma: Option<f64>,
    /// Wins over a simultaneous `mu`; solved at the (new) sigma.
    pub elo: Option<f64>,
    pub wins: Option<i64>,
    pub losses: Option<i64>,
    pub draws: Option<i64>,
    pub actor: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideResponse {
    pub before: WireImage,
    pub after: WireImage,
}

pub async fn override_rating(
    State(state): State<AppState>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<OverrideResponse>, AppError> {
    let kind = parse_kind(&req.kind)?;
    let changes = RatingOverride {
        mu: req.mu,
        sigma: req.sigma,
        elo: req.elo,
        wins: req.wins,
        losses: req.losses,
        draws: req.draws,
    };
    let report = state
        .service
        .override_rating(kind, &req.id, changes, Actor::new(req.actor), req.reason)
        .await?;
    Ok(Json(OverrideResponse {
        before: report.before.into(),
        after: report.after.into(),
    }))
}
