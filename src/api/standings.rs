//! League standings per entity kind.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::games::parse_kind;
use crate::api::{AppState, WireImage};
use crate::domain::EntityKind;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsQuery {
    /// "player" (default) or "deck".
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StandingsEntry {
    pub rank: i64,
    pub id: String,
    #[serde(flatten)]
    pub image: WireImage,
    pub games_played: i64,
}

pub async fn get_standings(
    State(state): State<AppState>,
    Query(params): Query<StandingsQuery>,
) -> Result<Json<Vec<StandingsEntry>>, AppError> {
    let kind = match params.kind.as_deref() {
        None => EntityKind::Player,
        Some(s) => parse_kind(s)?,
    };

    let entries = match kind {
        EntityKind::Player => state
            .service
            .player_standings()
            .await?
            .into_iter()
            .map(|p| {
                let games_played = p.wins + p.losses + p.draws;
                (p.id.as_str().to_string(), p.image(), games_played)
            })
            .collect::<Vec<_>>(),
        EntityKind::Deck => state
            .service
            .deck_standings()
            .await?
            .into_iter()
            .map(|d| {
                let games_played = d.wins + d.losses + d.draws;
                (d.name.as_str().to_string(), d.image(), games_played)
            })
            .collect::<Vec<_>>(),
    };

    let entries = entries
        .into_iter()
        .enumerate()
        .map(|(idx, (id, image, games_played))| StandingsEntry {
            rank: (idx + 1) as i64,
            id,
            image: image.into(),
            games_played,
        })
        .collect();
    Ok(Json(entries))
}
