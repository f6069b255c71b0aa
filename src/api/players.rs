//! Player detail and default-deck endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::history::AuditResponse;
use crate::api::{AppState, WireImage};
use crate::domain::{Actor, DeckName, EntityKind, PlayerId, PlayerRecord};
use crate::error::AppError;

const RECENT_CHANGES: i64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    pub id: String,
    #[serde(flatten)]
    pub image: WireImage,
    pub games_played: i64,
    pub last_active: Option<i64>,
    pub decay_steps: i64,
    pub default_deck: Option<String>,
    pub recent_changes: Vec<AuditResponse>,
}

impl PlayerResponse {
    fn new(player: PlayerRecord, recent_changes: Vec<AuditResponse>) -> Self {
        let games_played = player.wins + player.losses + player.draws;
        PlayerResponse {
            id: player.id.as_str().to_string(),
            image: player.image().into(),
            games_played,
            last_active: player.last_active.map(|t| t.as_ms()),
            decay_steps: player.decay_steps,
            default_deck: player.default_deck.map(|d| d.as_str().to_string()),
            recent_changes,
        }
    }
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlayerResponse>, AppError> {
    let player_id = PlayerId::new(id.clone());
    let (player, history) = futures::try_join!(
        state.service.get_player(&player_id),
        state
            .service
            .audit_history(EntityKind::Player, &id, RECENT_CHANGES),
    )?;

    let player = player.ok_or_else(|| AppError::NotFound(format!("player {}", id)))?;
    let recent = history.into_iter().map(Into::into).collect();
    Ok(Json(PlayerResponse::new(player, recent)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultDeckRequest {
    /// `null` clears the default.
    pub deck: Option<String>,
    /// Also rewrite the player's past unassigned seats to this deck.
    #[serde(default)]
    pub retroactive: bool,
    pub actor: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultDeckResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub async fn set_default_deck(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DefaultDeckRequest>,
) -> Result<Json<DefaultDeckResponse>, AppError> {
    let warning = state
        .service
        .set_default_deck(
            &PlayerId::new(id),
            req.deck.map(DeckName::new),
            req.retroactive,
            Actor::new(req.actor),
        )
        .await?;
    Ok(Json(DefaultDeckResponse { ok: true, warning }))
}
