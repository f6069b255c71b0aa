//! Deck archetype detail endpoint.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use crate::api::history::AuditResponse;
use crate::api::{AppState, WireImage};
use crate::domain::{DeckName, DeckRecord, EntityKind};
use crate::error::AppError;

const RECENT_CHANGES: i64 = 10;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckResponse {
    pub name: String,
    #[serde(flatten)]
    pub image: WireImage,
    pub games_played: i64,
    pub recent_changes: Vec<AuditResponse>,
}

impl DeckResponse {
    fn new(deck: DeckRecord, recent_changes: Vec<AuditResponse>) -> Self {
        let games_played = deck.wins + deck.losses + deck.draws;
        DeckResponse {
            name: deck.name.as_str().to_string(),
            image: deck.image().into(),
            games_played,
            recent_changes,
        }
    }
}

pub async fn get_deck(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<DeckResponse>, AppError> {
    let deck_name = DeckName::new(name.clone());
    let (deck, history) = futures::try_join!(
        state.service.get_deck(&deck_name),
        state
            .service
            .audit_history(EntityKind::Deck, &name, RECENT_CHANGES),
    )?;

    let deck = deck.ok_or_else(|| AppError::NotFound(format!("deck {}", name)))?;
    let recent = history.into_iter().map(Into::into).collect();
    Ok(Json(DeckResponse::new(deck, recent)))
}
