//! Game submission, staging, and per-game metadata edits.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{AppState, WireImage};
use crate::domain::{
    Actor, DeckName, EntityKind, Outcome, ParticipantChange, ParticipantInput, PlayerId,
    SubmissionReport,
};
use crate::error::AppError;
use crate::orchestration::TurnOrderInput;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatRequest {
    pub id: String,
    /// "w", "l", or "d".
    pub outcome: String,
    pub turn_order: Option<i64>,
    pub deck: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitGameRequest {
    /// "player" or "deck".
    pub kind: String,
    pub participants: Vec<SeatRequest>,
    /// Omitted: append. "0": before all history. Otherwise a game id to
    /// inject directly after.
    pub anchor: Option<String>,
    pub submitted_by: String,
    #[serde(default)]
    pub admin_submitted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeResponse {
    pub id: String,
    pub outcome: String,
    pub before: WireImage,
    pub after: WireImage,
}

impl From<ParticipantChange> for ChangeResponse {
    fn from(change: ParticipantChange) -> Self {
        ChangeResponse {
            id: change.id,
            outcome: change.outcome.as_str().to_string(),
            before: change.before.into(),
            after: change.after.into(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResponse {
    pub game_id: i64,
    pub sequence: f64,
    pub participants: Vec<ChangeResponse>,
    pub decks: Vec<ChangeResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<SubmissionReport> for GameResponse {
    fn from(report: SubmissionReport) -> Self {
        GameResponse {
            game_id: report.game_id,
            sequence: report.sequence,
            participants: report.participants.into_iter().map(Into::into).collect(),
            decks: report.decks.into_iter().map(Into::into).collect(),
            warning: report.warning,
        }
    }
}

pub(crate) fn parse_kind(s: &str) -> Result<EntityKind, AppError> {
    EntityKind::parse(s)
        .ok_or_else(|| AppError::BadRequest("kind must be player or deck".to_string()))
}

fn parse_participants(seats: Vec<SeatRequest>) -> Result<Vec<ParticipantInput>, AppError> {
    seats
        .into_iter()
        .map(|s| {
            let outcome = Outcome::parse(&s.outcome)
                .ok_or_else(|| AppError::BadRequest("outcome must be w, l, or d".to_string()))?;
            Ok(ParticipantInput {
                id: s.id,
                outcome,
                turn_order: s.turn_order,
                deck: s.deck,
            })
        })
        .collect()
}

pub async fn submit_game(
    State(state): State<AppState>,
    Json(req): Json<SubmitGameRequest>,
) -> Result<Json<GameResponse>, AppError> {
    let kind = parse_kind(&req.kind)?;
    let participants = parse_participants(req.participants)?;
    let report = state
        .service
        .submit_game(
            kind,
            participants,
            req.anchor,
            Actor::new(req.submitted_by),
            req.admin_submitted,
        )
        .await?;
    Ok(Json(report.into()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagedResponse {
    pub token: Uuid,
}

pub async fn stage_game(
    State(state): State<AppState>,
    Json(req): Json<SubmitGameRequest>,
) -> Result<Json<StagedResponse>, AppError> {
    let kind = parse_kind(&req.kind)?;
    let participants = parse_participants(req.participants)?;
    let token = state
        .service
        .stage_game(
            kind,
            participants,
            req.anchor,
            Actor::new(req.submitted_by),
            req.admin_submitted,
        )
        .await?;
    Ok(Json(StagedResponse { token }))
}

pub async fn confirm_game(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> Result<Json<GameResponse>, AppError> {
    let report = state.service.confirm_game(token).await?;
    Ok(Json(report.into()))
}

pub async fn cancel_game(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.service.cancel_game(token).await?;
    Ok(Json(serde_json::json!({"cancelled": true})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetActiveRequest {
    pub active: bool,
    pub actor: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let warning = state
        .service
        .toggle_game_active(id, req.active, Actor::new(req.actor))
        .await?;
    Ok(Json(EditResponse { ok: true, warning }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOrderRequest {
    pub seats: Vec<TurnOrderSeat>,
    pub actor: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOrderSeat {
    pub id: String,
    pub turn_order: Option<i64>,
}

pub async fn set_turn_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<TurnOrderRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let seats = req
        .seats
        .into_iter()
        .map(|s| TurnOrderInput {
            id: s.id,
            turn_order: s.turn_order,
        })
        .collect();
    state
        .service
        .set_turn_order(id, seats, Actor::new(req.actor))
        .await?;
    Ok(Json(EditResponse {
        ok: true,
        warning: None,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMatchDeckRequest {
    /// `null` clears the assignment.
    pub deck: Option<String>,
    pub actor: String,
}

pub async fn set_match_deck(
    State(state): State<AppState>,
    Path((id, player_id)): Path<(i64, String)>,
    Json(req): Json<SetMatchDeckRequest>,
) -> Result<Json<EditResponse>, AppError> {
    let warning = state
        .service
        .set_match_deck(
            id,
            &PlayerId::new(player_id),
            req.deck.map(DeckName::new),
            Actor::new(req.actor),
        )
        .await?;
    Ok(Json(EditResponse { ok: true, warning }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("player").unwrap(), EntityKind::Player);
        assert_eq!(parse_kind("deck").unwrap(), EntityKind::Deck);
        assert!(parse_kind("team").is_err());
    }

    #[test]
    fn test_parse_participants_rejects_bad_outcome() {
        let seats = vec![SeatRequest {
            id: "u1".into(),
            outcome: "win".into(),
            turn_order: None,
            deck: None,
        }];
        assert!(parse_participants(seats).is_err());
    }

    #[test]
    fn test_parse_participants_maps_fields() {
        let seats = vec![SeatRequest {
            id: "u1".into(),
            outcome: "w".into(),
            turn_order: Some(2),
            deck: Some("burn".into()),
        }];
        let parsed = parse_participants(seats).unwrap();
        assert_eq!(parsed[0].outcome, Outcome::Win);
        assert_eq!(parsed[0].turn_order, Some(2));
        assert_eq!(parsed[0].deck.as_deref(), Some("burn"));
    }
}
