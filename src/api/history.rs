//! Undo/redo and the audit trail.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::games::parse_kind;
use crate::api::{AppState, WireImage};
use crate::domain::{Actor, AuditEntry};
use crate::error::AppError;

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRequest {
    pub actor: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResponse {
    /// Description of the reversed operation, or null when the stack is empty.
    pub undone: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedoResponse {
    pub redone: Option<String>,
}

pub async fn undo(
    State(state): State<AppState>,
    Json(req): Json<HistoryRequest>,
) -> Result<Json<UndoResponse>, AppError> {
    let undone = state.service.undo(Actor::new(req.actor)).await?;
    Ok(Json(UndoResponse { undone }))
}

pub async fn redo(
    State(state): State<AppState>,
    Json(req): Json<HistoryRequest>,
) -> Result<Json<RedoResponse>, AppError> {
    let redone = state.service.redo(Actor::new(req.actor)).await?;
    Ok(Json(RedoResponse { redone }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    /// "player" or "deck".
    pub kind: String,
    pub target_id: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    pub target_kind: String,
    pub target_id: String,
    pub change_kind: String,
    pub before: WireImage,
    pub after: WireImage,
    pub actor: String,
    pub params: serde_json::Value,
    pub created_at: i64,
}

impl From<AuditEntry> for AuditResponse {
    fn from(entry: AuditEntry) -> Self {
        AuditResponse {
            target_kind: entry.target_kind.as_str().to_string(),
            target_id: entry.target_id,
            change_kind: entry.change_kind.as_str().to_string(),
            before: entry.before.into(),
            after: entry.after.into(),
            actor: entry.actor.as_str().to_string(),
            params: entry.params,
            created_at: entry.created_at.as_ms(),
        }
    }
}

pub async fn get_audit(
    State(state): State<AppState>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditResponse>>, AppError> {
    let kind = parse_kind(&params.kind)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    let entries = state
        .service
        .audit_history(kind, &params.target_id, limit)
        .await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}
