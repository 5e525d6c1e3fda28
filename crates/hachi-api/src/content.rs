//! Wins, references and report endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use hachi_core::models::{Reference, Win};
use hachi_core::references::{self, PREDEFINED_TAGS};
use hachi_core::report::{self, PreviewOptions, ReportPreview};
use hachi_core::wins::{self, NewWin};
use hachi_core::{Error, Period};

use crate::AppState;
use crate::day::{Ack, parse_id};
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct WinsQuery {
    workspace_id: String,
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WorkspaceQuery {
    workspace_id: String,
}

#[derive(Debug, Deserialize)]
pub struct NewReference {
    workspace_id: String,
    url: String,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReferenceUpdate {
    workspace_id: String,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    workspace_id: String,
    period: Period,
    #[serde(flatten)]
    options: PreviewOptions,
}

pub async fn create_win(
    State(state): State<AppState>,
    Json(body): Json<NewWin>,
) -> ApiResult<(StatusCode, Json<Win>)> {
    let win = wins::create_win(&state.db, body).await?;
    Ok((StatusCode::CREATED, Json(win)))
}

pub async fn list_wins(
    State(state): State<AppState>,
    Query(query): Query<WinsQuery>,
) -> ApiResult<Json<Vec<Win>>> {
    Ok(Json(
        wins::list_wins(&state.db, &query.workspace_id, query.limit).await?,
    ))
}

pub async fn create_reference(
    State(state): State<AppState>,
    Json(body): Json<NewReference>,
) -> ApiResult<(StatusCode, Json<Reference>)> {
    if body.workspace_id.trim().is_empty() {
        return Err(Error::Validation("workspace_id is required".to_string()).into());
    }
    let reference =
        references::create_reference(&state.db, &body.workspace_id, &body.url, body.note.as_deref())
            .await?;
    Ok((StatusCode::CREATED, Json(reference)))
}

pub async fn list_references(
    State(state): State<AppState>,
    Query(query): Query<WorkspaceQuery>,
) -> ApiResult<Json<Vec<Reference>>> {
    Ok(Json(state.db.list_references(&query.workspace_id).await?))
}

pub async fn update_reference(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReferenceUpdate>,
) -> ApiResult<Json<Reference>> {
    let id = parse_id("reference", &id)?;
    let reference = references::update_reference(
        &state.db,
        &body.workspace_id,
        id,
        body.note.as_deref(),
        body.tags.as_deref(),
    )
    .await?;
    Ok(Json(reference))
}

pub async fn delete_reference(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<WorkspaceQuery>,
) -> ApiResult<Json<Ack>> {
    let id = parse_id("reference", &id)?;
    state.db.delete_reference(&query.workspace_id, id).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn reference_tags() -> Json<&'static [&'static str]> {
    Json(PREDEFINED_TAGS)
}

pub async fn preview_report(
    State(state): State<AppState>,
    Json(body): Json<PreviewRequest>,
) -> ApiResult<Json<ReportPreview>> {
    let preview = report::preview(&state.db, &body.workspace_id, body.period, body.options).await?;
    Ok(Json(preview))
}
