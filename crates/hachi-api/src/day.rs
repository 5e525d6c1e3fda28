//! Day planner endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hachi_core::{Error, Period};
use hachi_core::dayplan::{self, DayView, MonthView};
use hachi_core::models::{DayTask, parse_date};

use crate::AppState;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct AddTask {
    text: String,
}

#[derive(Debug, Deserialize)]
pub struct Toggle {
    done: bool,
}

#[derive(Debug, Deserialize)]
pub struct EditTask {
    text: String,
}

#[derive(Serialize)]
pub struct Ack {
    pub(crate) ok: bool,
}

#[derive(Serialize)]
pub struct Cleared {
    cleared: u64,
}

/// Path ids that are not UUIDs cannot name a stored row.
pub(crate) fn parse_id(kind: &str, id: &str) -> Result<Uuid, Error> {
    Uuid::parse_str(id).map_err(|_| Error::NotFound(format!("{kind} '{id}'")))
}

pub async fn today(State(state): State<AppState>, Path(ws): Path<String>) -> ApiResult<Json<DayView>> {
    Ok(Json(dayplan::today(&state.db, &ws).await?))
}

pub async fn tasks(
    State(state): State<AppState>,
    Path((ws, date)): Path<(String, String)>,
) -> ApiResult<Json<DayView>> {
    let date = parse_date(&date)?;
    Ok(Json(dayplan::day(&state.db, &ws, date).await?))
}

pub async fn add(
    State(state): State<AppState>,
    Path((ws, date)): Path<(String, String)>,
    Json(body): Json<AddTask>,
) -> ApiResult<(StatusCode, Json<DayTask>)> {
    let date = parse_date(&date)?;
    let task = dayplan::add_task(&state.db, &ws, date, &body.text).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn toggle(
    State(state): State<AppState>,
    Path((ws, date, id)): Path<(String, String, String)>,
    Json(body): Json<Toggle>,
) -> ApiResult<Json<Ack>> {
    let date = parse_date(&date)?;
    let id = parse_id("task", &id)?;
    dayplan::toggle_task(&state.db, &ws, date, id, body.done).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn edit(
    State(state): State<AppState>,
    Path((ws, date, id)): Path<(String, String, String)>,
    Json(body): Json<EditTask>,
) -> ApiResult<Json<Ack>> {
    let date = parse_date(&date)?;
    let id = parse_id("task", &id)?;
    dayplan::edit_task(&state.db, &ws, date, id, &body.text).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((ws, date, id)): Path<(String, String, String)>,
) -> ApiResult<Json<Ack>> {
    let date = parse_date(&date)?;
    let id = parse_id("task", &id)?;
    dayplan::delete_task(&state.db, &ws, date, id).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn clear_done(
    State(state): State<AppState>,
    Path((ws, date)): Path<(String, String)>,
) -> ApiResult<Json<Cleared>> {
    let date = parse_date(&date)?;
    let cleared = dayplan::clear_done(&state.db, &ws, date).await?;
    Ok(Json(Cleared { cleared }))
}

pub async fn month(
    State(state): State<AppState>,
    Path((ws, period)): Path<(String, String)>,
) -> ApiResult<Json<MonthView>> {
    let period: Period = period.parse()?;
    Ok(Json(dayplan::month(&state.db, &ws, period).await?))
}
