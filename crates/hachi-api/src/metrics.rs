//! KPI catalog, goals, metrics and progress endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

use hachi_core::models::{Goal, Kpi, Metric, MetricPoint, Workspace};
use hachi_core::progress::{self, KpiCard};
use hachi_core::{Error, Period};

use crate::AppState;
use crate::day::Ack;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct GoalBody {
    kpi_id: String,
    period: Period,
    target_value: f64,
    #[serde(default)]
    workspace_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    workspace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachBody {
    kpi_id: String,
}

pub async fn create_workspace(
    State(state): State<AppState>,
    Json(workspace): Json<Workspace>,
) -> ApiResult<(StatusCode, Json<Workspace>)> {
    if workspace.id.trim().is_empty() {
        return Err(Error::Validation("workspace id is required".to_string()).into());
    }
    state.db.create_workspace(&workspace).await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

pub async fn attach_kpi(
    State(state): State<AppState>,
    Path(ws): Path<String>,
    Json(body): Json<AttachBody>,
) -> ApiResult<Json<Ack>> {
    state.db.attach_kpi(&ws, &body.kpi_id).await?;
    Ok(Json(Ack { ok: true }))
}

pub async fn create_kpi(
    State(state): State<AppState>,
    Json(kpi): Json<Kpi>,
) -> ApiResult<(StatusCode, Json<Kpi>)> {
    if kpi.id.trim().is_empty() || kpi.name.trim().is_empty() {
        return Err(Error::Validation("kpi id and name are required".to_string()).into());
    }
    state.db.create_kpi(&kpi).await?;
    Ok((StatusCode::CREATED, Json(kpi)))
}

pub async fn list_kpis(State(state): State<AppState>) -> ApiResult<Json<Vec<Kpi>>> {
    Ok(Json(state.db.list_kpis().await?))
}

pub async fn create_goal(
    State(state): State<AppState>,
    Json(body): Json<GoalBody>,
) -> ApiResult<(StatusCode, Json<Goal>)> {
    let goal = state
        .db
        .create_goal(
            body.workspace_id.as_deref(),
            &body.kpi_id,
            body.period,
            body.target_value,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

pub async fn set_goal(
    State(state): State<AppState>,
    Json(body): Json<GoalBody>,
) -> ApiResult<Json<Goal>> {
    let goal = state
        .db
        .set_goal(
            body.workspace_id.as_deref(),
            &body.kpi_id,
            body.period,
            body.target_value,
        )
        .await?;
    Ok(Json(goal))
}

pub async fn get_goal(
    State(state): State<AppState>,
    Path((kpi_id, period)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Json<Goal>> {
    let period: Period = period.parse()?;
    let goal = state
        .db
        .get_goal(&kpi_id, period, scope.workspace_id.as_deref())
        .await?
        .ok_or_else(|| Error::NotFound(format!("goal for '{kpi_id}' in {period}")))?;
    Ok(Json(goal))
}

pub async fn record_metric(
    State(state): State<AppState>,
    Json(metric): Json<Metric>,
) -> ApiResult<(StatusCode, Json<Metric>)> {
    progress::record_metric(&state.db, &metric).await?;
    Ok((StatusCode::CREATED, Json(metric)))
}

pub async fn kpi_progress(
    State(state): State<AppState>,
    Path((kpi_id, period)): Path<(String, String)>,
    Query(scope): Query<ScopeQuery>,
) -> ApiResult<Json<KpiCard>> {
    let period: Period = period.parse()?;
    let card =
        progress::compute_card(&state.db, &kpi_id, period, scope.workspace_id.as_deref()).await?;
    Ok(Json(card))
}

pub async fn workspace_progress(
    State(state): State<AppState>,
    Path((ws, period)): Path<(String, String)>,
) -> ApiResult<Json<Vec<KpiCard>>> {
    let period: Period = period.parse()?;
    Ok(Json(progress::workspace_month_report(&state.db, &ws, period).await?))
}

pub async fn series(
    State(state): State<AppState>,
    Path((kpi_id, period)): Path<(String, String)>,
) -> ApiResult<Json<Vec<MetricPoint>>> {
    let period: Period = period.parse()?;
    Ok(Json(progress::kpi_month_series(&state.db, &kpi_id, period).await?))
}
