//! Provider connection endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use hachi_core::sync::{self, IntegrationStatus};

use crate::AppState;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct WorkspaceQuery {
    workspace_id: String,
}

#[derive(Serialize)]
pub struct Disconnected {
    was_connected: bool,
}

pub async fn status(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<WorkspaceQuery>,
) -> ApiResult<Json<IntegrationStatus>> {
    let status = sync::integration_status(&state.db, &provider, &query.workspace_id).await?;
    Ok(Json(status))
}

pub async fn disconnect(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<WorkspaceQuery>,
) -> ApiResult<Json<Disconnected>> {
    let was_connected = sync::disconnect(&state.db, &provider, &query.workspace_id).await?;
    Ok(Json(Disconnected { was_connected }))
}
