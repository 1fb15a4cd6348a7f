// src/handlers/snapshot.rs

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    common::error::ApiError,
    config::AppState,
    models::inventory::{Scope, SnapshotRow, SnapshotTrendPoint, ThreeBooksSummary},
};

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshotPayload {
    #[serde(default)]
    pub scope: Scope,
    /// Omitido = hoje (reconstrução a partir de stocks). Dia passado =
    /// backfill por repasse de deltas do razão.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshotResponse {
    pub rows: u64,
}

#[utoipa::path(
    post,
    path = "/api/snapshot/run",
    request_body = RunSnapshotPayload,
    responses((status = 200, body = RunSnapshotResponse)),
    tag = "snapshot"
)]
pub async fn run_snapshot(
    State(state): State<AppState>,
    Json(payload): Json<RunSnapshotPayload>,
) -> Result<Json<RunSnapshotResponse>, ApiError> {
    let mut tx = state.db_pool.begin().await?;

    let rows = match payload.date {
        None => state.snapshot_service.rebuild_today(&mut tx, payload.scope).await?,
        Some(day) => state.snapshot_service.backfill(&mut tx, payload.scope, day).await?,
    };

    tx.commit().await?;

    Ok(Json(RunSnapshotResponse { rows }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ScopeQuery {
    #[serde(default)]
    pub scope: Scope,
}

#[utoipa::path(
    get,
    path = "/api/snapshot/three-books",
    params(ScopeQuery),
    responses((status = 200, description = "Σ de stocks / razão / foto para o painel", body = ThreeBooksSummary)),
    tag = "snapshot"
)]
pub async fn three_books_summary(
    State(state): State<AppState>,
    Query(q): Query<ScopeQuery>,
) -> Result<Json<ThreeBooksSummary>, ApiError> {
    let mut conn = state.db_pool.acquire().await?;
    let summary = state
        .snapshot_service
        .three_books_summary(&mut conn, q.scope)
        .await?;

    Ok(Json(summary))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SnapshotDayQuery {
    #[serde(default)]
    pub scope: Scope,
    pub date: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/snapshot/day",
    params(SnapshotDayQuery),
    responses((status = 200, body = [SnapshotRow])),
    tag = "snapshot"
)]
pub async fn list_snapshot_day(
    State(state): State<AppState>,
    Query(q): Query<SnapshotDayQuery>,
) -> Result<Json<Vec<SnapshotRow>>, ApiError> {
    let mut conn = state.db_pool.acquire().await?;
    let rows = state
        .snapshot_service
        .list_day(&mut conn, q.scope, q.date)
        .await?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TrendQuery {
    #[serde(default)]
    pub scope: Scope,
    pub item_id: i64,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[utoipa::path(
    get,
    path = "/api/snapshot/trends",
    params(TrendQuery),
    responses((status = 200, body = [SnapshotTrendPoint])),
    tag = "snapshot"
)]
pub async fn snapshot_trends(
    State(state): State<AppState>,
    Query(q): Query<TrendQuery>,
) -> Result<Json<Vec<SnapshotTrendPoint>>, ApiError> {
    let mut conn = state.db_pool.acquire().await?;
    let points = state
        .snapshot_service
        .trends(&mut conn, q.scope, q.item_id, q.from, q.to)
        .await?;

    Ok(Json(points))
}
