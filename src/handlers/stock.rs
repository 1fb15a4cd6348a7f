// src/handlers/stock.rs

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    common::error::ApiError,
    config::AppState,
    db::ledger_repo::LedgerFilter,
    models::inventory::{
        AdjustMeta, AdjustOutcome, Effect, LedgerEntry, ReasonStat, ReconcileRow, Scope,
        StockAdjustment, StockSlot,
    },
    services::reconcile_service::OpeningBackfillOutcome,
};

// =============================================================================
//  AJUSTE MANUAL (manutenção de estoque)
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustPayload {
    #[serde(default)]
    pub scope: Scope,

    #[validate(range(min = 1, message = "warehouseId é obrigatório."))]
    pub warehouse_id: i64,

    #[validate(range(min = 1, message = "itemId é obrigatório."))]
    pub item_id: i64,

    pub batch_code: Option<String>,

    /// Positivo = entrada, negativo = saída, zero = evento de confirmação
    /// (exige allowZeroDeltaLedger + subReason).
    pub delta: i64,

    #[validate(length(min = 1, message = "reason é obrigatório."))]
    pub reason: String,

    #[serde(rename = "ref")]
    #[validate(length(min = 1, message = "ref é obrigatório."))]
    pub ref_doc: String,

    #[serde(default = "default_ref_line")]
    pub ref_line: i32,

    pub occurred_at: Option<DateTime<Utc>>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub trace_id: Option<String>,
    pub sub_reason: Option<String>,
    #[serde(default)]
    pub allow_zero_delta_ledger: bool,
}

fn default_ref_line() -> i32 {
    1
}

/// Ajuste manual: o primitivo + o verificador dos três livros numa
/// transação própria.
#[utoipa::path(
    post,
    path = "/api/stock/adjust",
    request_body = AdjustPayload,
    responses(
        (status = 200, description = "Ajuste aplicado (ou replay idempotente)", body = AdjustOutcome),
        (status = 409, description = "Estoque insuficiente", body = ApiError),
        (status = 422, description = "Lote obrigatório / datas inconsistentes", body = ApiError)
    ),
    tag = "stock"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Json(payload): Json<AdjustPayload>,
) -> Result<Json<AdjustOutcome>, ApiError> {
    payload.validate()?;

    let ts = payload.occurred_at.unwrap_or_else(Utc::now);
    let mut tx = state.db_pool.begin().await?;

    let outcome = state
        .stock_service
        .adjust(
            &mut tx,
            StockAdjustment {
                scope: payload.scope,
                warehouse_id: payload.warehouse_id,
                item_id: payload.item_id,
                batch_code: payload.batch_code.clone(),
                delta: payload.delta,
                reason: payload.reason.clone(),
                ref_doc: payload.ref_doc.clone(),
                ref_line: payload.ref_line,
                occurred_at: ts,
                production_date: payload.production_date,
                expiry_date: payload.expiry_date,
                trace_id: payload.trace_id.clone(),
                meta: AdjustMeta {
                    allow_zero_delta_ledger: payload.allow_zero_delta_ledger,
                    sub_reason: payload.sub_reason.clone(),
                },
            },
        )
        .await?;

    // Replays e no-ops não tocaram nada: não há o que verificar.
    if outcome.applied {
        state
            .enforcer
            .enforce(
                &mut tx,
                payload.scope,
                &payload.ref_doc,
                &[Effect {
                    warehouse_id: payload.warehouse_id,
                    item_id: payload.item_id,
                    batch_code: outcome.batch_code.clone(),
                    qty_delta: payload.delta,
                    ref_doc: payload.ref_doc.clone(),
                    ref_line: payload.ref_line,
                    reason: Some(payload.reason.clone()),
                }],
                ts,
            )
            .await?;
    }

    tx.commit().await?;

    Ok(Json(outcome))
}

// =============================================================================
//  CONSULTAS DE SALDO
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct StockQuery {
    #[serde(default)]
    pub scope: Scope,
    pub warehouse_id: Option<i64>,
    pub item_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/stock",
    params(StockQuery),
    responses((status = 200, body = [StockSlot])),
    tag = "stock"
)]
pub async fn list_stock(
    State(state): State<AppState>,
    Query(q): Query<StockQuery>,
) -> Result<Json<Vec<StockSlot>>, ApiError> {
    let mut conn = state.db_pool.acquire().await?;

    let slots = state
        .stock_repo
        .list_slots(&mut conn, q.scope, q.warehouse_id, q.item_id)
        .await?;

    Ok(Json(slots))
}

// =============================================================================
//  RAZÃO: consulta / estatística / conferência
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/ledger/query",
    request_body = LedgerFilter,
    responses((status = 200, body = [LedgerEntry])),
    tag = "ledger"
)]
pub async fn query_ledger(
    State(state): State<AppState>,
    Json(filter): Json<LedgerFilter>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let mut conn = state.db_pool.acquire().await?;

    let rows = state.ledger_repo.list(&mut conn, &filter).await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummaryResponse {
    pub by_reason: Vec<ReasonStat>,
    pub net_delta: i64,
}

#[utoipa::path(
    post,
    path = "/api/ledger/summary",
    request_body = LedgerFilter,
    responses((status = 200, body = LedgerSummaryResponse)),
    tag = "ledger"
)]
pub async fn summarize_ledger(
    State(state): State<AppState>,
    Json(filter): Json<LedgerFilter>,
) -> Result<Json<LedgerSummaryResponse>, ApiError> {
    let mut conn = state.db_pool.acquire().await?;

    let by_reason = state.ledger_repo.summary(&mut conn, &filter).await?;
    let net_delta = by_reason.iter().map(|s| s.total_delta).sum();

    Ok(Json(LedgerSummaryResponse {
        by_reason,
        net_delta,
    }))
}

#[utoipa::path(
    post,
    path = "/api/ledger/reconcile",
    request_body = LedgerFilter,
    responses((status = 200, description = "Chaves em que Σdelta ≠ stocks.qty", body = [ReconcileRow])),
    tag = "ledger"
)]
pub async fn reconcile_ledger(
    State(state): State<AppState>,
    Json(filter): Json<LedgerFilter>,
) -> Result<Json<Vec<ReconcileRow>>, ApiError> {
    let rows = state
        .reconcile_service
        .diff_ledger_vs_stocks(&state.db_pool, filter.scope, filter.time_from, filter.time_to)
        .await?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ScopeQuery {
    #[serde(default)]
    pub scope: Scope,
}

/// Costura de abertura (cutover): uma linha OPENING_BALANCE por chave
/// divergente, datada da época. Não mexe em stocks.
#[utoipa::path(
    post,
    path = "/api/ledger/opening-backfill",
    params(ScopeQuery),
    responses((status = 200, body = OpeningBackfillOutcome)),
    tag = "ledger"
)]
pub async fn opening_backfill(
    State(state): State<AppState>,
    Query(q): Query<ScopeQuery>,
) -> Result<Json<OpeningBackfillOutcome>, ApiError> {
    let outcome = state
        .reconcile_service
        .opening_balance_backfill(&state.db_pool, q.scope)
        .await?;

    Ok(Json(outcome))
}
