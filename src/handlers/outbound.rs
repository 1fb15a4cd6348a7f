// src/handlers/outbound.rs

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::ApiError,
    config::AppState,
    models::{
        documents::{ShipLine, ShipOutcome},
        inventory::Scope,
    },
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipCommitPayload {
    #[serde(default)]
    pub scope: Scope,

    #[validate(length(min = 1, message = "orderId é obrigatório."))]
    pub order_id: String,

    #[validate(length(min = 1, message = "o pedido precisa de pelo menos uma linha."))]
    pub lines: Vec<ShipLine>,

    pub occurred_at: Option<DateTime<Utc>>,
    pub trace_id: Option<String>,
}

/// Commit de saída de pedido. Linha com lote baixa direto; sem lote a
/// decomposição é FEFO. Insuficiência vira status por linha — a UI
/// renderiza "N de M atendidas" sem perder o resto do pedido.
#[utoipa::path(
    post,
    path = "/api/outbound/commit",
    request_body = ShipCommitPayload,
    responses(
        (status = 200, description = "Resultado por linha (OK / INSUFFICIENT / REJECTED)", body = ShipOutcome),
        (status = 422, description = "Payload inválido", body = ApiError)
    ),
    tag = "outbound"
)]
pub async fn commit_outbound(
    State(state): State<AppState>,
    Json(payload): Json<ShipCommitPayload>,
) -> Result<Json<ShipOutcome>, ApiError> {
    payload.validate()?;

    // Todo commit carrega um trace; sem o do chamador, geramos um.
    let trace_id = payload
        .trace_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let outcome = state
        .outbound_service
        .commit(
            &state.db_pool,
            payload.scope,
            &payload.order_id,
            &payload.lines,
            payload.occurred_at,
            Some(trace_id),
        )
        .await?;

    Ok(Json(outcome))
}
