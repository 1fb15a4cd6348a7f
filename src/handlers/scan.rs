// src/handlers/scan.rs

use axum::{extract::State, Json};

use crate::{
    config::AppState,
    models::scan::{ScanOutcome, ScanRequest},
};

/// Ingestão de um scan de coletor (receive / pick / count).
///
/// Sempre responde 200 com `ok` indicando o desfecho: o coletor precisa
/// de uma resposta renderizável mesmo quando a operação falhou.
#[utoipa::path(
    post,
    path = "/api/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "Resultado do scan (ok=false carrega errors)", body = ScanOutcome)
    ),
    tag = "scan"
)]
pub async fn ingest_scan(
    State(state): State<AppState>,
    Json(payload): Json<ScanRequest>,
) -> Json<ScanOutcome> {
    let outcome = state.scan_orchestrator.ingest(&state.db_pool, payload).await;
    Json(outcome)
}
