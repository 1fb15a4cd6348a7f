// src/handlers/documents.rs

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::ApiError,
    config::AppState,
    models::{
        documents::{InternalIssueDocWithLines, ReceiptDoc, ReturnTaskWithLines},
        inventory::Scope,
    },
    services::receipt_service::ReceiptOutcome,
};

// =============================================================================
//  RECEBIMENTO (documento confirmado chega pronto)
// =============================================================================

#[utoipa::path(
    post,
    path = "/api/receipts/confirm",
    request_body = ReceiptDoc,
    responses(
        (status = 200, description = "Linhas lançadas e três livros conferidos", body = ReceiptOutcome),
        (status = 422, description = "Documento inválido", body = ApiError)
    ),
    tag = "documents"
)]
pub async fn confirm_receipt(
    State(state): State<AppState>,
    Json(doc): Json<ReceiptDoc>,
) -> Result<Json<ReceiptOutcome>, ApiError> {
    let outcome = state
        .receipt_service
        .confirm(&state.db_pool, &doc, None, Some(Uuid::new_v4().to_string()))
        .await?;

    Ok(Json(outcome))
}

// =============================================================================
//  SAÍDA INTERNA
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInternalIssuePayload {
    #[serde(default)]
    pub scope: Scope,

    #[validate(range(min = 1, message = "warehouseId é obrigatório."))]
    pub warehouse_id: i64,

    #[validate(length(min = 1, message = "docType é obrigatório."))]
    pub doc_type: String,

    #[validate(length(min = 1, message = "recipientName é obrigatório."))]
    pub recipient_name: String,

    pub recipient_note: Option<String>,
    pub note: Option<String>,
    pub trace_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/internal-issues",
    request_body = CreateInternalIssuePayload,
    responses((status = 200, body = InternalIssueDocWithLines)),
    tag = "documents"
)]
pub async fn create_internal_issue(
    State(state): State<AppState>,
    Json(payload): Json<CreateInternalIssuePayload>,
) -> Result<Json<InternalIssueDocWithLines>, ApiError> {
    payload.validate()?;

    let doc = state
        .internal_issue_service
        .create_doc(
            &state.db_pool,
            payload.scope,
            payload.warehouse_id,
            &payload.doc_type,
            &payload.recipient_name,
            payload.recipient_note.as_deref(),
            payload.note.as_deref(),
            payload.trace_id,
        )
        .await?;

    Ok(Json(doc))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertIssueLinePayload {
    #[validate(range(min = 1, message = "itemId é obrigatório."))]
    pub item_id: i64,

    /// Positivo acumula, negativo reduz; o total da linha nunca fica < 0.
    pub qty: i64,

    pub batch_code: Option<String>,
    pub note: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/internal-issues/{id}/lines",
    params(("id" = i64, Path, description = "id do documento")),
    request_body = UpsertIssueLinePayload,
    responses((status = 200, body = InternalIssueDocWithLines)),
    tag = "documents"
)]
pub async fn upsert_internal_issue_line(
    State(state): State<AppState>,
    Path(doc_id): Path<i64>,
    Json(payload): Json<UpsertIssueLinePayload>,
) -> Result<Json<InternalIssueDocWithLines>, ApiError> {
    payload.validate()?;

    let doc = state
        .internal_issue_service
        .upsert_line(
            &state.db_pool,
            doc_id,
            payload.item_id,
            payload.qty,
            payload.batch_code.as_deref(),
            payload.note.as_deref(),
        )
        .await?;

    Ok(Json(doc))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPayload {
    pub occurred_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/api/internal-issues/{id}/confirm",
    params(("id" = i64, Path, description = "id do documento")),
    request_body = ConfirmPayload,
    responses(
        (status = 200, description = "Baixas lançadas e três livros conferidos", body = InternalIssueDocWithLines),
        (status = 409, description = "Documento fora de DRAFT / estoque insuficiente", body = ApiError)
    ),
    tag = "documents"
)]
pub async fn confirm_internal_issue(
    State(state): State<AppState>,
    Path(doc_id): Path<i64>,
    Json(payload): Json<ConfirmPayload>,
) -> Result<Json<InternalIssueDocWithLines>, ApiError> {
    let doc = state
        .internal_issue_service
        .confirm(&state.db_pool, doc_id, payload.occurred_at)
        .await?;

    Ok(Json(doc))
}

#[utoipa::path(
    post,
    path = "/api/internal-issues/{id}/cancel",
    params(("id" = i64, Path, description = "id do documento")),
    responses((status = 200, body = InternalIssueDocWithLines)),
    tag = "documents"
)]
pub async fn cancel_internal_issue(
    State(state): State<AppState>,
    Path(doc_id): Path<i64>,
) -> Result<Json<InternalIssueDocWithLines>, ApiError> {
    let doc = state
        .internal_issue_service
        .cancel(&state.db_pool, doc_id)
        .await?;

    Ok(Json(doc))
}

#[utoipa::path(
    get,
    path = "/api/internal-issues/{id}",
    params(("id" = i64, Path, description = "id do documento")),
    responses((status = 200, body = InternalIssueDocWithLines)),
    tag = "documents"
)]
pub async fn get_internal_issue(
    State(state): State<AppState>,
    Path(doc_id): Path<i64>,
) -> Result<Json<InternalIssueDocWithLines>, ApiError> {
    let doc = state
        .internal_issue_service
        .get(&state.db_pool, doc_id)
        .await?;

    Ok(Json(doc))
}

// =============================================================================
//  DEVOLUÇÃO A FORNECEDOR
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReturnTaskPayload {
    #[serde(default)]
    pub scope: Scope,

    #[validate(range(min = 1, message = "poId é obrigatório."))]
    pub po_id: i64,

    pub warehouse_id: Option<i64>,

    #[serde(default)]
    pub include_zero_received: bool,
}

#[utoipa::path(
    post,
    path = "/api/return-tasks/from-po",
    request_body = CreateReturnTaskPayload,
    responses((status = 200, body = ReturnTaskWithLines)),
    tag = "documents"
)]
pub async fn create_return_task(
    State(state): State<AppState>,
    Json(payload): Json<CreateReturnTaskPayload>,
) -> Result<Json<ReturnTaskWithLines>, ApiError> {
    payload.validate()?;

    let task = state
        .return_service
        .create_for_po(
            &state.db_pool,
            payload.scope,
            payload.po_id,
            payload.warehouse_id,
            payload.include_zero_received,
        )
        .await?;

    Ok(Json(task))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecordPickPayload {
    #[validate(range(min = 1, message = "itemId é obrigatório."))]
    pub item_id: i64,

    pub qty: i64,

    #[validate(length(min = 1, message = "batchCode é obrigatório no pick."))]
    pub batch_code: String,
}

#[utoipa::path(
    post,
    path = "/api/return-tasks/{id}/pick",
    params(("id" = i64, Path, description = "id da tarefa")),
    request_body = RecordPickPayload,
    responses((status = 200, description = "Intenção registrada; estoque intocado", body = ReturnTaskWithLines)),
    tag = "documents"
)]
pub async fn record_return_pick(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(payload): Json<RecordPickPayload>,
) -> Result<Json<ReturnTaskWithLines>, ApiError> {
    payload.validate()?;

    let task = state
        .return_service
        .record_pick(
            &state.db_pool,
            task_id,
            payload.item_id,
            payload.qty,
            &payload.batch_code,
        )
        .await?;

    Ok(Json(task))
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommitReturnPayload {
    pub trace_id: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

#[utoipa::path(
    post,
    path = "/api/return-tasks/{id}/commit",
    params(("id" = i64, Path, description = "id da tarefa")),
    request_body = CommitReturnPayload,
    responses(
        (status = 200, description = "Baixa efetivada (RETURN_OUT) e PO atualizado", body = ReturnTaskWithLines),
        (status = 409, description = "Tarefa fora de DRAFT / estoque insuficiente", body = ApiError)
    ),
    tag = "documents"
)]
pub async fn commit_return_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(payload): Json<CommitReturnPayload>,
) -> Result<Json<ReturnTaskWithLines>, ApiError> {
    let task = state
        .return_service
        .commit(&state.db_pool, task_id, payload.trace_id, payload.occurred_at)
        .await?;

    Ok(Json(task))
}

#[utoipa::path(
    get,
    path = "/api/return-tasks/{id}",
    params(("id" = i64, Path, description = "id da tarefa")),
    responses((status = 200, body = ReturnTaskWithLines)),
    tag = "documents"
)]
pub async fn get_return_task(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
) -> Result<Json<ReturnTaskWithLines>, ApiError> {
    let task = state.return_service.get(&state.db_pool, task_id).await?;
    Ok(Json(task))
}
