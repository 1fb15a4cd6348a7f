// src/models/documents.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::models::inventory::Scope;

// --- Recebimento (documento externo confirmado) ---

/// Linha de um recibo confirmado. O documento em si vive fora do núcleo;
/// aqui chega apenas o payload já aprovado.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptLine {
    pub line_no: i32,
    pub item_id: i64,
    #[schema(example = "10")]
    pub qty: i64,
    pub batch_code: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDoc {
    #[schema(example = "R-2026-0001")]
    pub receipt_no: String,
    pub warehouse_id: i64,
    #[serde(default)]
    pub scope: Scope,
    pub lines: Vec<ReceiptLine>,
}

/// Status por linha devolvido pelos workflows de entrada/saída:
/// insuficiência não derruba as demais linhas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineStatus {
    Ok,
    Insufficient,
    Rejected,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineResult {
    pub item_id: i64,
    pub warehouse_id: i64,
    pub batch_code: Option<String>,
    pub qty: i64,
    pub status: LineStatus,
    pub idempotent: bool,
    pub after: Option<i64>,
    pub error: Option<String>,
}

// --- Saída de pedido (ShipWorkflow) ---

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipLine {
    pub item_id: i64,
    pub warehouse_id: i64,
    /// Lote concreto; ausente ⇒ decomposição FEFO.
    pub batch_code: Option<String>,
    pub qty: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipOutcome {
    pub order_id: String,
    pub total_qty: i64,
    pub committed_lines: i64,
    pub results: Vec<LineResult>,
}

// --- Saída interna (amostra / uso interno / descarte) ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalIssueDoc {
    pub id: i64,
    pub scope: Scope,
    pub warehouse_id: i64,
    #[schema(example = "INT-OUT:WH1:20260801120000")]
    pub doc_no: String,
    pub doc_type: String,
    pub status: String,
    pub recipient_name: String,
    pub recipient_note: Option<String>,
    pub note: Option<String>,
    pub trace_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalIssueLine {
    pub id: i64,
    pub doc_id: i64,
    pub line_no: i32,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub requested_qty: i64,
    pub confirmed_qty: Option<i64>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalIssueDocWithLines {
    #[serde(flatten)]
    pub doc: InternalIssueDoc,
    pub lines: Vec<InternalIssueLine>,
}

// --- Devolução a fornecedor (contra pedido de compra) ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrder {
    pub id: i64,
    pub warehouse_id: i64,
    pub supplier_name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderLine {
    pub id: i64,
    pub po_id: i64,
    pub line_no: i32,
    pub item_id: i64,
    pub qty_ordered: i64,
    pub qty_received: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTask {
    pub id: i64,
    pub scope: Scope,
    pub po_id: Option<i64>,
    pub warehouse_id: i64,
    pub supplier_name: Option<String>,
    pub status: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTaskLine {
    pub id: i64,
    pub task_id: i64,
    pub po_line_id: Option<i64>,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub expected_qty: Option<i64>,
    pub picked_qty: i64,
    pub committed_qty: Option<i64>,
    /// DRAFT enquanto acumula; MATCHED/MISMATCH contra expected_qty;
    /// COMMITTED após a baixa.
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnTaskWithLines {
    #[serde(flatten)]
    pub task: ReturnTask,
    pub lines: Vec<ReturnTaskLine>,
}
