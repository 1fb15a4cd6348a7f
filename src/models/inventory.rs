// src/models/inventory.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Chave reservada que representa o slot "sem lote" nas restrições de
/// unicidade (batch_code_key = COALESCE(batch_code, '__NULL_BATCH__')).
pub const NULL_BATCH_KEY: &str = "__NULL_BATCH__";

// --- Enums (Mapeamento do Postgres) ---

/// Escopo dos dados: PROD (operação) e DRILL (treinamento/simulação).
/// Os dois mundos são completamente isolados; toda chave carrega o scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "stock_scope", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    #[default]
    Prod,
    Drill,
}

/// Família canônica de motivos, gravada como texto ao lado do motivo bruto
/// (o bruto fica para leitura humana; a família para agregação).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCanon {
    Receipt,
    Shipment,
    Adjustment,
}

impl ReasonCanon {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCanon::Receipt => "RECEIPT",
            ReasonCanon::Shipment => "SHIPMENT",
            ReasonCanon::Adjustment => "ADJUSTMENT",
        }
    }

    /// Normaliza um motivo bruto para a família canônica.
    /// Motivos desconhecidos ficam sem família (coluna NULL).
    pub fn from_raw(raw: &str) -> Option<Self> {
        let r = raw.trim().to_uppercase();
        match r.as_str() {
            "RECEIPT" | "INBOUND" | "RECEIVE" | "RETURN" | "RETURN_IN" | "RETURN_CUSTOMER"
            | "RMA_IN" => Some(ReasonCanon::Receipt),
            "SHIPMENT" | "SHIP" | "OUTBOUND" | "OUTBOUND_SHIP" | "OUTBOUND_COMMIT"
            | "DISPATCH" | "RETURN_OUT" | "RTV" => Some(ReasonCanon::Shipment),
            "ADJUSTMENT" | "ADJUST" | "COUNT" | "PICK" | "PACK" | "SCRAP" | "CORRECT"
            | "MANUAL_ADJUST" => Some(ReasonCanon::Adjustment),
            _ => None,
        }
    }
}

// --- Helpers de batch_code ---

/// Normaliza um batch_code vindo de fora: remove espaços, e trata
/// "" e "None" (upstream que fez str(None)) como ausência de lote.
pub fn norm_batch_code(v: Option<&str>) -> Option<String> {
    let s = v?.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("none") {
        return None;
    }
    Some(s.to_string())
}

/// Chave estável para participar de unicidade / lookups com NULL.
pub fn batch_key(bc: Option<&str>) -> String {
    match bc {
        Some(s) => s.to_string(),
        None => NULL_BATCH_KEY.to_string(),
    }
}

// --- Structs Principais ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    #[schema(example = "SKU-001")]
    pub sku: String,
    #[schema(example = "Leite em pó 400g")]
    pub name: String,
    /// Itens com validade exigem batch_code em todo ajuste não nulo.
    pub has_shelf_life: bool,
    pub shelf_life_value: Option<i32>,
    pub shelf_life_unit: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    pub id: i64,
    pub warehouse_id: i64,
    pub item_id: i64,
    #[schema(example = "L2025-09")]
    pub batch_code: String,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Saldo autoritativo de um slot (scope, warehouse, item, batch_code_key).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockSlot {
    pub id: i64,
    pub scope: Scope,
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub batch_code_key: String,
    #[schema(example = "42")]
    pub qty: i64,
}

/// Uma linha do razão de movimentos (imutável depois de gravada).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: i64,
    pub scope: Scope,
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub batch_code_key: String,
    #[schema(example = "RECEIPT")]
    pub reason: String,
    pub reason_canon: Option<String>,
    pub sub_reason: Option<String>,
    #[sqlx(rename = "ref")]
    #[serde(rename = "ref")]
    pub ref_doc: String,
    pub ref_line: i32,
    pub delta: i64,
    pub after_qty: i64,
    pub occurred_at: DateTime<Utc>,
    pub trace_id: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRow {
    pub scope: Scope,
    pub snapshot_date: NaiveDate,
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub qty_on_hand: i64,
    pub qty_available: i64,
}

// --- Primitiva de ajuste (entrada/saída) ---

/// Parâmetros do ajuste de saldo. `reason` é o motivo bruto; a família
/// canônica é derivada na gravação do razão.
#[derive(Debug, Clone)]
pub struct StockAdjustment {
    pub scope: Scope,
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub delta: i64,
    pub reason: String,
    pub ref_doc: String,
    pub ref_line: i32,
    pub occurred_at: DateTime<Utc>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub trace_id: Option<String>,
    pub meta: AdjustMeta,
}

/// Flags de negócio do ajuste. `allow_zero_delta_ledger` + `sub_reason`
/// liberam o registro de eventos de confirmação (delta = 0).
#[derive(Debug, Clone, Default)]
pub struct AdjustMeta {
    pub allow_zero_delta_ledger: bool,
    pub sub_reason: Option<String>,
}

impl AdjustMeta {
    pub fn sub_reason(s: &str) -> Self {
        Self {
            allow_zero_delta_ledger: false,
            sub_reason: Some(s.to_string()),
        }
    }
}

/// Resultado de um ajuste. `applied = false` com `idempotent = true`
/// significa replay da mesma impressão digital (nenhum I/O de saldo).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustOutcome {
    pub stock_id: Option<i64>,
    pub before: i64,
    pub after: i64,
    pub delta: i64,
    pub applied: bool,
    pub idempotent: bool,
    /// batch_code efetivamente usado na chave (já normalizado).
    pub batch_code: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

impl AdjustOutcome {
    /// Replay / no-op: nada foi lido nem escrito.
    pub fn idempotent(batch_code: Option<String>) -> Self {
        Self {
            stock_id: None,
            before: 0,
            after: 0,
            delta: 0,
            applied: false,
            idempotent: true,
            batch_code,
            production_date: None,
            expiry_date: None,
        }
    }
}

// --- Efeitos e verificação dos três livros ---

/// Contribuição de um workflow para o verificador pós-commit:
/// o delta alegado para uma chave + a linha de razão que o sustenta.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Effect {
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub qty_delta: i64,
    #[serde(rename = "ref")]
    pub ref_doc: String,
    pub ref_line: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MissingLedger {
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    #[serde(rename = "ref")]
    pub ref_doc: String,
    pub ref_line: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeltaMismatch {
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    #[serde(rename = "ref")]
    pub ref_doc: String,
    pub ref_line: i32,
    pub expected_delta: i64,
    pub ledger_delta: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshotMismatch {
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub stocks_qty: i64,
    pub snapshot_qty: i64,
    pub expected_delta_sum: i64,
    pub snapshot_date: NaiveDate,
}

/// Diagnóstico completo de uma violação dos três livros.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreeBooksReport {
    pub missing_ledger: Vec<MissingLedger>,
    pub delta_mismatch: Vec<DeltaMismatch>,
    pub stock_vs_snapshot: Vec<StockSnapshotMismatch>,
}

impl ThreeBooksReport {
    pub fn is_clean(&self) -> bool {
        self.missing_ledger.is_empty()
            && self.delta_mismatch.is_empty()
            && self.stock_vs_snapshot.is_empty()
    }
}

// --- Leituras de apoio (painéis / conferência) ---

/// Σqty de stocks, Σdelta do razão e Σ do snapshot, para painéis de sanidade.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ThreeBooksSummary {
    pub sum_stocks: i64,
    pub sum_ledger: i64,
    pub sum_snapshot_on_hand: i64,
    pub sum_snapshot_available: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileRow {
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub batch_code_key: String,
    pub stock_qty: i64,
    pub ledger_qty: i64,
    pub diff: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReasonStat {
    pub reason: String,
    pub count: i64,
    pub total_delta: i64,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTrendPoint {
    pub snapshot_date: NaiveDate,
    pub qty_on_hand: i64,
    pub qty_available: i64,
}
