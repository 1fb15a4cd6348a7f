// src/models/scan.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::inventory::Scope;

/// Modos de scan aceitos. `putaway` foi aposentado e é rejeitado
/// com FEATURE_DISABLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Receive,
    Pick,
    Count,
}

impl ScanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanMode::Receive => "receive",
            ScanMode::Pick => "pick",
            ScanMode::Count => "count",
        }
    }
}

/// Payload bruto de um scan vindo do coletor. Os campos explícitos
/// preenchem lacunas do que foi extraído do barcode, nunca o contrário.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[schema(example = "ITM:42 QTY:5 B:L2025-09 WH:1")]
    pub barcode: Option<String>,
    /// receive | pick | count (default: count)
    pub mode: Option<String>,
    /// true ⇒ pré-voo: executa e desfaz (SAVEPOINT), nada é persistido.
    #[serde(default)]
    pub probe: bool,
    pub device_id: Option<String>,
    /// Timestamp ISO do coletor; entra no scan_ref truncado ao minuto.
    pub ts: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    pub item_id: Option<i64>,
    pub qty: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub batch_code: Option<String>,
    pub production_date: Option<String>,
    pub expiry_date: Option<String>,
    pub task_line_id: Option<i64>,
}

/// Resultado consolidado das três camadas de resolução
/// (tokens KV → tabela de barcodes → GS1).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedScan {
    pub item_id: Option<i64>,
    pub qty: Option<i64>,
    pub warehouse_id: Option<i64>,
    pub batch_code: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub task_line_id: Option<i64>,
    pub gtin: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanError {
    pub stage: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanEvidence {
    pub source: String,
    pub db: bool,
}

/// Resumo da contagem devolvido junto do resultado do scan (modo count).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CountResult {
    pub item_id: i64,
    pub warehouse_id: i64,
    pub batch_code: Option<String>,
    pub actual: i64,
    pub delta: i64,
    pub before: i64,
    pub after: i64,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Estrutura de retorno uniforme do orquestrador: sucesso ou não,
/// o chamador sempre recebe scan_ref + evidências + erros.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub ok: bool,
    pub committed: bool,
    #[schema(example = "scan:dev:2026-08-01T12:00:ITM:42 QTY:5")]
    pub scan_ref: String,
    pub event_id: Option<i64>,
    pub source: Option<String>,
    pub evidence: Vec<ScanEvidence>,
    pub errors: Vec<ScanError>,
    pub item_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<CountResult>,
}

impl ScanOutcome {
    pub fn failure(scan_ref: String, stage: &str, error: String) -> Self {
        Self {
            ok: false,
            committed: false,
            scan_ref,
            event_id: None,
            source: None,
            evidence: Vec::new(),
            errors: vec![ScanError {
                stage: stage.to_string(),
                error,
            }],
            item_id: None,
            count: None,
        }
    }
}
