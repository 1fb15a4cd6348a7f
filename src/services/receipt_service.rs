// src/services/receipt_service.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Acquire, Postgres};
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    models::{
        documents::{LineResult, LineStatus, ReceiptDoc},
        inventory::{AdjustMeta, Effect, StockAdjustment},
    },
    services::{stock_service::StockService, three_books::ThreeBooksEnforcer},
};

const REASON_RECEIPT: &str = "RECEIPT";

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptOutcome {
    pub receipt_no: String,
    pub total_qty: i64,
    pub results: Vec<LineResult>,
}

/// Confirmação de recebimento: uma linha de razão positiva por linha do
/// documento, efeitos coletados e verificados pelos três livros, tudo
/// numa transação só.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiptService {
    stock_svc: StockService,
    enforcer: ThreeBooksEnforcer,
}

impl ReceiptService {
    pub fn new(stock_svc: StockService, enforcer: ThreeBooksEnforcer) -> Self {
        Self { stock_svc, enforcer }
    }

    pub async fn confirm<'a, A>(
        &self,
        db: A,
        doc: &ReceiptDoc,
        occurred_at: Option<DateTime<Utc>>,
        trace_id: Option<String>,
    ) -> Result<ReceiptOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        if doc.lines.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "recibo {} sem linhas",
                doc.receipt_no
            )));
        }
        for line in &doc.lines {
            if line.qty <= 0 {
                return Err(AppError::InvalidInput(format!(
                    "recibo {}: linha {} com quantidade não positiva",
                    doc.receipt_no, line.line_no
                )));
            }
        }

        let mut tx = db.begin().await?;
        let ts = occurred_at.unwrap_or_else(Utc::now);

        let mut effects: Vec<Effect> = Vec::with_capacity(doc.lines.len());
        let mut results: Vec<LineResult> = Vec::with_capacity(doc.lines.len());
        let mut total_qty = 0i64;

        for line in &doc.lines {
            let outcome = self
                .stock_svc
                .adjust(
                    &mut tx,
                    StockAdjustment {
                        scope: doc.scope,
                        warehouse_id: doc.warehouse_id,
                        item_id: line.item_id,
                        batch_code: line.batch_code.clone(),
                        delta: line.qty,
                        reason: REASON_RECEIPT.to_string(),
                        ref_doc: doc.receipt_no.clone(),
                        ref_line: line.line_no,
                        occurred_at: ts,
                        production_date: line.production_date,
                        expiry_date: line.expiry_date,
                        trace_id: trace_id.clone(),
                        meta: AdjustMeta::default(),
                    },
                )
                .await?;

            if outcome.applied {
                total_qty += line.qty;
            }

            effects.push(Effect {
                warehouse_id: doc.warehouse_id,
                item_id: line.item_id,
                batch_code: outcome.batch_code.clone(),
                qty_delta: line.qty,
                ref_doc: doc.receipt_no.clone(),
                ref_line: line.line_no,
                reason: Some(REASON_RECEIPT.to_string()),
            });

            results.push(LineResult {
                item_id: line.item_id,
                warehouse_id: doc.warehouse_id,
                batch_code: outcome.batch_code.clone(),
                qty: line.qty,
                status: LineStatus::Ok,
                idempotent: outcome.idempotent,
                after: outcome.stock_id.map(|_| outcome.after),
                error: None,
            });
        }

        self.enforcer
            .enforce(&mut tx, doc.scope, &doc.receipt_no, &effects, ts)
            .await?;

        tx.commit().await?;

        tracing::info!(
            receipt_no = %doc.receipt_no,
            total_qty,
            lines = results.len(),
            "recebimento confirmado"
        );

        Ok(ReceiptOutcome {
            receipt_no: doc.receipt_no.clone(),
            total_qty,
            results,
        })
    }
}
