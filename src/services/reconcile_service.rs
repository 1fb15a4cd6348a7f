// src/services/reconcile_service.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Acquire, Postgres};
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::{ledger_repo::NewLedgerEntry, LedgerRepository},
    models::inventory::{ReconcileRow, Scope},
};

const OPEN_REASON: &str = "ADJUSTMENT";
const OPEN_SUB_REASON: &str = "OPENING_BALANCE";

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpeningBackfillOutcome {
    pub inserted: i64,
    pub skipped: i64,
    pub rows: Vec<ReconcileRow>,
}

/// Conferência de livros — só diagnóstico em regime normal.
///
/// - diff_ledger_vs_stocks: chaves onde Σdelta ≠ stocks.qty;
/// - opening_balance_backfill: costura de virada de sistema — uma linha
///   ADJUSTMENT/OPENING_BALANCE por chave divergente, datada da época,
///   fazendo razão e stocks concordarem. Roda uma vez no cutover; o
///   resto da vida ninguém conserta nada automaticamente.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileService {
    ledger: LedgerRepository,
}

impl ReconcileService {
    pub fn new(ledger: LedgerRepository) -> Self {
        Self { ledger }
    }

    pub async fn diff_ledger_vs_stocks<'a, A>(
        &self,
        db: A,
        scope: Scope,
        time_from: Option<DateTime<Utc>>,
        time_to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ReconcileRow>, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut conn = db.acquire().await?;
        self.ledger
            .diff_vs_stocks(&mut conn, scope, time_from, time_to)
            .await
    }

    /// Escreve a linha de abertura por chave divergente. O saldo de
    /// stocks não muda — ele é a verdade; o razão é que se alinha.
    /// Idempotente: ref OPEN:{wh}:{item}:{batch_code_key} por chave.
    pub async fn opening_balance_backfill<'a, A>(
        &self,
        db: A,
        scope: Scope,
    ) -> Result<OpeningBackfillOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut tx = db.begin().await?;

        let rows = self
            .ledger
            .diff_vs_stocks(&mut tx, scope, None, None)
            .await?;

        let epoch = DateTime::<Utc>::UNIX_EPOCH;
        let mut inserted = 0i64;
        let mut skipped = 0i64;

        for row in &rows {
            let ref_doc = format!(
                "OPEN:{}:{}:{}",
                row.warehouse_id, row.item_id, row.batch_code_key
            );

            let id = self
                .ledger
                .write(
                    &mut tx,
                    &NewLedgerEntry {
                        scope,
                        warehouse_id: row.warehouse_id,
                        item_id: row.item_id,
                        batch_code: row.batch_code.clone(),
                        reason: OPEN_REASON.to_string(),
                        sub_reason: Some(OPEN_SUB_REASON.to_string()),
                        ref_doc,
                        ref_line: 1,
                        delta: row.diff,
                        after_qty: row.stock_qty,
                        occurred_at: epoch,
                        trace_id: None,
                        production_date: None,
                        expiry_date: None,
                    },
                )
                .await?;

            if id > 0 {
                inserted += 1;
            } else {
                skipped += 1;
            }
        }

        tx.commit().await?;

        tracing::info!(inserted, skipped, "backfill de saldo de abertura concluído");

        Ok(OpeningBackfillOutcome {
            inserted,
            skipped,
            rows,
        })
    }
}
