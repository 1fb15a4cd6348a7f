// src/services/three_books.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    db::{LedgerRepository, SnapshotRepository, StockRepository},
    models::inventory::{
        batch_key, DeltaMismatch, Effect, MissingLedger, Scope, StockSnapshotMismatch,
        ThreeBooksReport,
    },
    services::snapshot_service::SnapshotService,
};

/// Portão de consistência pós-commit. Roda depois da última mutação de
/// todo workflow que mexeu em estoque:
///
/// 1. regrava a foto do dia;
/// 2. cada efeito declarado precisa ter a sua linha de razão com o delta
///    alegado (delta 0 é legítimo: evento de confirmação);
/// 3. para cada chave tocada, stocks.qty == snapshot(hoje).qty_on_hand.
///
/// Qualquer divergência vira ThreeBooksViolation e derruba a transação.
/// Com primitivas corretas isso nunca dispara — é o cão de guarda, não
/// o único fiador.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeBooksEnforcer {
    ledger: LedgerRepository,
    stocks: StockRepository,
    snapshots: SnapshotRepository,
    snapshot_svc: SnapshotService,
}

impl ThreeBooksEnforcer {
    pub fn new(
        ledger: LedgerRepository,
        stocks: StockRepository,
        snapshots: SnapshotRepository,
        snapshot_svc: SnapshotService,
    ) -> Self {
        Self {
            ledger,
            stocks,
            snapshots,
            snapshot_svc,
        }
    }

    pub async fn enforce(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        ref_doc: &str,
        effects: &[Effect],
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if effects.is_empty() {
            return Ok(());
        }

        let snap_day = at.date_naive();
        self.snapshot_svc.rebuild_day(conn, scope, snap_day).await?;

        let mut report = ThreeBooksReport::default();

        // 2) existência + delta de cada linha de razão declarada
        for e in effects {
            let found = self
                .ledger
                .effect_delta(
                    conn,
                    scope,
                    e.warehouse_id,
                    e.item_id,
                    e.batch_code.as_deref(),
                    &e.ref_doc,
                    e.ref_line,
                    e.reason.as_deref(),
                )
                .await?;

            match found {
                None => report.missing_ledger.push(MissingLedger {
                    warehouse_id: e.warehouse_id,
                    item_id: e.item_id,
                    batch_code: e.batch_code.clone(),
                    ref_doc: e.ref_doc.clone(),
                    ref_line: e.ref_line,
                    reason: e.reason.clone(),
                }),
                Some(delta) if delta != e.qty_delta => {
                    report.delta_mismatch.push(DeltaMismatch {
                        warehouse_id: e.warehouse_id,
                        item_id: e.item_id,
                        batch_code: e.batch_code.clone(),
                        ref_doc: e.ref_doc.clone(),
                        ref_line: e.ref_line,
                        expected_delta: e.qty_delta,
                        ledger_delta: delta,
                    })
                }
                Some(_) => {}
            }
        }

        // 3) stocks == snapshot(hoje) nas chaves tocadas
        let mut expected: BTreeMap<(i64, i64, String), (Option<String>, i64)> = BTreeMap::new();
        for e in effects {
            let key = (
                e.warehouse_id,
                e.item_id,
                batch_key(e.batch_code.as_deref()),
            );
            let entry = expected.entry(key).or_insert((e.batch_code.clone(), 0));
            entry.1 += e.qty_delta;
        }

        for ((warehouse_id, item_id, ck), (batch_code, delta_sum)) in &expected {
            let stocks_qty = self
                .stocks
                .qty_of_key(conn, scope, *warehouse_id, *item_id, ck)
                .await?;
            let snapshot_qty = self
                .snapshots
                .qty_on_hand_of_key(conn, scope, snap_day, *warehouse_id, *item_id, ck)
                .await?;

            if stocks_qty != snapshot_qty {
                report.stock_vs_snapshot.push(StockSnapshotMismatch {
                    warehouse_id: *warehouse_id,
                    item_id: *item_id,
                    batch_code: batch_code.clone(),
                    stocks_qty,
                    snapshot_qty,
                    expected_delta_sum: *delta_sum,
                    snapshot_date: snap_day,
                });
            }
        }

        if report.is_clean() {
            Ok(())
        } else {
            tracing::error!(
                ref_doc,
                ?report,
                "três livros inconsistentes após commit"
            );
            Err(AppError::ThreeBooksViolation(Box::new(report)))
        }
    }
}
