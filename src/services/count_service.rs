// src/services/count_service.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    db::{ItemRepository, StockRepository},
    models::{
        inventory::{norm_batch_code, AdjustMeta, Effect, Scope, StockAdjustment},
        scan::CountResult,
    },
    services::{stock_service::StockService, three_books::ThreeBooksEnforcer},
};

const REASON_COUNT: &str = "COUNT";
const SUB_REASON_COUNT_ADJUST: &str = "COUNT_ADJUST";
const SUB_REASON_COUNT_CONFIRM: &str = "COUNT_CONFIRM";

/// Parâmetros de uma contagem dirigida por scan.
#[derive(Debug, Clone)]
pub struct CountCommand {
    pub scope: Scope,
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub actual: i64,
    pub ref_doc: String,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub trace_id: Option<String>,
}

/// Contagem na granularidade (scope, warehouse, item, lote):
/// - actual == atual ⇒ linha de confirmação com delta 0 (COUNT_CONFIRM);
/// - divergência ⇒ ADJUSTMENT com delta = actual − atual (COUNT_ADJUST);
/// - sobra de contagem é entrada: item com validade exige datas.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountService {
    items: ItemRepository,
    stocks: StockRepository,
    stock_svc: StockService,
    enforcer: ThreeBooksEnforcer,
}

impl CountService {
    pub fn new(
        items: ItemRepository,
        stocks: StockRepository,
        stock_svc: StockService,
        enforcer: ThreeBooksEnforcer,
    ) -> Self {
        Self {
            items,
            stocks,
            stock_svc,
            enforcer,
        }
    }

    /// Roda dentro da transação do chamador (orquestrador de scan ou
    /// endpoint de manutenção); não faz commit.
    pub async fn handle_count(
        &self,
        conn: &mut PgConnection,
        cmd: CountCommand,
    ) -> Result<CountResult, AppError> {
        if cmd.actual < 0 {
            return Err(AppError::InvalidInput(
                "quantidade contada não pode ser negativa".into(),
            ));
        }
        if cmd.warehouse_id <= 0 {
            return Err(AppError::InvalidInput(
                "contagem exige warehouse_id explícito".into(),
            ));
        }

        let requires_batch = self.items.requires_batch(conn, cmd.item_id).await?;
        let batch_code = norm_batch_code(cmd.batch_code.as_deref());
        if requires_batch && batch_code.is_none() {
            return Err(AppError::BatchRequired {
                item_id: cmd.item_id,
            });
        }

        // Saldo atual sob trava de linha; slot inexistente conta como 0.
        let current = self
            .stocks
            .lock_slot(
                conn,
                cmd.scope,
                cmd.warehouse_id,
                cmd.item_id,
                batch_code.as_deref(),
            )
            .await?
            .map_or(0, |slot| slot.qty);

        let delta = cmd.actual - current;

        // Sobra = entrada: item controlado precisa de pelo menos uma data.
        if delta > 0
            && requires_batch
            && cmd.production_date.is_none()
            && cmd.expiry_date.is_none()
        {
            return Err(AppError::InvalidInput(
                "sobra de contagem é entrada: informe production_date ou expiry_date".into(),
            ));
        }

        let meta = if delta == 0 {
            AdjustMeta {
                allow_zero_delta_ledger: true,
                sub_reason: Some(SUB_REASON_COUNT_CONFIRM.to_string()),
            }
        } else {
            AdjustMeta::sub_reason(SUB_REASON_COUNT_ADJUST)
        };

        let outcome = self
            .stock_svc
            .adjust(
                conn,
                StockAdjustment {
                    scope: cmd.scope,
                    warehouse_id: cmd.warehouse_id,
                    item_id: cmd.item_id,
                    batch_code: batch_code.clone(),
                    delta,
                    reason: REASON_COUNT.to_string(),
                    ref_doc: cmd.ref_doc.clone(),
                    ref_line: 1,
                    occurred_at: Utc::now(),
                    production_date: cmd.production_date,
                    expiry_date: cmd.expiry_date,
                    trace_id: cmd.trace_id.clone(),
                    meta,
                },
            )
            .await?;

        let at: DateTime<Utc> = Utc::now();
        self.enforcer
            .enforce(
                conn,
                cmd.scope,
                &cmd.ref_doc,
                &[Effect {
                    warehouse_id: cmd.warehouse_id,
                    item_id: cmd.item_id,
                    batch_code: outcome.batch_code.clone(),
                    qty_delta: delta,
                    ref_doc: cmd.ref_doc.clone(),
                    ref_line: 1,
                    reason: Some(REASON_COUNT.to_string()),
                }],
                at,
            )
            .await?;

        Ok(CountResult {
            item_id: cmd.item_id,
            warehouse_id: cmd.warehouse_id,
            batch_code: outcome.batch_code,
            actual: cmd.actual,
            delta,
            before: current,
            after: current + delta,
            production_date: outcome.production_date,
            expiry_date: outcome.expiry_date,
        })
    }
}
