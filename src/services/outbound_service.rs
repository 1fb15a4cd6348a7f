// src/services/outbound_service.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{Acquire, Postgres};

use crate::{
    common::error::AppError,
    db::LedgerRepository,
    models::{
        documents::{LineResult, LineStatus, ShipLine, ShipOutcome},
        inventory::{batch_key, norm_batch_code, AdjustMeta, Effect, Scope, StockAdjustment},
    },
    services::{
        fefo_allocator::FefoAllocator, stock_service::StockService,
        three_books::ThreeBooksEnforcer,
    },
};

const REASON_SHIPMENT: &str = "SHIPMENT";
const SUB_REASON_ORDER_SHIP: &str = "ORDER_SHIP";

/// Saída de pedido (hard contract + idempotência forte):
///
/// - granularidade (warehouse_id, item_id, batch_code|NULL); linhas
///   duplicadas do payload são somadas antes de qualquer baixa;
/// - idempotência por delta total: need = want + Σ(delta<0 já lançado
///   para o ref na chave); replay integral vira no-op por linha;
/// - lote concreto ⇒ uma baixa direta (ref_line = 1); sem lote ⇒
///   decomposição FEFO com ref_line incremental por perna;
/// - insuficiência não derruba o pedido: vira status por linha e as
///   demais continuam;
/// - commit só sobrevive se ledger + stocks + snapshot fecharem nas
///   chaves tocadas.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutboundService {
    stock_svc: StockService,
    fefo: FefoAllocator,
    ledger: LedgerRepository,
    enforcer: ThreeBooksEnforcer,
}

impl OutboundService {
    pub fn new(
        stock_svc: StockService,
        fefo: FefoAllocator,
        ledger: LedgerRepository,
        enforcer: ThreeBooksEnforcer,
    ) -> Self {
        Self {
            stock_svc,
            fefo,
            ledger,
            enforcer,
        }
    }

    pub async fn commit<'a, A>(
        &self,
        db: A,
        scope: Scope,
        order_id: &str,
        lines: &[ShipLine],
        occurred_at: Option<DateTime<Utc>>,
        trace_id: Option<String>,
    ) -> Result<ShipOutcome, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let ts = occurred_at.unwrap_or_else(Utc::now);

        // Agrega por (item, warehouse, lote normalizado).
        let mut agg: BTreeMap<(i64, i64, Option<String>), i64> = BTreeMap::new();
        for line in lines {
            if line.qty <= 0 {
                return Err(AppError::InvalidInput(format!(
                    "pedido {order_id}: linha do item {} com quantidade não positiva",
                    line.item_id
                )));
            }
            let key = (
                line.item_id,
                line.warehouse_id,
                norm_batch_code(line.batch_code.as_deref()),
            );
            *agg.entry(key).or_insert(0) += line.qty;
        }

        if agg.is_empty() {
            return Ok(ShipOutcome {
                order_id: order_id.to_string(),
                total_qty: 0,
                committed_lines: 0,
                results: Vec::new(),
            });
        }

        let mut tx = db.begin().await?;

        let mut results: Vec<LineResult> = Vec::new();
        let mut effects: Vec<Effect> = Vec::new();
        let mut committed = 0i64;
        let mut total_qty = 0i64;

        for ((item_id, warehouse_id, batch_code), want) in agg {
            // Idempotência: quanto este ref já baixou nesta chave?
            // Com lote, a chave fecha no batch_code_key; sem lote, o Σ
            // agrega todas as pernas FEFO do item.
            let ck = batch_code.as_deref().map(|b| batch_key(Some(b)));
            let already = self
                .ledger
                .shipped_total(&mut tx, scope, order_id, item_id, warehouse_id, ck.as_deref())
                .await?;
            let need = want + already; // already é negativo

            if need <= 0 {
                results.push(LineResult {
                    item_id,
                    warehouse_id,
                    batch_code,
                    qty: want,
                    status: LineStatus::Ok,
                    idempotent: true,
                    after: None,
                    error: None,
                });
                continue;
            }

            let line_outcome = match &batch_code {
                // Lote concreto: baixa direta, uma linha de razão.
                Some(code) => {
                    self.stock_svc
                        .adjust(
                            &mut tx,
                            StockAdjustment {
                                scope,
                                warehouse_id,
                                item_id,
                                batch_code: Some(code.clone()),
                                delta: -need,
                                reason: REASON_SHIPMENT.to_string(),
                                ref_doc: order_id.to_string(),
                                ref_line: 1,
                                occurred_at: ts,
                                production_date: None,
                                expiry_date: None,
                                trace_id: trace_id.clone(),
                                meta: AdjustMeta::sub_reason(SUB_REASON_ORDER_SHIP),
                            },
                        )
                        .await
                        .map(|out| {
                            effects.push(Effect {
                                warehouse_id,
                                item_id,
                                batch_code: out.batch_code.clone(),
                                qty_delta: -need,
                                ref_doc: order_id.to_string(),
                                ref_line: 1,
                                reason: Some(REASON_SHIPMENT.to_string()),
                            });
                            (need, out.stock_id.map(|_| out.after))
                        })
                }
                // Sem lote: o alocador decide, mais velho primeiro.
                None => {
                    self.fefo
                        .ship(
                            &mut tx,
                            scope,
                            warehouse_id,
                            item_id,
                            need,
                            REASON_SHIPMENT,
                            order_id,
                            ts,
                            false,
                            1,
                            trace_id.clone(),
                            Some(SUB_REASON_ORDER_SHIP.to_string()),
                        )
                        .await
                        .map(|res| {
                            for leg in &res.legs {
                                effects.push(Effect {
                                    warehouse_id,
                                    item_id,
                                    batch_code: leg.batch_code.clone(),
                                    qty_delta: leg.delta,
                                    ref_doc: order_id.to_string(),
                                    ref_line: leg.ref_line,
                                    reason: Some(REASON_SHIPMENT.to_string()),
                                });
                            }
                            (res.total, None)
                        })
                }
            };

            match line_outcome {
                Ok((shipped, after)) => {
                    committed += 1;
                    total_qty += shipped;
                    results.push(LineResult {
                        item_id,
                        warehouse_id,
                        batch_code,
                        qty: shipped,
                        status: LineStatus::Ok,
                        idempotent: false,
                        after,
                        error: None,
                    });
                }
                // Erros de negócio pré-escrita viram status por linha;
                // falhas de infraestrutura derrubam a transação.
                Err(AppError::InsufficientStock(detail)) => {
                    results.push(LineResult {
                        item_id,
                        warehouse_id,
                        batch_code,
                        qty: need,
                        status: LineStatus::Insufficient,
                        idempotent: false,
                        after: None,
                        error: serde_json::to_string(&detail).ok(),
                    });
                }
                Err(e @ (AppError::BatchRequired { .. } | AppError::DateConsistency { .. })) => {
                    results.push(LineResult {
                        item_id,
                        warehouse_id,
                        batch_code,
                        qty: need,
                        status: LineStatus::Rejected,
                        idempotent: false,
                        after: None,
                        error: Some(e.to_string()),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        self.enforcer
            .enforce(&mut tx, scope, order_id, &effects, ts)
            .await?;

        tx.commit().await?;

        Ok(ShipOutcome {
            order_id: order_id.to_string(),
            total_qty,
            committed_lines: committed,
            results,
        })
    }
}
