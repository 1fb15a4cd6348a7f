// src/services/fefo_allocator.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgConnection;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    db::{stock_repo::FefoCandidate, StockRepository},
    models::inventory::{AdjustMeta, Scope, StockAdjustment},
    services::stock_service::StockService,
};

/// Uma fatia do plano: consumir `qty` do slot `batch_code`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanLeg {
    pub batch_code: Option<String>,
    pub qty: i64,
}

/// Perna executada de um ship: delta negativo + ref_line próprio.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipLeg {
    pub batch_code: Option<String>,
    pub delta: i64,
    pub ref_line: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipResult {
    pub total: i64,
    pub legs: Vec<ShipLeg>,
}

/// Alocador FEFO sobre os slots de (warehouse, item):
/// - expiry_date é o critério de ordenação; NULL vai para o fim;
/// - stock_id desempata de forma determinística;
/// - stocks.qty é a única verdade de quantidade (batches só descreve);
/// - consistência forte: FOR UPDATE nos slots durante plan + pernas.
///
/// O chamador controla a transação; plan e ship rodam dentro dela.
#[derive(Debug, Clone, Copy, Default)]
pub struct FefoAllocator {
    stocks: StockRepository,
    stock_svc: StockService,
}

/// Ordena por (expiry NULL por último, expiry ASC, stock_id ASC).
fn sort_candidates(rows: &mut [FefoCandidate]) {
    rows.sort_by_key(|r| (r.expiry_date.is_none(), r.expiry_date, r.stock_id));
}

/// Corte guloso da cabeça da fila até zerar a necessidade.
/// Retorna (plano, restante); restante > 0 significa shortage.
fn greedy_slice(rows: &[FefoCandidate], need: i64) -> (Vec<PlanLeg>, i64) {
    let mut remaining = need;
    let mut plan = Vec::new();

    for row in rows {
        if remaining <= 0 {
            break;
        }
        let take = remaining.min(row.qty);
        if take > 0 {
            plan.push(PlanLeg {
                batch_code: row.batch_code.clone(),
                qty: take,
            });
            remaining -= take;
        }
    }

    (plan, remaining)
}

impl FefoAllocator {
    pub fn new(stocks: StockRepository, stock_svc: StockService) -> Self {
        Self { stocks, stock_svc }
    }

    /// Calcula o plano FEFO (leitura + trava). Falha com shortage
    /// estruturado quando a soma dos slots elegíveis não cobre `need`.
    pub async fn plan(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
        need: i64,
        as_of: NaiveDate,
        allow_expired: bool,
    ) -> Result<Vec<PlanLeg>, AppError> {
        let mut rows = self
            .stocks
            .fefo_candidates(conn, scope, warehouse_id, item_id)
            .await?;

        sort_candidates(&mut rows);

        if !allow_expired {
            rows.retain(|r| r.expiry_date.is_none_or(|e| e >= as_of));
        }

        let (plan, remaining) = greedy_slice(&rows, need);
        if remaining > 0 {
            let available = need - remaining;
            return Err(AppError::insufficient(
                warehouse_id,
                item_id,
                None,
                need,
                available,
            ));
        }

        Ok(plan)
    }

    /// Executa o plano: uma perna de razão por lote, ref_line incremental
    /// a partir de `start_ref_line`, em ordem estrita de validade.
    #[allow(clippy::too_many_arguments)]
    pub async fn ship(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
        qty: i64,
        reason: &str,
        ref_doc: &str,
        occurred_at: DateTime<Utc>,
        allow_expired: bool,
        start_ref_line: i32,
        trace_id: Option<String>,
        sub_reason: Option<String>,
    ) -> Result<ShipResult, AppError> {
        let plan = self
            .plan(
                conn,
                scope,
                warehouse_id,
                item_id,
                qty,
                occurred_at.date_naive(),
                allow_expired,
            )
            .await?;

        let mut legs = Vec::with_capacity(plan.len());
        let mut total = 0i64;

        for (idx, leg) in plan.into_iter().enumerate() {
            let ref_line = start_ref_line + idx as i32;

            self.stock_svc
                .adjust(
                    conn,
                    StockAdjustment {
                        scope,
                        warehouse_id,
                        item_id,
                        batch_code: leg.batch_code.clone(),
                        delta: -leg.qty,
                        reason: reason.to_string(),
                        ref_doc: ref_doc.to_string(),
                        ref_line,
                        occurred_at,
                        production_date: None,
                        expiry_date: None,
                        trace_id: trace_id.clone(),
                        meta: AdjustMeta {
                            allow_zero_delta_ledger: false,
                            sub_reason: sub_reason.clone(),
                        },
                    },
                )
                .await?;

            total += leg.qty;
            legs.push(ShipLeg {
                batch_code: leg.batch_code,
                delta: -leg.qty,
                ref_line,
            });
        }

        Ok(ShipResult { total, legs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(stock_id: i64, code: Option<&str>, qty: i64, exp: Option<(i32, u32, u32)>) -> FefoCandidate {
        FefoCandidate {
            stock_id,
            batch_code: code.map(str::to_string),
            qty,
            expiry_date: exp.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
        }
    }

    #[test]
    fn sort_puts_earliest_expiry_first_and_nulls_last() {
        let mut rows = vec![
            cand(3, Some("C"), 30, Some((2025, 2, 1))),
            cand(4, None, 5, None),
            cand(1, Some("A"), 10, Some((2025, 1, 10))),
            cand(2, Some("B"), 20, Some((2025, 1, 20))),
        ];
        sort_candidates(&mut rows);
        let order: Vec<i64> = rows.iter().map(|r| r.stock_id).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn sort_breaks_ties_by_stock_id() {
        let mut rows = vec![
            cand(9, Some("B"), 1, Some((2025, 1, 10))),
            cand(2, Some("A"), 1, Some((2025, 1, 10))),
        ];
        sort_candidates(&mut rows);
        assert_eq!(rows[0].stock_id, 2);
    }

    #[test]
    fn greedy_consumes_head_until_need_is_met() {
        let rows = vec![
            cand(1, Some("A"), 10, Some((2025, 1, 10))),
            cand(2, Some("B"), 20, Some((2025, 1, 20))),
            cand(3, Some("C"), 30, Some((2025, 2, 1))),
        ];

        let (plan, remaining) = greedy_slice(&rows, 4);
        assert_eq!(remaining, 0);
        assert_eq!(plan, vec![PlanLeg { batch_code: Some("A".into()), qty: 4 }]);

        let (plan, remaining) = greedy_slice(&rows, 40);
        assert_eq!(remaining, 0);
        assert_eq!(
            plan.iter().map(|l| l.qty).collect::<Vec<_>>(),
            vec![10, 20, 10]
        );
    }

    #[test]
    fn greedy_reports_shortage_as_remaining() {
        let rows = vec![
            cand(1, Some("A"), 10, Some((2025, 1, 10))),
            cand(2, Some("B"), 20, Some((2025, 1, 20))),
            cand(3, Some("C"), 30, Some((2025, 2, 1))),
        ];
        let (plan, remaining) = greedy_slice(&rows, 100);
        assert_eq!(remaining, 40);
        assert_eq!(plan.len(), 3);
    }
}
