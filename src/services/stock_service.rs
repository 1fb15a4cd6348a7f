// src/services/stock_service.rs

use anyhow::anyhow;
use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    db::{
        ledger_repo::NewLedgerEntry, BatchRepository, ItemRepository, LedgerRepository,
        StockRepository,
    },
    models::inventory::{norm_batch_code, AdjustOutcome, StockAdjustment},
    services::expiry,
};

/// Códigos historicamente usados como "lote de mentira". Para itens sem
/// controle de lote eles são normalizados para NULL antes de qualquer
/// escrita (itens controlados nunca chegam aqui com eles validados).
const LEGACY_PLACEHOLDER_CODES: [&str; 3] = ["NOEXP", "NEAR", "FAR"];

/// O ponto único de mutação de saldo. Tudo que mexe em estoque
/// (recebimento, saída, contagem, devolução, uso interno) passa por
/// `adjust`, que grava uma linha de razão e atualiza o slot travado —
/// na mesma transação do chamador. Este serviço nunca faz commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockService {
    items: ItemRepository,
    stocks: StockRepository,
    batches: BatchRepository,
    ledger: LedgerRepository,
}

impl StockService {
    pub fn new(
        items: ItemRepository,
        stocks: StockRepository,
        batches: BatchRepository,
        ledger: LedgerRepository,
    ) -> Self {
        Self {
            items,
            stocks,
            batches,
            ledger,
        }
    }

    /// Ajuste de saldo com idempotência.
    ///
    /// Sequência:
    /// 1. delta == 0 só registra evento de confirmação quando o meta
    ///    autoriza (allow_zero_delta_ledger + sub_reason); fora disso é
    ///    no-op idempotente sem nenhum I/O.
    /// 2. deriva requires_batch do item e normaliza o batch_code
    ///    (placeholders legados viram NULL em item sem lote).
    /// 3. entrada com lote resolve/valida datas (expiry < production falha).
    /// 4. impressão digital já registrada ⇒ replay, nada acontece.
    /// 5. entrada com lote garante o cadastro do lote.
    /// 6. materializa o slot em 0, trava com FOR UPDATE e lê o saldo.
    /// 7. saldo não pode ficar negativo.
    /// 8. grava razão; delta != 0 atualiza o slot.
    pub async fn adjust(
        &self,
        conn: &mut PgConnection,
        args: StockAdjustment,
    ) -> Result<AdjustOutcome, AppError> {
        let sub_reason = args
            .meta
            .sub_reason
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        // delta 0: só passa com o portão do meta completo; senão, no-op.
        if args.delta == 0 && !(args.meta.allow_zero_delta_ledger && sub_reason.is_some()) {
            return Ok(AdjustOutcome::idempotent(norm_batch_code(
                args.batch_code.as_deref(),
            )));
        }

        let requires_batch = self.items.requires_batch(conn, args.item_id).await?;
        let mut batch_code = norm_batch_code(args.batch_code.as_deref());

        // Guarda contra refluxo de lotes falsos históricos.
        if !requires_batch {
            if let Some(code) = &batch_code {
                if LEGACY_PLACEHOLDER_CODES
                    .iter()
                    .any(|p| code.eq_ignore_ascii_case(p))
                {
                    batch_code = None;
                }
            }
        }

        if requires_batch && batch_code.is_none() {
            return Err(AppError::BatchRequired {
                item_id: args.item_id,
            });
        }

        // Datas: só fazem sentido em entrada com lote concreto.
        let mut production_date = args.production_date;
        let mut expiry_date = args.expiry_date;

        if args.delta > 0 && batch_code.is_some() {
            if production_date.is_none() && expiry_date.is_none() {
                production_date = Some(expiry::default_production_date());
            }

            let (p, e) = expiry::resolve_batch_dates_for_item(
                conn,
                &self.items,
                args.item_id,
                production_date,
                expiry_date,
            )
            .await?;
            production_date = p;
            expiry_date = e;

            if let (Some(p), Some(e)) = (production_date, expiry_date) {
                if e < p {
                    return Err(AppError::DateConsistency {
                        production: p,
                        expiry: e,
                    });
                }
            }
        }

        // Slot sem lote não carrega datas, venham de onde vierem.
        if batch_code.is_none() {
            production_date = None;
            expiry_date = None;
        }

        // Idempotência pela impressão digital do razão.
        let replay = self
            .ledger
            .fingerprint_exists(
                conn,
                args.scope,
                args.warehouse_id,
                args.item_id,
                batch_code.as_deref(),
                &args.reason,
                &args.ref_doc,
                args.ref_line,
            )
            .await?;
        if replay {
            return Ok(AdjustOutcome::idempotent(batch_code));
        }

        // Entrada: garante o cadastro do lote (back-fill só de datas NULL).
        if args.delta > 0 {
            if let Some(code) = &batch_code {
                self.batches
                    .ensure(
                        conn,
                        args.warehouse_id,
                        args.item_id,
                        code,
                        production_date,
                        expiry_date,
                    )
                    .await?;
            }
        }

        self.stocks
            .ensure_slot(
                conn,
                args.scope,
                args.warehouse_id,
                args.item_id,
                batch_code.as_deref(),
            )
            .await?;

        let slot = self
            .stocks
            .lock_slot(
                conn,
                args.scope,
                args.warehouse_id,
                args.item_id,
                batch_code.as_deref(),
            )
            .await?
            .ok_or_else(|| {
                AppError::InternalServerError(anyhow!(
                    "slot ausente após upsert: item={} wh={} lote={:?}",
                    args.item_id,
                    args.warehouse_id,
                    batch_code
                ))
            })?;

        let before = slot.qty;
        let after = before + args.delta;
        if after < 0 {
            return Err(AppError::insufficient(
                args.warehouse_id,
                args.item_id,
                batch_code,
                -args.delta,
                before,
            ));
        }

        self.ledger
            .write(
                conn,
                &NewLedgerEntry {
                    scope: args.scope,
                    warehouse_id: args.warehouse_id,
                    item_id: args.item_id,
                    batch_code: batch_code.clone(),
                    reason: args.reason.clone(),
                    sub_reason,
                    ref_doc: args.ref_doc.clone(),
                    ref_line: args.ref_line,
                    delta: args.delta,
                    after_qty: after,
                    occurred_at: args.occurred_at,
                    trace_id: args.trace_id.clone(),
                    production_date,
                    expiry_date,
                },
            )
            .await?;

        if args.delta != 0 {
            self.stocks.bump_qty(conn, slot.id, args.delta).await?;
        }

        Ok(AdjustOutcome {
            stock_id: Some(slot.id),
            before,
            after,
            delta: args.delta,
            applied: true,
            idempotent: false,
            batch_code,
            production_date,
            expiry_date,
        })
    }
}
