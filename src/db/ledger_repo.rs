// src/db/ledger_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::PgConnection;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    models::inventory::{batch_key, LedgerEntry, ReasonCanon, ReasonStat, Scope},
};

/// Linha nova do razão, ainda sem id. A família canônica é derivada aqui,
/// na fronteira de gravação, para que nenhum chamador precise lembrar dela.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub scope: Scope,
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub reason: String,
    pub sub_reason: Option<String>,
    pub ref_doc: String,
    pub ref_line: i32,
    pub delta: i64,
    pub after_qty: i64,
    pub occurred_at: DateTime<Utc>,
    pub trace_id: Option<String>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

/// Filtros da consulta de razão (todos opcionais, combináveis).
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerFilter {
    #[serde(default)]
    pub scope: Scope,
    pub warehouse_id: Option<i64>,
    pub item_id: Option<i64>,
    pub batch_code: Option<String>,
    pub reason: Option<String>,
    #[serde(rename = "ref")]
    pub ref_doc: Option<String>,
    pub trace_id: Option<String>,
    pub time_from: Option<DateTime<Utc>>,
    pub time_to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerRepository;

impl LedgerRepository {
    pub fn new() -> Self {
        Self
    }

    /// Gravação idempotente (só acrescenta, nunca altera):
    /// - conflito na impressão digital ⇒ retorna 0 e faz *back-fill* de
    ///   melhor esforço apenas das colunas auxiliares nulas;
    /// - inserção nova ⇒ retorna o id.
    pub async fn write(
        &self,
        conn: &mut PgConnection,
        entry: &NewLedgerEntry,
    ) -> Result<i64, AppError> {
        let reason_canon = ReasonCanon::from_raw(&entry.reason).map(|c| c.as_str());

        let inserted: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO stock_ledger (
                scope, warehouse_id, item_id, batch_code,
                reason, reason_canon, sub_reason,
                ref, ref_line, delta, after_qty,
                occurred_at, trace_id, production_date, expiry_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT ON CONSTRAINT uq_ledger_wh_batch_item_reason_ref_line DO NOTHING
            RETURNING id
            "#,
        )
        .bind(entry.scope)
        .bind(entry.warehouse_id)
        .bind(entry.item_id)
        .bind(&entry.batch_code)
        .bind(&entry.reason)
        .bind(reason_canon)
        .bind(&entry.sub_reason)
        .bind(&entry.ref_doc)
        .bind(entry.ref_line)
        .bind(entry.delta)
        .bind(entry.after_qty)
        .bind(entry.occurred_at)
        .bind(&entry.trace_id)
        .bind(entry.production_date)
        .bind(entry.expiry_date)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        // Conflito: a linha já existe. Completa somente campos auxiliares
        // que estavam ausentes; os fatos (delta, after_qty, ...) ficam como estão.
        let need_patch = reason_canon.is_some()
            || entry.sub_reason.as_deref().is_some_and(|s| !s.trim().is_empty())
            || entry.trace_id.as_deref().is_some_and(|s| !s.trim().is_empty())
            || entry.production_date.is_some()
            || entry.expiry_date.is_some();

        if need_patch {
            sqlx::query(
                r#"
                UPDATE stock_ledger SET
                    reason_canon    = COALESCE(NULLIF(reason_canon, ''), $8),
                    sub_reason      = COALESCE(NULLIF(sub_reason, ''), $9),
                    trace_id        = COALESCE(NULLIF(trace_id, ''), $10),
                    production_date = COALESCE(production_date, $11),
                    expiry_date     = COALESCE(expiry_date, $12)
                 WHERE scope = $1
                   AND warehouse_id = $2
                   AND item_id = $3
                   AND batch_code_key = $4
                   AND reason = $5
                   AND ref = $6
                   AND ref_line = $7
                "#,
            )
            .bind(entry.scope)
            .bind(entry.warehouse_id)
            .bind(entry.item_id)
            .bind(batch_key(entry.batch_code.as_deref()))
            .bind(&entry.reason)
            .bind(&entry.ref_doc)
            .bind(entry.ref_line)
            .bind(reason_canon)
            .bind(&entry.sub_reason)
            .bind(&entry.trace_id)
            .bind(entry.production_date)
            .bind(entry.expiry_date)
            .execute(&mut *conn)
            .await?;
        }

        Ok(0)
    }

    /// Consulta da impressão digital de idempotência.
    #[allow(clippy::too_many_arguments)]
    pub async fn fingerprint_exists(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
        batch_code: Option<&str>,
        reason: &str,
        ref_doc: &str,
        ref_line: i32,
    ) -> Result<bool, AppError> {
        let found: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT 1
              FROM stock_ledger
             WHERE scope = $1
               AND warehouse_id = $2
               AND item_id = $3
               AND batch_code_key = $4
               AND reason = $5
               AND ref = $6
               AND ref_line = $7
             LIMIT 1
            "#,
        )
        .bind(scope)
        .bind(warehouse_id)
        .bind(item_id)
        .bind(batch_key(batch_code))
        .bind(reason)
        .bind(ref_doc)
        .bind(ref_line)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(found.is_some())
    }

    /// Σ(delta < 0) já lançado para um ref numa chave: base da idempotência
    /// por delta total do workflow de saída. `batch_code_key = NULL` agrega
    /// todas as pernas do item (caso FEFO).
    pub async fn shipped_total(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        ref_doc: &str,
        item_id: i64,
        warehouse_id: i64,
        batch_code_key: Option<&str>,
    ) -> Result<i64, AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(delta), 0)::bigint
              FROM stock_ledger
             WHERE scope = $1
               AND ref = $2
               AND item_id = $3
               AND warehouse_id = $4
               AND ($5::text IS NULL OR batch_code_key = $5)
               AND delta < 0
            "#,
        )
        .bind(scope)
        .bind(ref_doc)
        .bind(item_id)
        .bind(warehouse_id)
        .bind(batch_code_key)
        .fetch_one(&mut *conn)
        .await?;

        Ok(total)
    }

    /// Busca a linha (delta) que sustenta um efeito declarado.
    #[allow(clippy::too_many_arguments)]
    pub async fn effect_delta(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
        batch_code: Option<&str>,
        ref_doc: &str,
        ref_line: i32,
        reason: Option<&str>,
    ) -> Result<Option<i64>, AppError> {
        let delta: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT delta
              FROM stock_ledger
             WHERE scope = $1
               AND warehouse_id = $2
               AND item_id = $3
               AND batch_code_key = $4
               AND ref = $5
               AND ref_line = $6
               AND ($7::text IS NULL OR reason = $7)
             LIMIT 1
            "#,
        )
        .bind(scope)
        .bind(warehouse_id)
        .bind(item_id)
        .bind(batch_key(batch_code))
        .bind(ref_doc)
        .bind(ref_line)
        .bind(reason)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(delta)
    }

    pub async fn list(
        &self,
        conn: &mut PgConnection,
        filter: &LedgerFilter,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let entries = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT id, scope, warehouse_id, item_id, batch_code, batch_code_key,
                   reason, reason_canon, sub_reason, ref, ref_line,
                   delta, after_qty, occurred_at, trace_id,
                   production_date, expiry_date, created_at
              FROM stock_ledger
             WHERE scope = $1
               AND ($2::bigint IS NULL OR warehouse_id = $2)
               AND ($3::bigint IS NULL OR item_id = $3)
               AND ($4::text IS NULL OR batch_code_key = $4)
               AND ($5::text IS NULL OR reason = $5)
               AND ($6::text IS NULL OR ref = $6)
               AND ($7::text IS NULL OR trace_id = $7)
               AND ($8::timestamptz IS NULL OR occurred_at >= $8)
               AND ($9::timestamptz IS NULL OR occurred_at <= $9)
             ORDER BY occurred_at DESC, id DESC
             LIMIT $10 OFFSET $11
            "#,
        )
        .bind(filter.scope)
        .bind(filter.warehouse_id)
        .bind(filter.item_id)
        .bind(filter.batch_code.as_deref().map(|b| batch_key(Some(b))))
        .bind(&filter.reason)
        .bind(&filter.ref_doc)
        .bind(&filter.trace_id)
        .bind(filter.time_from)
        .bind(filter.time_to)
        .bind(filter.limit.unwrap_or(200).clamp(1, 1000))
        .bind(filter.offset.unwrap_or(0).max(0))
        .fetch_all(&mut *conn)
        .await?;

        Ok(entries)
    }

    /// Chaves em que Σ(delta) na janela difere de stocks.qty. O join é
    /// pelo batch_code_key para não perder os slots sem lote.
    pub async fn diff_vs_stocks(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        time_from: Option<chrono::DateTime<chrono::Utc>>,
        time_to: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<crate::models::inventory::ReconcileRow>, AppError> {
        let rows = sqlx::query_as::<_, crate::models::inventory::ReconcileRow>(
            r#"
            WITH ledger_sum AS (
                SELECT warehouse_id, item_id, batch_code_key,
                       COALESCE(SUM(delta), 0)::bigint AS sum_delta
                  FROM stock_ledger
                 WHERE scope = $1
                   AND ($2::timestamptz IS NULL OR occurred_at >= $2)
                   AND ($3::timestamptz IS NULL OR occurred_at <= $3)
                 GROUP BY warehouse_id, item_id, batch_code_key
            )
            SELECT s.warehouse_id,
                   s.item_id,
                   s.batch_code,
                   s.batch_code_key,
                   s.qty                                AS stock_qty,
                   COALESCE(l.sum_delta, 0)             AS ledger_qty,
                   (s.qty - COALESCE(l.sum_delta, 0))   AS diff
              FROM stocks s
              LEFT JOIN ledger_sum l
                ON l.warehouse_id = s.warehouse_id
               AND l.item_id = s.item_id
               AND l.batch_code_key = s.batch_code_key
             WHERE s.scope = $1
               AND (s.qty - COALESCE(l.sum_delta, 0)) <> 0
             ORDER BY ABS(s.qty - COALESCE(l.sum_delta, 0)) DESC
            "#,
        )
        .bind(scope)
        .bind(time_from)
        .bind(time_to)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Agregação por motivo (count + Σdelta), mesmos filtros da listagem.
    pub async fn summary(
        &self,
        conn: &mut PgConnection,
        filter: &LedgerFilter,
    ) -> Result<Vec<ReasonStat>, AppError> {
        let stats = sqlx::query_as::<_, ReasonStat>(
            r#"
            SELECT reason,
                   COUNT(id)                        AS count,
                   COALESCE(SUM(delta), 0)::bigint  AS total_delta
              FROM stock_ledger
             WHERE scope = $1
               AND ($2::bigint IS NULL OR warehouse_id = $2)
               AND ($3::bigint IS NULL OR item_id = $3)
               AND ($4::text IS NULL OR batch_code_key = $4)
               AND ($5::timestamptz IS NULL OR occurred_at >= $5)
               AND ($6::timestamptz IS NULL OR occurred_at <= $6)
             GROUP BY reason
             ORDER BY reason
            "#,
        )
        .bind(filter.scope)
        .bind(filter.warehouse_id)
        .bind(filter.item_id)
        .bind(filter.batch_code.as_deref().map(|b| batch_key(Some(b))))
        .bind(filter.time_from)
        .bind(filter.time_to)
        .fetch_all(&mut *conn)
        .await?;

        Ok(stats)
    }
}
