// src/db/stock_repo.rs

use chrono::NaiveDate;
use sqlx::{FromRow, PgConnection};

use crate::{
    common::error::AppError,
    models::inventory::{Scope, StockSlot},
};

/// Slot travado para escrita: id + saldo lido sob FOR UPDATE.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct LockedSlot {
    pub id: i64,
    pub qty: i64,
}

/// Candidato de alocação FEFO: slot com saldo positivo + validade do lote.
#[derive(Debug, Clone, FromRow)]
pub struct FefoCandidate {
    pub stock_id: i64,
    pub batch_code: Option<String>,
    pub qty: i64,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StockRepository;

impl StockRepository {
    pub fn new() -> Self {
        Self
    }

    /// Materializa o slot em qty=0 se ainda não existir (corrida benigna:
    /// ON CONFLICT DO NOTHING).
    pub async fn ensure_slot(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
        batch_code: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO stocks (scope, item_id, warehouse_id, batch_code, qty)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT ON CONSTRAINT uq_stocks_item_wh_batch DO NOTHING
            "#,
        )
        .bind(scope)
        .bind(item_id)
        .bind(warehouse_id)
        .bind(batch_code)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Trava a linha do slot e lê o saldo atual. Toda mutação passa por
    /// aqui antes de decidir o novo saldo.
    pub async fn lock_slot(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
        batch_code: Option<&str>,
    ) -> Result<Option<LockedSlot>, AppError> {
        let slot = sqlx::query_as::<_, LockedSlot>(
            r#"
            SELECT id, qty
              FROM stocks
             WHERE scope = $1
               AND item_id = $2
               AND warehouse_id = $3
               AND batch_code IS NOT DISTINCT FROM $4
             FOR UPDATE
            "#,
        )
        .bind(scope)
        .bind(item_id)
        .bind(warehouse_id)
        .bind(batch_code)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(slot)
    }

    pub async fn bump_qty(
        &self,
        conn: &mut PgConnection,
        stock_id: i64,
        delta: i64,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE stocks SET qty = qty + $1 WHERE id = $2")
            .bind(delta)
            .bind(stock_id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Todos os slots com saldo positivo de (warehouse, item), travados
    /// com FOR UPDATE OF s — a única seção crítica que cruza slots.
    /// A validade vem do join com batches (IS NOT DISTINCT FROM para não
    /// engolir o slot sem lote).
    pub async fn fefo_candidates(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
    ) -> Result<Vec<FefoCandidate>, AppError> {
        let rows = sqlx::query_as::<_, FefoCandidate>(
            r#"
            SELECT s.id          AS stock_id,
                   s.batch_code  AS batch_code,
                   s.qty         AS qty,
                   b.expiry_date AS expiry_date
              FROM stocks s
              LEFT JOIN batches b
                ON b.item_id = s.item_id
               AND b.warehouse_id = s.warehouse_id
               AND b.batch_code IS NOT DISTINCT FROM s.batch_code
             WHERE s.scope = $1
               AND s.item_id = $2
               AND s.warehouse_id = $3
               AND s.qty > 0
             FOR UPDATE OF s
            "#,
        )
        .bind(scope)
        .bind(item_id)
        .bind(warehouse_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Saldo total disponível de um item num armazém (todas os lotes).
    pub async fn available_total(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
    ) -> Result<i64, AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(qty), 0)::bigint
              FROM stocks
             WHERE scope = $1 AND warehouse_id = $2 AND item_id = $3
            "#,
        )
        .bind(scope)
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(total)
    }

    /// Leitura sem trava para um par (stocks vs snapshot) na verificação
    /// dos três livros.
    pub async fn qty_of_key(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        item_id: i64,
        batch_code_key: &str,
    ) -> Result<i64, AppError> {
        let qty: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(
                (SELECT qty FROM stocks
                  WHERE scope = $1 AND warehouse_id = $2
                    AND item_id = $3 AND batch_code_key = $4),
                0)
            "#,
        )
        .bind(scope)
        .bind(warehouse_id)
        .bind(item_id)
        .bind(batch_code_key)
        .fetch_one(&mut *conn)
        .await?;

        Ok(qty)
    }

    pub async fn list_slots(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: Option<i64>,
        item_id: Option<i64>,
    ) -> Result<Vec<StockSlot>, AppError> {
        let slots = sqlx::query_as::<_, StockSlot>(
            r#"
            SELECT id, scope, warehouse_id, item_id, batch_code, batch_code_key, qty
              FROM stocks
             WHERE scope = $1
               AND ($2::bigint IS NULL OR warehouse_id = $2)
               AND ($3::bigint IS NULL OR item_id = $3)
             ORDER BY warehouse_id, item_id, batch_code_key
            "#,
        )
        .bind(scope)
        .bind(warehouse_id)
        .bind(item_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(slots)
    }
}
