// src/db/batch_repo.rs

use chrono::NaiveDate;
use sqlx::PgConnection;

use crate::{common::error::AppError, models::inventory::Batch};

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchRepository;

impl BatchRepository {
    pub fn new() -> Self {
        Self
    }

    /// Upsert idempotente na chave natural (warehouse, item, code).
    /// No conflito, só preenche datas que estavam NULL; um valor
    /// existente nunca é sobrescrito.
    pub async fn ensure(
        &self,
        conn: &mut PgConnection,
        warehouse_id: i64,
        item_id: i64,
        batch_code: &str,
        production_date: Option<NaiveDate>,
        expiry_date: Option<NaiveDate>,
    ) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO batches (warehouse_id, item_id, batch_code, production_date, expiry_date)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT uq_batches_wh_item_code DO UPDATE SET
                production_date = COALESCE(batches.production_date, EXCLUDED.production_date),
                expiry_date     = COALESCE(batches.expiry_date, EXCLUDED.expiry_date)
            RETURNING id
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(batch_code)
        .bind(production_date)
        .bind(expiry_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    pub async fn find(
        &self,
        conn: &mut PgConnection,
        warehouse_id: i64,
        item_id: i64,
        batch_code: &str,
    ) -> Result<Option<Batch>, AppError> {
        let batch = sqlx::query_as::<_, Batch>(
            r#"
            SELECT id, warehouse_id, item_id, batch_code,
                   production_date, expiry_date, created_at
              FROM batches
             WHERE warehouse_id = $1 AND item_id = $2 AND batch_code = $3
            "#,
        )
        .bind(warehouse_id)
        .bind(item_id)
        .bind(batch_code)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(batch)
    }
}
