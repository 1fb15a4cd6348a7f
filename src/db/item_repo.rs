// src/db/item_repo.rs

use sqlx::{FromRow, PgConnection};

use crate::{common::error::AppError, models::inventory::Item};

/// Configuração de validade do item, lida junto da derivação de
/// requires_batch.
#[derive(Debug, Clone, FromRow)]
pub struct ShelfLifeConfig {
    pub has_shelf_life: bool,
    pub shelf_life_value: Option<i32>,
    pub shelf_life_unit: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ItemRepository;

impl ItemRepository {
    pub fn new() -> Self {
        Self
    }

    /// requires_batch é fato derivado: has_shelf_life = TRUE ⇒ exige lote.
    /// Item inexistente responde `false` aqui; a FK do razão/stocks é quem
    /// acusa o id inválido na escrita.
    pub async fn requires_batch(
        &self,
        conn: &mut PgConnection,
        item_id: i64,
    ) -> Result<bool, AppError> {
        let flag: Option<bool> = sqlx::query_scalar(
            "SELECT has_shelf_life FROM items WHERE id = $1 LIMIT 1",
        )
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(flag.unwrap_or(false))
    }

    pub async fn shelf_life(
        &self,
        conn: &mut PgConnection,
        item_id: i64,
    ) -> Result<Option<ShelfLifeConfig>, AppError> {
        let cfg = sqlx::query_as::<_, ShelfLifeConfig>(
            r#"
            SELECT has_shelf_life, shelf_life_value, shelf_life_unit
              FROM items
             WHERE id = $1
             LIMIT 1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(cfg)
    }

    pub async fn find(
        &self,
        conn: &mut PgConnection,
        item_id: i64,
    ) -> Result<Option<Item>, AppError> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, sku, name, has_shelf_life, shelf_life_value, shelf_life_unit,
                   created_at, updated_at
              FROM items
             WHERE id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(item)
    }

    pub async fn resolve_by_sku(
        &self,
        conn: &mut PgConnection,
        sku: &str,
    ) -> Result<Option<i64>, AppError> {
        let s = sku.trim();
        if s.is_empty() {
            return Ok(None);
        }

        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM items WHERE sku = $1 LIMIT 1")
                .bind(s)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(id)
    }

    /// Lookup exato na tabela de barcodes: ativo primeiro, menor id como
    /// desempate determinístico.
    pub async fn resolve_by_barcode(
        &self,
        conn: &mut PgConnection,
        barcode: &str,
    ) -> Result<Option<i64>, AppError> {
        let code = barcode.trim();
        if code.is_empty() {
            return Ok(None);
        }

        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT item_id
              FROM item_barcodes
             WHERE barcode = $1
             ORDER BY active DESC, id ASC
             LIMIT 1
            "#,
        )
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(id)
    }
}
