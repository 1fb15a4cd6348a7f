// tests/common/mod.rs
//
// Sementes e asserções compartilhadas pelos testes de integração.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use wms_core::{
    common::error::AppError,
    config::AppState,
    models::inventory::{AdjustMeta, AdjustOutcome, Scope, StockAdjustment},
};

pub fn state(pool: &PgPool) -> AppState {
    AppState::with_pool(pool.clone())
}

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).expect("data de teste válida")
}

pub fn ts(y: i32, m: u32, day: u32) -> DateTime<Utc> {
    d(y, m, day).and_hms_opt(10, 0, 0).expect("hora válida").and_utc()
}

pub async fn seed_warehouse(pool: &PgPool, code: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO warehouses (code, name) VALUES ($1, $1) RETURNING id")
        .bind(code)
        .fetch_one(pool)
        .await
        .expect("seed warehouse")
}

/// Item sem controle de validade (requires_batch = false).
pub async fn seed_item(pool: &PgPool, sku: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO items (sku, name, has_shelf_life) VALUES ($1, $1, FALSE) RETURNING id",
    )
    .bind(sku)
    .fetch_one(pool)
    .await
    .expect("seed item")
}

/// Item com validade (requires_batch = true), sem configuração de prazo.
pub async fn seed_batch_item(pool: &PgPool, sku: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO items (sku, name, has_shelf_life) VALUES ($1, $1, TRUE) RETURNING id",
    )
    .bind(sku)
    .fetch_one(pool)
    .await
    .expect("seed item com lote")
}

/// Item com validade + prazo configurado (derivação de expiry).
pub async fn seed_shelf_life_item(pool: &PgPool, sku: &str, value: i32, unit: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO items (sku, name, has_shelf_life, shelf_life_value, shelf_life_unit)
        VALUES ($1, $1, TRUE, $2, $3)
        RETURNING id
        "#,
    )
    .bind(sku)
    .bind(value)
    .bind(unit)
    .fetch_one(pool)
    .await
    .expect("seed item com prazo")
}

pub async fn seed_barcode(pool: &PgPool, item_id: i64, barcode: &str) {
    sqlx::query("INSERT INTO item_barcodes (item_id, barcode, active) VALUES ($1, $2, TRUE)")
        .bind(item_id)
        .bind(barcode)
        .execute(pool)
        .await
        .expect("seed barcode");
}

pub fn adj(
    warehouse_id: i64,
    item_id: i64,
    batch_code: Option<&str>,
    delta: i64,
    reason: &str,
    ref_doc: &str,
    ref_line: i32,
) -> StockAdjustment {
    StockAdjustment {
        scope: Scope::Prod,
        warehouse_id,
        item_id,
        batch_code: batch_code.map(str::to_string),
        delta,
        reason: reason.to_string(),
        ref_doc: ref_doc.to_string(),
        ref_line,
        occurred_at: Utc::now(),
        production_date: None,
        expiry_date: None,
        trace_id: None,
        meta: AdjustMeta::default(),
    }
}

/// Executa um ajuste numa transação própria: commit no sucesso,
/// rollback no erro (como um workflow faria).
pub async fn run_adjust(
    st: &AppState,
    args: StockAdjustment,
) -> Result<AdjustOutcome, AppError> {
    let mut tx = st.db_pool.begin().await.expect("begin");
    match st.stock_service.adjust(&mut tx, args).await {
        Ok(outcome) => {
            tx.commit().await.expect("commit");
            Ok(outcome)
        }
        Err(e) => {
            tx.rollback().await.expect("rollback");
            Err(e)
        }
    }
}

/// Entrada direta de teste: recebimento de um lote com validade.
pub async fn receive_batch(
    st: &AppState,
    warehouse_id: i64,
    item_id: i64,
    batch_code: &str,
    qty: i64,
    expiry: NaiveDate,
    ref_doc: &str,
) {
    let mut args = adj(warehouse_id, item_id, Some(batch_code), qty, "RECEIPT", ref_doc, 1);
    args.expiry_date = Some(expiry);
    run_adjust(st, args).await.expect("recebimento de teste");
}

pub async fn stock_qty(pool: &PgPool, warehouse_id: i64, item_id: i64, batch_key: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(
            (SELECT qty FROM stocks
              WHERE scope = 'PROD' AND warehouse_id = $1
                AND item_id = $2 AND batch_code_key = $3),
            0)
        "#,
    )
    .bind(warehouse_id)
    .bind(item_id)
    .bind(batch_key)
    .fetch_one(pool)
    .await
    .expect("stock_qty")
}

pub async fn ledger_count(pool: &PgPool, ref_doc: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM stock_ledger WHERE ref = $1")
        .bind(ref_doc)
        .fetch_one(pool)
        .await
        .expect("ledger_count")
}

pub async fn snapshot_qty(
    pool: &PgPool,
    day: NaiveDate,
    warehouse_id: i64,
    item_id: i64,
    batch_key: &str,
) -> i64 {
    sqlx::query_scalar(
        r#"
        SELECT COALESCE(
            (SELECT qty_on_hand FROM stock_snapshots
              WHERE scope = 'PROD' AND snapshot_date = $1
                AND warehouse_id = $2 AND item_id = $3 AND batch_code_key = $4),
            0)
        "#,
    )
    .bind(day)
    .bind(warehouse_id)
    .bind(item_id)
    .bind(batch_key)
    .fetch_one(pool)
    .await
    .expect("snapshot_qty")
}

/// Conservação: para toda chave, stocks.qty == Σ ledger.delta.
pub async fn assert_conservation(pool: &PgPool) {
    let violations: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
          FROM stocks s
          LEFT JOIN (
              SELECT scope, warehouse_id, item_id, batch_code_key,
                     COALESCE(SUM(delta), 0) AS sum_delta
                FROM stock_ledger
               GROUP BY scope, warehouse_id, item_id, batch_code_key
          ) l
            ON l.scope = s.scope
           AND l.warehouse_id = s.warehouse_id
           AND l.item_id = s.item_id
           AND l.batch_code_key = s.batch_code_key
         WHERE s.qty <> COALESCE(l.sum_delta, 0)
        "#,
    )
    .fetch_one(pool)
    .await
    .expect("conservação");

    assert_eq!(violations, 0, "stocks.qty divergiu de Σ ledger.delta");
}

/// Não-negatividade: nenhum slot abaixo de zero.
pub async fn assert_non_negative(pool: &PgPool) {
    let negatives: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stocks WHERE qty < 0")
        .fetch_one(pool)
        .await
        .expect("não-negatividade");
    assert_eq!(negatives, 0, "slot com saldo negativo");
}
