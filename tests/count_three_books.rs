// tests/count_three_books.rs
//
// Contagem por scan (confirmação e acerto) e fidelidade da foto diária.

mod common;

use chrono::Utc;
use common::*;
use sqlx::PgPool;
use wms_core::{
    common::error::AppError,
    models::inventory::Scope,
    services::count_service::CountCommand,
};

fn count_cmd(wh: i64, item: i64, batch: &str, actual: i64, ref_doc: &str) -> CountCommand {
    CountCommand {
        scope: Scope::Prod,
        warehouse_id: wh,
        item_id: item,
        batch_code: Some(batch.to_string()),
        actual,
        ref_doc: ref_doc.to_string(),
        production_date: None,
        expiry_date: None,
        trace_id: None,
    }
}

async fn run_count(
    pool: &PgPool,
    cmd: CountCommand,
) -> Result<wms_core::models::scan::CountResult, AppError> {
    let st = state(pool);
    let mut tx = pool.begin().await.expect("begin");
    match st.count_service.handle_count(&mut tx, cmd).await {
        Ok(res) => {
            tx.commit().await.expect("commit");
            Ok(res)
        }
        Err(e) => {
            tx.rollback().await.expect("rollback");
            Err(e)
        }
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn matching_count_emits_a_zero_delta_confirmation(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "FARINHA-1KG").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    let res = run_count(&pool, count_cmd(wh, item, "B1", 5, "C1"))
        .await
        .expect("contagem batida");

    assert_eq!(res.delta, 0);
    assert_eq!(res.before, 5);
    assert_eq!(res.after, 5);
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 5);

    let (reason, canon, delta, sub): (String, Option<String>, i64, Option<String>) =
        sqlx::query_as(
            "SELECT reason, reason_canon, delta, sub_reason FROM stock_ledger WHERE ref = 'C1'",
        )
        .fetch_one(&pool)
        .await
        .expect("linha de confirmação");
    assert_eq!(reason, "COUNT");
    assert_eq!(canon.as_deref(), Some("ADJUSTMENT"));
    assert_eq!(delta, 0);
    assert_eq!(sub.as_deref(), Some("COUNT_CONFIRM"));
}

#[sqlx::test(migrations = "./migrations")]
async fn surplus_count_adjusts_up_with_dates(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "FARINHA-1KG-B").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    let mut cmd = count_cmd(wh, item, "B1", 7, "C2");
    cmd.expiry_date = Some(d(2027, 1, 1));
    let res = run_count(&pool, cmd).await.expect("sobra");

    assert_eq!(res.delta, 2);
    assert_eq!(res.after, 7);
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 7);

    let (delta, sub): (i64, Option<String>) =
        sqlx::query_as("SELECT delta, sub_reason FROM stock_ledger WHERE ref = 'C2'")
            .fetch_one(&pool)
            .await
            .expect("linha de acerto");
    assert_eq!(delta, 2);
    assert_eq!(sub.as_deref(), Some("COUNT_ADJUST"));

    // a foto de hoje acompanha o saldo da chave tocada
    let today = Utc::now().date_naive();
    assert_eq!(snapshot_qty(&pool, today, wh, item, "B1").await, 7);

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn shrinkage_count_adjusts_down_without_dates(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "FARINHA-1KG-C").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    let res = run_count(&pool, count_cmd(wh, item, "B1", 3, "C3"))
        .await
        .expect("quebra");

    assert_eq!(res.delta, -2);
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 3);

    let today = Utc::now().date_naive();
    assert_eq!(snapshot_qty(&pool, today, wh, item, "B1").await, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn surplus_on_shelf_life_item_demands_dates(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "FARINHA-1KG-D").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    let err = run_count(&pool, count_cmd(wh, item, "B1", 9, "C4"))
        .await
        .expect_err("sobra sem datas");
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 5);
}

#[sqlx::test(migrations = "./migrations")]
async fn count_on_plain_item_targets_the_null_slot(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_item(&pool, "PREGO-17").await;
    run_adjust(&st, adj(wh, item, None, 4, "RECEIPT", "SEED", 1))
        .await
        .expect("seed");

    let mut cmd = count_cmd(wh, item, "ignored", 6, "C5");
    cmd.batch_code = None;
    let res = run_count(&pool, cmd).await.expect("contagem sem lote");

    assert_eq!(res.delta, 2);
    assert_eq!(
        stock_qty(&pool, wh, item, wms_core::models::inventory::NULL_BATCH_KEY).await,
        6
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn drill_scope_is_isolated_from_prod(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCOPE").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    // a mesma contagem em DRILL parte de 0, sem enxergar o PROD
    let mut cmd = count_cmd(wh, item, "B1", 2, "C6");
    cmd.scope = Scope::Drill;
    cmd.expiry_date = Some(d(2027, 1, 1));
    let res = run_count(&pool, cmd).await.expect("contagem em DRILL");

    assert_eq!(res.before, 0);
    assert_eq!(res.delta, 2);

    // PROD intocado
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 5);

    let drill_qty: i64 = sqlx::query_scalar(
        "SELECT qty FROM stocks WHERE scope = 'DRILL' AND item_id = $1 AND warehouse_id = $2 AND batch_code_key = 'B1'",
    )
    .bind(item)
    .bind(wh)
    .fetch_one(&pool)
    .await
    .expect("slot DRILL");
    assert_eq!(drill_qty, 2);
}
