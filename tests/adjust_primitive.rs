// tests/adjust_primitive.rs
//
// O primitivo de ajuste: idempotência, não-negatividade, delta zero,
// normalização de lotes e datas.

mod common;

use chrono::Utc;
use common::*;
use sqlx::PgPool;
use wms_core::{
    common::error::AppError,
    models::inventory::{AdjustMeta, NULL_BATCH_KEY},
};

#[sqlx::test(migrations = "./migrations")]
async fn receive_writes_one_ledger_row_and_balance(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "LEITE-400").await;

    let mut args = adj(wh, item, Some("B1"), 10, "RECEIPT", "R1", 1);
    args.expiry_date = Some(d(2025, 12, 31));
    let out = run_adjust(&st, args).await.expect("recebimento");

    assert!(out.applied);
    assert!(!out.idempotent);
    assert_eq!(out.before, 0);
    assert_eq!(out.after, 10);

    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 10);
    assert_eq!(ledger_count(&pool, "R1").await, 1);

    let (reason, canon, delta): (String, Option<String>, i64) = sqlx::query_as(
        "SELECT reason, reason_canon, delta FROM stock_ledger WHERE ref = 'R1'",
    )
    .fetch_one(&pool)
    .await
    .expect("linha do razão");
    assert_eq!(reason, "RECEIPT");
    assert_eq!(canon.as_deref(), Some("RECEIPT"));
    assert_eq!(delta, 10);

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn replaying_same_fingerprint_is_a_noop(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "LEITE-800").await;

    receive_batch(&st, wh, item, "B1", 10, d(2025, 12, 31), "R1").await;

    // replay exato da mesma impressão digital
    let mut args = adj(wh, item, Some("B1"), 10, "RECEIPT", "R1", 1);
    args.expiry_date = Some(d(2025, 12, 31));
    let out = run_adjust(&st, args).await.expect("replay");

    assert!(!out.applied);
    assert!(out.idempotent);
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 10);
    assert_eq!(ledger_count(&pool, "R1").await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn insufficient_stock_rolls_back_without_traces(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "CAFE-250").await;

    receive_batch(&st, wh, item, "B1", 10, d(2027, 1, 1), "R1").await;

    let err = run_adjust(&st, adj(wh, item, Some("B1"), -15, "SHIPMENT", "SHP-1", 1))
        .await
        .expect_err("deveria faltar estoque");

    match err {
        AppError::InsufficientStock(detail) => {
            assert_eq!(detail.required, 15);
            assert_eq!(detail.available, 10);
            assert_eq!(detail.shortage, 5);
        }
        other => panic!("erro inesperado: {other:?}"),
    }

    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 10);
    assert_eq!(ledger_count(&pool, "SHP-1").await, 0);
    assert_non_negative(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn zero_delta_needs_the_meta_gate(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_item(&pool, "PARAFUSO-M4").await;

    // sem o portão: no-op silencioso, nenhum I/O
    let out = run_adjust(&st, adj(wh, item, None, 0, "ADJUSTMENT", "Z1", 1))
        .await
        .expect("no-op");
    assert!(!out.applied);
    assert!(out.idempotent);
    assert_eq!(ledger_count(&pool, "Z1").await, 0);

    // com allow_zero + sub_reason: linha de confirmação, saldo parado
    let mut args = adj(wh, item, None, 0, "ADJUSTMENT", "Z2", 1);
    args.meta = AdjustMeta {
        allow_zero_delta_ledger: true,
        sub_reason: Some("COUNT_CONFIRM".into()),
    };
    let out = run_adjust(&st, args).await.expect("confirmação");
    assert!(out.applied);
    assert_eq!(out.before, 0);
    assert_eq!(out.after, 0);
    assert_eq!(ledger_count(&pool, "Z2").await, 1);

    let (delta, sub): (i64, Option<String>) =
        sqlx::query_as("SELECT delta, sub_reason FROM stock_ledger WHERE ref = 'Z2'")
            .fetch_one(&pool)
            .await
            .expect("linha de confirmação");
    assert_eq!(delta, 0);
    assert_eq!(sub.as_deref(), Some("COUNT_CONFIRM"));
}

#[sqlx::test(migrations = "./migrations")]
async fn legacy_placeholders_collapse_into_the_null_slot(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_item(&pool, "PARAFUSO-M6").await;

    for (code, ref_doc) in [(Some("NOEXP"), "N1"), (Some("NEAR"), "N2"), (None, "N3")] {
        run_adjust(&st, adj(wh, item, code, 5, "RECEIPT", ref_doc, 1))
            .await
            .expect("entrada");
    }

    // os três caíram no mesmo slot NULL
    assert_eq!(stock_qty(&pool, wh, item, NULL_BATCH_KEY).await, 15);

    let distinct_keys: i64 = sqlx::query_scalar(
        "SELECT COUNT(DISTINCT batch_code_key) FROM stock_ledger WHERE item_id = $1",
    )
    .bind(item)
    .fetch_one(&pool)
    .await
    .expect("chaves do razão");
    assert_eq!(distinct_keys, 1);

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn batch_item_rejects_missing_code(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "IOGURTE-170").await;

    let err = run_adjust(&st, adj(wh, item, None, 5, "RECEIPT", "R1", 1))
        .await
        .expect_err("lote obrigatório");
    assert!(matches!(err, AppError::BatchRequired { .. }));

    let err = run_adjust(&st, adj(wh, item, Some("  "), 5, "RECEIPT", "R2", 1))
        .await
        .expect_err("código vazio também é ausência");
    assert!(matches!(err, AppError::BatchRequired { .. }));
}

#[sqlx::test(migrations = "./migrations")]
async fn inbound_rejects_expiry_before_production(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "QUEIJO-500").await;

    let mut args = adj(wh, item, Some("B1"), 5, "RECEIPT", "R1", 1);
    args.production_date = Some(d(2026, 1, 10));
    args.expiry_date = Some(d(2025, 12, 31));

    let err = run_adjust(&st, args).await.expect_err("datas invertidas");
    assert!(matches!(err, AppError::DateConsistency { .. }));
    assert_eq!(ledger_count(&pool, "R1").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn expiry_is_derived_from_the_item_shelf_life(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_shelf_life_item(&pool, "PAO-FORMA", 10, "DAY").await;

    let mut args = adj(wh, item, Some("L1"), 5, "RECEIPT", "R1", 1);
    args.production_date = Some(d(2026, 1, 1));
    let out = run_adjust(&st, args).await.expect("entrada com derivação");

    assert_eq!(out.expiry_date, Some(d(2026, 1, 11)));

    // e o cadastro do lote recebeu as datas
    let (prod, exp): (Option<chrono::NaiveDate>, Option<chrono::NaiveDate>) = sqlx::query_as(
        "SELECT production_date, expiry_date FROM batches WHERE item_id = $1 AND batch_code = 'L1'",
    )
    .bind(item)
    .fetch_one(&pool)
    .await
    .expect("lote cadastrado");
    assert_eq!(prod, Some(d(2026, 1, 1)));
    assert_eq!(exp, Some(d(2026, 1, 11)));
}

#[sqlx::test(migrations = "./migrations")]
async fn ledger_conflict_backfills_only_null_aux_columns(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "ARROZ-5KG").await;

    receive_batch(&st, wh, item, "B1", 10, d(2027, 1, 1), "R1").await;

    // replay com trace_id novo: o fato não muda, o trace é preenchido
    let mut args = adj(wh, item, Some("B1"), 10, "RECEIPT", "R1", 1);
    args.expiry_date = Some(d(2027, 1, 1));
    args.trace_id = Some("trace-late".into());

    // replay passa pelo fingerprint e nem chega ao writer; o back-fill
    // é exercido gravando direto a mesma impressão digital
    let mut tx = st.db_pool.begin().await.expect("begin");
    let id = st
        .ledger_repo
        .write(
            &mut tx,
            &wms_core::db::ledger_repo::NewLedgerEntry {
                scope: wms_core::models::inventory::Scope::Prod,
                warehouse_id: wh,
                item_id: item,
                batch_code: Some("B1".into()),
                reason: "RECEIPT".into(),
                sub_reason: Some("LATE_TAG".into()),
                ref_doc: "R1".into(),
                ref_line: 1,
                delta: 999, // ignorado: a linha já existe, fatos não mudam
                after_qty: 999,
                occurred_at: Utc::now(),
                trace_id: Some("trace-late".into()),
                production_date: None,
                expiry_date: None,
            },
        )
        .await
        .expect("write idempotente");
    tx.commit().await.expect("commit");

    assert_eq!(id, 0, "conflito retorna 0");

    let (delta, sub, trace): (i64, Option<String>, Option<String>) = sqlx::query_as(
        "SELECT delta, sub_reason, trace_id FROM stock_ledger WHERE ref = 'R1'",
    )
    .fetch_one(&pool)
    .await
    .expect("linha");
    assert_eq!(delta, 10, "delta original intocado");
    assert_eq!(sub.as_deref(), Some("LATE_TAG"), "aux nula preenchida");
    assert_eq!(trace.as_deref(), Some("trace-late"));
}
