// tests/fefo_outbound.rs
//
// Alocador FEFO e saída de pedido: ordem de validade, tie-break,
// shortage estruturado, idempotência por delta total.

mod common;

use common::*;
use sqlx::PgPool;
use wms_core::{
    models::{
        documents::{LineStatus, ShipLine},
        inventory::Scope,
    },
};

/// Semente padrão dos cenários: A(10, vence antes), B(20), C(30, vence
/// por último).
async fn seed_abc(pool: &PgPool) -> (i64, i64) {
    let st = state(pool);
    let wh = seed_warehouse(pool, "WH1").await;
    let item = seed_batch_item(pool, "SKU-FEFO").await;

    receive_batch(&st, wh, item, "A", 10, d(2025, 1, 10), "SEED-A").await;
    receive_batch(&st, wh, item, "B", 20, d(2025, 1, 20), "SEED-B").await;
    receive_batch(&st, wh, item, "C", 30, d(2025, 2, 1), "SEED-C").await;

    (wh, item)
}

fn line(item: i64, wh: i64, qty: i64) -> ShipLine {
    ShipLine {
        item_id: item,
        warehouse_id: wh,
        batch_code: None,
        qty,
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn ship_four_consumes_only_the_earliest_batch(pool: PgPool) {
    let (wh, item) = seed_abc(&pool).await;
    let st = state(&pool);

    let outcome = st
        .outbound_service
        .commit(&pool, Scope::Prod, "ORD-1", &[line(item, wh, 4)], Some(ts(2025, 1, 5)), None)
        .await
        .expect("ship 4");

    assert_eq!(outcome.total_qty, 4);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].status, LineStatus::Ok);

    assert_eq!(stock_qty(&pool, wh, item, "A").await, 6);
    assert_eq!(stock_qty(&pool, wh, item, "B").await, 20);
    assert_eq!(stock_qty(&pool, wh, item, "C").await, 30);

    // uma única perna, do lote mais velho
    let legs: Vec<(Option<String>, i64)> = sqlx::query_as(
        "SELECT batch_code, delta FROM stock_ledger WHERE ref = 'ORD-1' ORDER BY ref_line",
    )
    .fetch_all(&pool)
    .await
    .expect("pernas");
    assert_eq!(legs, vec![(Some("A".into()), -4)]);

    // a foto do dia do embarque acompanha stocks
    assert_eq!(snapshot_qty(&pool, d(2025, 1, 5), wh, item, "A").await, 6);

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn ship_forty_walks_the_expiry_order(pool: PgPool) {
    let (wh, item) = seed_abc(&pool).await;
    let st = state(&pool);

    st.outbound_service
        .commit(&pool, Scope::Prod, "ORD-2", &[line(item, wh, 40)], Some(ts(2025, 1, 5)), None)
        .await
        .expect("ship 40");

    assert_eq!(stock_qty(&pool, wh, item, "A").await, 0);
    assert_eq!(stock_qty(&pool, wh, item, "B").await, 0);
    assert_eq!(stock_qty(&pool, wh, item, "C").await, 20);

    // pernas em sequência não-decrescente de validade
    let legs: Vec<(Option<String>, i64, i32)> = sqlx::query_as(
        "SELECT batch_code, delta, ref_line FROM stock_ledger WHERE ref = 'ORD-2' ORDER BY ref_line",
    )
    .fetch_all(&pool)
    .await
    .expect("pernas");
    assert_eq!(
        legs,
        vec![
            (Some("A".into()), -10, 1),
            (Some("B".into()), -20, 2),
            (Some("C".into()), -10, 3),
        ]
    );

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn shortage_leaves_every_slot_untouched(pool: PgPool) {
    let (wh, item) = seed_abc(&pool).await;
    let st = state(&pool);

    let outcome = st
        .outbound_service
        .commit(&pool, Scope::Prod, "ORD-3", &[line(item, wh, 100)], Some(ts(2025, 1, 5)), None)
        .await
        .expect("o pedido não estoura, a linha reporta");

    assert_eq!(outcome.total_qty, 0);
    assert_eq!(outcome.results[0].status, LineStatus::Insufficient);

    // o diagnóstico estruturado de shortage chega inteiro à UI
    let detail: serde_json::Value = serde_json::from_str(
        outcome.results[0].error.as_deref().expect("detalhe"),
    )
    .expect("json");
    assert_eq!(detail["required"], 100);
    assert_eq!(detail["available"], 60);
    assert_eq!(detail["shortage"], 40);

    assert_eq!(stock_qty(&pool, wh, item, "A").await, 10);
    assert_eq!(stock_qty(&pool, wh, item, "B").await, 20);
    assert_eq!(stock_qty(&pool, wh, item, "C").await, 30);
    assert_eq!(ledger_count(&pool, "ORD-3").await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn plan_drops_expired_batches_unless_allowed(pool: PgPool) {
    let (wh, item) = seed_abc(&pool).await;
    let st = state(&pool);

    // em 2025-01-15, o lote A (vence 01-10) já passou
    let mut tx = pool.begin().await.expect("begin");
    let plan = st
        .fefo
        .plan(&mut tx, Scope::Prod, wh, item, 25, d(2025, 1, 15), false)
        .await
        .expect("plano sem vencidos");
    assert_eq!(
        plan.iter().map(|l| (l.batch_code.as_deref(), l.qty)).collect::<Vec<_>>(),
        vec![(Some("B"), 20), (Some("C"), 5)]
    );

    let plan_all = st
        .fefo
        .plan(&mut tx, Scope::Prod, wh, item, 25, d(2025, 1, 15), true)
        .await
        .expect("plano com vencidos");
    assert_eq!(plan_all[0].batch_code.as_deref(), Some("A"));
    tx.rollback().await.expect("rollback");
}

#[sqlx::test(migrations = "./migrations")]
async fn order_replay_and_increase_are_idempotent_by_total_delta(pool: PgPool) {
    let (wh, item) = seed_abc(&pool).await;
    let st = state(&pool);

    st.outbound_service
        .commit(&pool, Scope::Prod, "ORD-4", &[line(item, wh, 4)], Some(ts(2025, 1, 5)), None)
        .await
        .expect("primeiro commit");

    // replay integral: nada muda
    let replay = st
        .outbound_service
        .commit(&pool, Scope::Prod, "ORD-4", &[line(item, wh, 4)], Some(ts(2025, 1, 5)), None)
        .await
        .expect("replay");
    assert_eq!(replay.total_qty, 0);
    assert!(replay.results[0].idempotent);
    assert_eq!(stock_qty(&pool, wh, item, "A").await, 6);

    // pedido aumentado: só a diferença é baixada
    let grown = st
        .outbound_service
        .commit(&pool, Scope::Prod, "ORD-4", &[line(item, wh, 10)], Some(ts(2025, 1, 5)), None)
        .await
        .expect("aumento");
    assert_eq!(grown.total_qty, 6);
    assert_eq!(stock_qty(&pool, wh, item, "A").await, 0);

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn concrete_batch_line_ships_directly(pool: PgPool) {
    let (wh, item) = seed_abc(&pool).await;
    let st = state(&pool);

    let outcome = st
        .outbound_service
        .commit(
            &pool,
            Scope::Prod,
            "ORD-5",
            &[ShipLine {
                item_id: item,
                warehouse_id: wh,
                batch_code: Some("C".into()),
                qty: 5,
            }],
            Some(ts(2025, 1, 5)),
            None,
        )
        .await
        .expect("baixa direta");

    assert_eq!(outcome.total_qty, 5);
    // o lote pedido, não o mais velho
    assert_eq!(stock_qty(&pool, wh, item, "A").await, 10);
    assert_eq!(stock_qty(&pool, wh, item, "C").await, 25);

    let (sub,): (Option<String>,) =
        sqlx::query_as("SELECT sub_reason FROM stock_ledger WHERE ref = 'ORD-5'")
            .fetch_one(&pool)
            .await
            .expect("sub_reason");
    assert_eq!(sub.as_deref(), Some("ORDER_SHIP"));
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_payload_lines_are_merged_before_shipping(pool: PgPool) {
    let (wh, item) = seed_abc(&pool).await;
    let st = state(&pool);

    let outcome = st
        .outbound_service
        .commit(
            &pool,
            Scope::Prod,
            "ORD-6",
            &[line(item, wh, 3), line(item, wh, 4)],
            Some(ts(2025, 1, 5)),
            None,
        )
        .await
        .expect("linhas duplicadas somam");

    assert_eq!(outcome.total_qty, 7);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(stock_qty(&pool, wh, item, "A").await, 3);
}
