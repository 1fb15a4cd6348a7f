// tests/workflows.rs
//
// Workflows de documento: recebimento, saída interna, devolução a
// fornecedor e a costura de abertura.

mod common;

use common::*;
use sqlx::PgPool;
use wms_core::models::{
    documents::{ReceiptDoc, ReceiptLine},
    inventory::Scope,
};

fn receipt_line(line_no: i32, item: i64, qty: i64, batch: &str, exp: (i32, u32, u32)) -> ReceiptLine {
    ReceiptLine {
        line_no,
        item_id: item,
        qty,
        batch_code: Some(batch.to_string()),
        production_date: None,
        expiry_date: Some(d(exp.0, exp.1, exp.2)),
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn receipt_confirmation_posts_every_line(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item_a = seed_batch_item(&pool, "SKU-RA").await;
    let item_b = seed_batch_item(&pool, "SKU-RB").await;

    let doc = ReceiptDoc {
        receipt_no: "RCPT-1".into(),
        warehouse_id: wh,
        scope: Scope::Prod,
        lines: vec![
            receipt_line(1, item_a, 10, "L1", (2027, 6, 30)),
            receipt_line(2, item_b, 4, "L9", (2027, 3, 31)),
        ],
    };

    let outcome = st
        .receipt_service
        .confirm(&pool, &doc, None, Some("trace-r1".into()))
        .await
        .expect("confirmação");

    assert_eq!(outcome.total_qty, 14);
    assert_eq!(stock_qty(&pool, wh, item_a, "L1").await, 10);
    assert_eq!(stock_qty(&pool, wh, item_b, "L9").await, 4);
    assert_eq!(ledger_count(&pool, "RCPT-1").await, 2);

    // a foto de hoje já reflete o que entrou
    let today = chrono::Utc::now().date_naive();
    assert_eq!(snapshot_qty(&pool, today, wh, item_a, "L1").await, 10);
    assert_eq!(snapshot_qty(&pool, today, wh, item_b, "L9").await, 4);

    // replay do documento inteiro: nada dobra
    let replay = st
        .receipt_service
        .confirm(&pool, &doc, None, Some("trace-r1".into()))
        .await
        .expect("replay");
    assert_eq!(replay.total_qty, 0);
    assert!(replay.results.iter().all(|r| r.idempotent));
    assert_eq!(ledger_count(&pool, "RCPT-1").await, 2);

    assert_conservation(&pool).await;
    assert_non_negative(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn internal_issue_fans_out_by_fefo_when_no_batch_is_fixed(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-II").await;

    receive_batch(&st, wh, item, "OLD", 10, d(2025, 1, 10), "SEED-1").await;
    receive_batch(&st, wh, item, "NEW", 20, d(2025, 2, 1), "SEED-2").await;

    let doc = st
        .internal_issue_service
        .create_doc(&pool, Scope::Prod, wh, "SAMPLE", "Ana Souza", None, None, None)
        .await
        .expect("criação");
    assert_eq!(doc.doc.status, "DRAFT");
    assert!(doc.doc.doc_no.starts_with("INT-OUT:WH"));

    let doc = st
        .internal_issue_service
        .upsert_line(&pool, doc.doc.id, item, 15, None, None)
        .await
        .expect("linha");
    assert_eq!(doc.lines.len(), 1);
    assert_eq!(doc.lines[0].requested_qty, 15);

    // mesma chave acumula em vez de duplicar
    let doc = st
        .internal_issue_service
        .upsert_line(&pool, doc.doc.id, item, 10, None, None)
        .await
        .expect("acúmulo");
    assert_eq!(doc.lines.len(), 1);
    assert_eq!(doc.lines[0].requested_qty, 25);

    let confirmed = st
        .internal_issue_service
        .confirm(&pool, doc.doc.id, Some(ts(2025, 1, 5)))
        .await
        .expect("confirmação");
    assert_eq!(confirmed.doc.status, "CONFIRMED");

    // FEFO: o lote mais velho primeiro, ref_line = line_no*100 + seq
    let legs: Vec<(Option<String>, i64, i32)> = sqlx::query_as(
        "SELECT batch_code, delta, ref_line FROM stock_ledger WHERE ref = $1 ORDER BY ref_line",
    )
    .bind(&confirmed.doc.doc_no)
    .fetch_all(&pool)
    .await
    .expect("pernas");
    assert_eq!(
        legs,
        vec![
            (Some("OLD".into()), -10, 101),
            (Some("NEW".into()), -15, 102),
        ]
    );

    assert_eq!(stock_qty(&pool, wh, item, "OLD").await, 0);
    assert_eq!(stock_qty(&pool, wh, item, "NEW").await, 5);
    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn internal_issue_lifecycle_guards(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_item(&pool, "SKU-IIG").await;
    run_adjust(&st, adj(wh, item, None, 5, "RECEIPT", "SEED", 1))
        .await
        .expect("seed");

    // sem recebedor não cria
    let err = st
        .internal_issue_service
        .create_doc(&pool, Scope::Prod, wh, "SAMPLE", "   ", None, None, None)
        .await
        .expect_err("recebedor obrigatório");
    assert!(matches!(err, wms_core::common::error::AppError::InvalidInput(_)));

    let doc = st
        .internal_issue_service
        .create_doc(&pool, Scope::Prod, wh, "SAMPLE", "Rui Lima", None, None, None)
        .await
        .expect("criação");

    // cancelado não confirma
    st.internal_issue_service
        .cancel(&pool, doc.doc.id)
        .await
        .expect("cancelamento");
    let err = st
        .internal_issue_service
        .confirm(&pool, doc.doc.id, None)
        .await
        .expect_err("cancelado não confirma");
    assert!(matches!(err, wms_core::common::error::AppError::DocState(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn return_task_expected_is_capped_by_availability(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-RT").await;

    // PO com 10 recebidos, mas só 8 em estoque
    receive_batch(&st, wh, item, "L1", 8, d(2027, 1, 1), "SEED").await;
    let po_id: i64 = sqlx::query_scalar(
        "INSERT INTO purchase_orders (warehouse_id, supplier_name) VALUES ($1, 'ACME') RETURNING id",
    )
    .bind(wh)
    .fetch_one(&pool)
    .await
    .expect("po");
    let po_line_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO purchase_order_lines (po_id, line_no, item_id, qty_ordered, qty_received)
        VALUES ($1, 1, $2, 10, 10)
        RETURNING id
        "#,
    )
    .bind(po_id)
    .bind(item)
    .fetch_one(&pool)
    .await
    .expect("linha do po");

    let task = st
        .return_service
        .create_for_po(&pool, Scope::Prod, po_id, None, false)
        .await
        .expect("tarefa");
    assert_eq!(task.lines.len(), 1);
    assert_eq!(task.lines[0].expected_qty, Some(8));

    // picks acumulam intenção; estoque parado
    let task = st
        .return_service
        .record_pick(&pool, task.task.id, item, 6, "L1")
        .await
        .expect("pick");
    assert_eq!(task.lines[0].picked_qty, 6);
    assert_eq!(task.lines[0].status, "MISMATCH");
    assert_eq!(stock_qty(&pool, wh, item, "L1").await, 8);

    let task = st
        .return_service
        .record_pick(&pool, task.task.id, item, 2, "L1")
        .await
        .expect("pick 2");
    assert_eq!(task.lines[0].picked_qty, 8);
    assert_eq!(task.lines[0].status, "MATCHED");

    // commit: baixa real + PO decrementado
    let committed = st
        .return_service
        .commit(&pool, task.task.id, Some("trace-rt".into()), None)
        .await
        .expect("commit");
    assert_eq!(committed.task.status, "COMMITTED");
    assert_eq!(committed.lines[0].committed_qty, Some(8));

    assert_eq!(stock_qty(&pool, wh, item, "L1").await, 0);

    let ref_doc = format!("RTN-{}", committed.task.id);
    let (reason, canon, delta, ref_line): (String, Option<String>, i64, i32) = sqlx::query_as(
        "SELECT reason, reason_canon, delta, ref_line FROM stock_ledger WHERE ref = $1",
    )
    .bind(&ref_doc)
    .fetch_one(&pool)
    .await
    .expect("perna de devolução");
    assert_eq!(reason, "RETURN_OUT");
    assert_eq!(canon.as_deref(), Some("SHIPMENT"));
    assert_eq!(delta, -8);
    assert_eq!(i64::from(ref_line), committed.lines[0].id);

    let received: i64 =
        sqlx::query_scalar("SELECT qty_received FROM purchase_order_lines WHERE id = $1")
            .bind(po_line_id)
            .fetch_one(&pool)
            .await
            .expect("po atualizado");
    assert_eq!(received, 2);

    // replay do commit é rejeitado pelo estado
    let err = st
        .return_service
        .commit(&pool, committed.task.id, None, None)
        .await
        .expect_err("commit duplo");
    assert!(matches!(err, wms_core::common::error::AppError::DocState(_)));

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn opening_backfill_stitches_ledger_to_stocks(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_item(&pool, "SKU-OPEN").await;

    // saldo herdado da virada: stocks sem razão correspondente
    sqlx::query(
        "INSERT INTO stocks (scope, item_id, warehouse_id, batch_code, qty) VALUES ('PROD', $1, $2, NULL, 7)",
    )
    .bind(item)
    .bind(wh)
    .execute(&pool)
    .await
    .expect("saldo herdado");

    let before = st
        .reconcile_service
        .diff_ledger_vs_stocks(&pool, Scope::Prod, None, None)
        .await
        .expect("diff");
    assert_eq!(before.len(), 1);
    assert_eq!(before[0].diff, 7);

    let outcome = st
        .reconcile_service
        .opening_balance_backfill(&pool, Scope::Prod)
        .await
        .expect("costura");
    assert_eq!(outcome.inserted, 1);
    assert_eq!(outcome.skipped, 0);

    // agora os livros fecham, e o ref segue o formato OPEN:{wh}:{item}:{ck}
    let after = st
        .reconcile_service
        .diff_ledger_vs_stocks(&pool, Scope::Prod, None, None)
        .await
        .expect("diff pós");
    assert!(after.is_empty());

    let expected_ref = format!("OPEN:{}:{}:__NULL_BATCH__", wh, item);
    let (delta, sub): (i64, Option<String>) =
        sqlx::query_as("SELECT delta, sub_reason FROM stock_ledger WHERE ref = $1")
            .bind(&expected_ref)
            .fetch_one(&pool)
            .await
            .expect("linha de abertura");
    assert_eq!(delta, 7);
    assert_eq!(sub.as_deref(), Some("OPENING_BALANCE"));

    // rodar de novo não duplica nada
    let rerun = st
        .reconcile_service
        .opening_balance_backfill(&pool, Scope::Prod)
        .await
        .expect("reexecução");
    assert_eq!(rerun.inserted, 0);

    assert_conservation(&pool).await;
}
