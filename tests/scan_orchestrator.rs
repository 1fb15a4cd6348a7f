// tests/scan_orchestrator.rs
//
// O orquestrador de scan: camadas de resolução, probe vs commit,
// modos aposentados e barcodes irreconhecíveis.

mod common;

use common::*;
use sqlx::PgPool;
use wms_core::models::scan::ScanRequest;

fn scan(barcode: &str, mode: &str, probe: bool) -> ScanRequest {
    ScanRequest {
        barcode: Some(barcode.to_string()),
        mode: Some(mode.to_string()),
        probe,
        device_id: Some("pda-1".into()),
        ts: Some("2026-08-01T12:00:00+00:00".into()),
        ..Default::default()
    }
}

#[sqlx::test(migrations = "./migrations")]
async fn count_probe_reports_without_persisting(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN1").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    let barcode = format!("ITM:{item} QTY:5 B:B1 WH:{wh}");
    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan(&barcode, "count", true))
        .await;

    assert!(outcome.ok, "erros: {:?}", outcome.errors);
    assert!(!outcome.committed);
    let count = outcome.count.expect("payload da contagem");
    assert_eq!(count.delta, 0);
    assert_eq!(count.before, 5);

    // probe desfez tudo: nenhuma linha de contagem ficou no razão
    assert_eq!(ledger_count(&pool, &outcome.scan_ref).await, 0);
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 5);

    // ...mas a trilha de auditoria sobreviveu ao rollback do probe
    let audit_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM audit_events WHERE ref = $1")
            .bind(&outcome.scan_ref)
            .fetch_one(&pool)
            .await
            .expect("auditoria");
    assert!(audit_rows >= 2, "path + probe");
}

#[sqlx::test(migrations = "./migrations")]
async fn count_commit_adjusts_and_logs(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN2").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    let barcode = format!("ITM:{item} QTY:3 B:B1 WH:{wh}");
    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan(&barcode, "count", false))
        .await;

    assert!(outcome.ok, "erros: {:?}", outcome.errors);
    assert!(outcome.committed);
    assert_eq!(outcome.count.as_ref().map(|c| c.delta), Some(-2));

    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 3);
    assert_eq!(ledger_count(&pool, &outcome.scan_ref).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn receive_commit_books_through_the_receipt_workflow(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN3").await;

    let barcode = format!("ITM:{item} QTY:10 B:L7 EXP:20271231 WH:{wh}");
    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan(&barcode, "receive", false))
        .await;

    assert!(outcome.ok, "erros: {:?}", outcome.errors);
    assert!(outcome.committed);
    assert_eq!(stock_qty(&pool, wh, item, "L7").await, 10);

    let (reason, ref_doc): (String, String) = sqlx::query_as(
        "SELECT reason, ref FROM stock_ledger WHERE item_id = $1",
    )
    .bind(item)
    .fetch_one(&pool)
    .await
    .expect("linha de recebimento");
    assert_eq!(reason, "RECEIPT");
    assert_eq!(ref_doc, outcome.scan_ref);

    assert_conservation(&pool).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn receive_probe_runs_the_workflow_and_rolls_back(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN4").await;

    let barcode = format!("ITM:{item} QTY:10 B:L7 EXP:20271231 WH:{wh}");
    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan(&barcode, "receive", true))
        .await;

    assert!(outcome.ok);
    assert!(!outcome.committed);
    assert_eq!(stock_qty(&pool, wh, item, "L7").await, 0);
    assert_eq!(ledger_count(&pool, &outcome.scan_ref).await, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn pick_commit_deducts_the_named_batch(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN5").await;
    receive_batch(&st, wh, item, "B1", 8, d(2027, 1, 1), "SEED").await;

    let barcode = format!("ITM:{item} QTY:3 B:B1 WH:{wh}");
    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan(&barcode, "pick", false))
        .await;

    assert!(outcome.ok, "erros: {:?}", outcome.errors);
    assert!(outcome.committed);
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 5);

    let (reason, canon): (String, Option<String>) =
        sqlx::query_as("SELECT reason, reason_canon FROM stock_ledger WHERE ref = $1")
            .bind(&outcome.scan_ref)
            .fetch_one(&pool)
            .await
            .expect("perna do pick");
    assert_eq!(reason, "OUTBOUND");
    assert_eq!(canon.as_deref(), Some("SHIPMENT"));
}

#[sqlx::test(migrations = "./migrations")]
async fn pick_probe_is_parse_only(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN6").await;
    receive_batch(&st, wh, item, "B1", 8, d(2027, 1, 1), "SEED").await;

    let barcode = format!("ITM:{item} QTY:3 B:B1 WH:{wh}");
    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan(&barcode, "pick", true))
        .await;

    assert!(outcome.ok);
    assert!(!outcome.committed);
    assert_eq!(outcome.source.as_deref(), Some("scan_pick_probe_parse_only"));
    // nada reservado, nada baixado
    assert_eq!(stock_qty(&pool, wh, item, "B1").await, 8);
}

#[sqlx::test(migrations = "./migrations")]
async fn putaway_mode_is_rejected(pool: PgPool) {
    let st = state(&pool);
    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan("ITM:1 QTY:1", "putaway", false))
        .await;

    assert!(!outcome.ok);
    assert!(outcome.errors[0].error.contains("FEATURE_DISABLED: putaway"));
}

#[sqlx::test(migrations = "./migrations")]
async fn unresolvable_barcode_fails_fast(pool: PgPool) {
    let st = state(&pool);
    seed_warehouse(&pool, "WH1").await;

    let outcome = st
        .scan_orchestrator
        .ingest(&pool, scan("XYZ-NADA", "count", false))
        .await;

    assert!(!outcome.ok);
    assert_eq!(outcome.source.as_deref(), Some("scan_unknown_barcode"));
}

#[sqlx::test(migrations = "./migrations")]
async fn barcode_table_resolves_the_item(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN7").await;
    seed_barcode(&pool, item, "7891234567890").await;
    receive_batch(&st, wh, item, "B1", 5, d(2027, 1, 1), "SEED").await;

    // barcode puro resolve o item; lote e warehouse vêm dos campos explícitos
    let req = ScanRequest {
        barcode: Some("7891234567890".into()),
        mode: Some("count".into()),
        probe: true,
        batch_code: Some("B1".into()),
        warehouse_id: Some(wh),
        qty: Some(5),
        device_id: Some("pda-1".into()),
        ts: Some("2026-08-01T12:00:00+00:00".into()),
        ..Default::default()
    };
    let outcome = st.scan_orchestrator.ingest(&pool, req).await;

    assert!(outcome.ok, "erros: {:?}", outcome.errors);
    assert_eq!(outcome.item_id, Some(item));
    assert_eq!(outcome.count.map(|c| c.delta), Some(0));
}

#[sqlx::test(migrations = "./migrations")]
async fn gs1_barcode_brings_batch_and_expiry(pool: PgPool) {
    let st = state(&pool);
    let wh = seed_warehouse(&pool, "WH1").await;
    let item = seed_batch_item(&pool, "SKU-SCAN8").await;
    seed_barcode(&pool, item, "12345678901234").await;

    let req = ScanRequest {
        barcode: Some("(01)12345678901234(17)271231(10)LOTE-G".into()),
        mode: Some("receive".into()),
        probe: false,
        qty: Some(6),
        warehouse_id: Some(wh),
        device_id: Some("pda-1".into()),
        ts: Some("2026-08-01T12:00:00+00:00".into()),
        ..Default::default()
    };
    let outcome = st.scan_orchestrator.ingest(&pool, req).await;

    assert!(outcome.ok, "erros: {:?}", outcome.errors);
    assert_eq!(stock_qty(&pool, wh, item, "LOTE-G").await, 6);

    let exp: Option<chrono::NaiveDate> = sqlx::query_scalar(
        "SELECT expiry_date FROM batches WHERE item_id = $1 AND batch_code = 'LOTE-G'",
    )
    .bind(item)
    .fetch_one(&pool)
    .await
    .expect("lote GS1");
    assert_eq!(exp, Some(d(2027, 12, 31)));
}
