// src/services/scan_orchestrator.rs

use chrono::Utc;
use serde_json::json;
use sqlx::{Acquire, PgConnection, PgPool, Postgres, Transaction};

use crate::{
    common::{
        error::AppError,
        tx::{finish, TxMode},
    },
    db::{AuditRepository, ItemRepository},
    models::{
        documents::{ReceiptDoc, ReceiptLine},
        inventory::{norm_batch_code, AdjustMeta, Effect, StockAdjustment},
        scan::{CountResult, ParsedScan, ScanEvidence, ScanMode, ScanOutcome, ScanRequest},
    },
    services::{
        barcode::{coerce_date, parse_gs1, parse_tokens},
        count_service::{CountCommand, CountService},
        receipt_service::ReceiptService,
        stock_service::StockService,
        three_books::ThreeBooksEnforcer,
    },
};

/// Largura da coluna `ref` no razão; o scan_ref é truncado para caber.
const REF_MAX_LEN: usize = 128;
const FLOW_SCAN: &str = "SCAN";
const REASON_PICK_OUT: &str = "OUTBOUND";

/// Porta de entrada dos coletores. Normaliza o payload em três camadas
/// (tokens KV explícitos → tabela de barcodes → GS1), decide o modo e
/// despacha para o workflow — nunca toca stocks diretamente.
///
/// Dois modos de execução:
/// - probe: roda o workflow num SAVEPOINT sempre desfeito (pré-voo de
///   UI); pick em probe é só parse, para não reservar lote;
/// - commit: roda e confirma.
///
/// A trilha de auditoria fica na transação externa: sobrevive ao probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOrchestrator {
    items: ItemRepository,
    audit: AuditRepository,
    receipt: ReceiptService,
    count: CountService,
    stock_svc: StockService,
    enforcer: ThreeBooksEnforcer,
}

fn build_scan_ref(scan: &ScanRequest) -> String {
    let dev = scan
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("dev");

    let ts_full = scan
        .ts
        .clone()
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    // precisão de minuto: 'YYYY-MM-DDTHH:MM'
    let ts: String = ts_full.chars().take(16).collect();

    let bc = scan.barcode.as_deref().map(str::trim).unwrap_or("");

    format!("scan:{dev}:{ts}:{bc}")
        .chars()
        .take(REF_MAX_LEN)
        .collect()
}

impl ScanOrchestrator {
    pub fn new(
        items: ItemRepository,
        audit: AuditRepository,
        receipt: ReceiptService,
        count: CountService,
        stock_svc: StockService,
        enforcer: ThreeBooksEnforcer,
    ) -> Self {
        Self {
            items,
            audit,
            receipt,
            count,
            stock_svc,
            enforcer,
        }
    }

    /// Consolida as três camadas de resolução. Campos explícitos do
    /// request só preenchem o que o barcode não trouxe.
    async fn parse(
        &self,
        conn: &mut PgConnection,
        scan: &ScanRequest,
    ) -> Result<ParsedScan, AppError> {
        let raw = scan.barcode.as_deref().unwrap_or("").trim().to_string();

        // 1) tokens KV explícitos
        let mut parsed = parse_tokens(&raw);

        // 2) o request cobre as lacunas
        parsed.item_id = parsed.item_id.or(scan.item_id);
        parsed.qty = parsed.qty.or(scan.qty);
        parsed.warehouse_id = parsed.warehouse_id.or(scan.warehouse_id);
        parsed.task_line_id = parsed.task_line_id.or(scan.task_line_id);
        if parsed.batch_code.is_none() {
            parsed.batch_code = norm_batch_code(scan.batch_code.as_deref());
        }
        if parsed.production_date.is_none() {
            parsed.production_date = scan.production_date.as_deref().and_then(coerce_date);
        }
        if parsed.expiry_date.is_none() {
            parsed.expiry_date = scan.expiry_date.as_deref().and_then(coerce_date);
        }

        // 3) tabela de barcodes (exato), depois SKU
        if !raw.is_empty() && parsed.item_id.is_none() {
            parsed.item_id = self.items.resolve_by_barcode(conn, &raw).await?;
        }
        if !raw.is_empty() && parsed.item_id.is_none() {
            parsed.item_id = self.items.resolve_by_sku(conn, &raw).await?;
        }

        // 4) último recurso: GS1
        if !raw.is_empty()
            && parsed.item_id.is_none()
            && parsed.batch_code.is_none()
            && parsed.expiry_date.is_none()
        {
            let gs1 = parse_gs1(&raw);
            if parsed.batch_code.is_none() {
                parsed.batch_code = gs1.batch_code.clone();
            }
            if parsed.expiry_date.is_none() {
                parsed.expiry_date = gs1.expiry_date;
            }
            if parsed.item_id.is_none() {
                if let Some(gtin) = &gs1.gtin {
                    parsed.item_id = self.items.resolve_by_barcode(conn, gtin).await?;
                    parsed.gtin = Some(gtin.clone());
                }
            }
        }

        Ok(parsed)
    }

    async fn run_count(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mode_tx: TxMode,
        cmd: CountCommand,
    ) -> Result<CountResult, AppError> {
        let mut sp = tx.begin().await?;
        match self.count.handle_count(&mut sp, cmd).await {
            Ok(result) => {
                finish(sp, mode_tx).await?;
                Ok(result)
            }
            Err(e) => {
                // drop desfaz o savepoint; a transação externa segue viva
                drop(sp);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_receive(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        mode_tx: TxMode,
        scan: &ScanRequest,
        parsed: &ParsedScan,
        scan_ref: &str,
        item_id: i64,
        warehouse_id: i64,
        qty: i64,
    ) -> Result<(), AppError> {
        if qty <= 0 {
            return Err(AppError::InvalidInput(
                "recebimento por scan exige quantidade positiva".into(),
            ));
        }
        if parsed.batch_code.is_none() {
            return Err(AppError::InvalidInput(
                "recebimento por scan exige batch_code".into(),
            ));
        }
        // Ou a validade veio impressa, ou pelo menos a produção veio.
        if parsed.production_date.is_none() && parsed.expiry_date.is_none() {
            return Err(AppError::InvalidInput(
                "recebimento por scan exige production_date ou expiry_date".into(),
            ));
        }

        let doc = ReceiptDoc {
            receipt_no: scan_ref.to_string(),
            warehouse_id,
            scope: scan.scope,
            lines: vec![ReceiptLine {
                line_no: 1,
                item_id,
                qty,
                batch_code: parsed.batch_code.clone(),
                production_date: parsed.production_date,
                expiry_date: parsed.expiry_date,
            }],
        };

        let mut sp = tx.begin().await?;
        match self
            .receipt
            .confirm(&mut *sp, &doc, None, Some(scan_ref.to_string()))
            .await
        {
            Ok(_) => {
                finish(sp, mode_tx).await?;
                Ok(())
            }
            Err(e) => {
                drop(sp);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_pick(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        scan: &ScanRequest,
        parsed: &ParsedScan,
        scan_ref: &str,
        item_id: i64,
        warehouse_id: i64,
        qty: i64,
    ) -> Result<(), AppError> {
        if qty <= 0 {
            return Err(AppError::InvalidInput(
                "pick exige quantidade positiva".into(),
            ));
        }
        let Some(batch_code) = parsed.batch_code.clone() else {
            return Err(AppError::InvalidInput("pick exige batch_code".into()));
        };

        let mut sp = tx.begin().await?;
        let now = Utc::now();

        let adjusted = self
            .stock_svc
            .adjust(
                &mut sp,
                StockAdjustment {
                    scope: scan.scope,
                    warehouse_id,
                    item_id,
                    batch_code: Some(batch_code.clone()),
                    delta: -qty,
                    reason: REASON_PICK_OUT.to_string(),
                    ref_doc: scan_ref.to_string(),
                    ref_line: 1,
                    occurred_at: now,
                    production_date: None,
                    expiry_date: None,
                    trace_id: Some(scan_ref.to_string()),
                    meta: AdjustMeta::default(),
                },
            )
            .await;

        let enforced = match adjusted {
            Ok(out) => {
                self.enforcer
                    .enforce(
                        &mut sp,
                        scan.scope,
                        scan_ref,
                        &[Effect {
                            warehouse_id,
                            item_id,
                            batch_code: out.batch_code.clone(),
                            qty_delta: -qty,
                            ref_doc: scan_ref.to_string(),
                            ref_line: 1,
                            reason: Some(REASON_PICK_OUT.to_string()),
                        }],
                        now,
                    )
                    .await
            }
            Err(e) => Err(e),
        };

        match enforced {
            Ok(()) => {
                finish(sp, TxMode::Commit).await?;
                Ok(())
            }
            Err(e) => {
                drop(sp);
                Err(e)
            }
        }
    }

    /// Entrada única do /scan. Nunca propaga erro: qualquer falha vira
    /// `{ok: false, errors: […]}` com a trilha de auditoria gravada.
    pub async fn ingest(&self, pool: &PgPool, scan: ScanRequest) -> ScanOutcome {
        let scan_ref = build_scan_ref(&scan);
        let mode_raw = scan
            .mode
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("count")
            .to_lowercase();
        let probe = scan.probe;

        let mut tx = match pool.begin().await {
            Ok(tx) => tx,
            Err(e) => return ScanOutcome::failure(scan_ref, "ingest", e.to_string()),
        };

        // Modo aposentado / desconhecido: rejeita antes de qualquer parse.
        let mode = match mode_raw.as_str() {
            "receive" => ScanMode::Receive,
            "pick" => ScanMode::Pick,
            "count" => ScanMode::Count,
            other => {
                let event_id = self
                    .audit
                    .write(&mut tx, FLOW_SCAN, "scan_feature_disabled", Some(&scan_ref), None, None)
                    .await
                    .ok();
                let _ = tx.commit().await;

                let mut outcome = ScanOutcome::failure(
                    scan_ref,
                    "ingest",
                    format!("FEATURE_DISABLED: {other}"),
                );
                outcome.event_id = event_id;
                outcome.source = Some("scan_feature_disabled".into());
                outcome.evidence.push(ScanEvidence {
                    source: "scan_feature_disabled".into(),
                    db: true,
                });
                return outcome;
            }
        };

        // Parse (camadas de resolução) — pode consultar o banco.
        let parsed = match self.parse(&mut tx, &scan).await {
            Ok(p) => p,
            Err(e) => {
                let _ = self
                    .audit
                    .write(&mut tx, FLOW_SCAN, "scan_parse_error", Some(&scan_ref), None, None)
                    .await;
                let _ = tx.commit().await;
                return ScanOutcome::failure(scan_ref, "parse", e.to_string());
            }
        };

        let qty = parsed.qty.unwrap_or(1);
        let warehouse_id = parsed.warehouse_id.unwrap_or(1);

        // Sem item resolvido não há para onde despachar.
        let Some(item_id) = parsed.item_id.filter(|&i| i > 0) else {
            let err = AppError::UnknownBarcode(scan.barcode.clone().unwrap_or_default());
            let event_id = self
                .audit
                .write(&mut tx, FLOW_SCAN, "scan_unknown_barcode", Some(&scan_ref), None, None)
                .await
                .ok();
            let _ = tx.commit().await;

            let mut outcome = ScanOutcome::failure(scan_ref, "parse", err.to_string());
            outcome.event_id = event_id;
            outcome.source = Some("scan_unknown_barcode".into());
            return outcome;
        };

        let mut evidence = vec![];
        let mode_name = mode.as_str();

        // Trilha: o caminho decidido, com os argumentos resolvidos.
        let path_meta = json!({
            "dedup": scan_ref,
            "kw": {
                "item_id": item_id,
                "warehouse_id": warehouse_id,
                "qty": qty,
                "batch_code": parsed.batch_code,
                "production_date": parsed.production_date.map(|d| d.to_string()),
                "expiry_date": parsed.expiry_date.map(|d| d.to_string()),
                "task_line_id": parsed.task_line_id,
                "trace_id": scan_ref,
            },
        });
        if self
            .audit
            .write(
                &mut tx,
                FLOW_SCAN,
                &format!("scan_{mode_name}_path"),
                Some(&scan_ref),
                Some(&scan_ref),
                Some(path_meta),
            )
            .await
            .is_ok()
        {
            evidence.push(ScanEvidence {
                source: format!("scan_{mode_name}_path"),
                db: true,
            });
        }

        let mode_tx = TxMode::from_probe(probe);
        let mut count_payload: Option<CountResult> = None;

        let handled: Result<(), AppError> = match mode {
            ScanMode::Count => {
                let cmd = CountCommand {
                    scope: scan.scope,
                    warehouse_id,
                    item_id,
                    batch_code: parsed.batch_code.clone(),
                    actual: qty,
                    ref_doc: scan_ref.clone(),
                    production_date: parsed.production_date,
                    expiry_date: parsed.expiry_date,
                    trace_id: Some(scan_ref.clone()),
                };
                self.run_count(&mut tx, mode_tx, cmd).await.map(|result| {
                    count_payload = Some(result);
                })
            }
            ScanMode::Receive => {
                self.run_receive(
                    &mut tx,
                    mode_tx,
                    &scan,
                    &parsed,
                    &scan_ref,
                    item_id,
                    warehouse_id,
                    qty,
                )
                .await
            }
            ScanMode::Pick => {
                // pick em probe: só parse, não reserva lote nenhum
                if probe {
                    Ok(())
                } else {
                    self.run_pick(
                        &mut tx,
                        &scan,
                        &parsed,
                        &scan_ref,
                        item_id,
                        warehouse_id,
                        qty,
                    )
                    .await
                }
            }
        };

        match handled {
            Ok(()) => {
                let (event, source, committed) = if probe {
                    let src = if mode == ScanMode::Pick {
                        format!("scan_{mode_name}_probe_parse_only")
                    } else {
                        format!("scan_{mode_name}_probe")
                    };
                    (format!("scan_{mode_name}_probe"), src, false)
                } else {
                    (
                        format!("scan_{mode_name}_commit"),
                        format!("scan_{mode_name}_commit"),
                        true,
                    )
                };

                let event_id = self
                    .audit
                    .write(&mut tx, FLOW_SCAN, &event, Some(&scan_ref), Some(&scan_ref), None)
                    .await
                    .ok();
                evidence.push(ScanEvidence {
                    source: source.clone(),
                    db: true,
                });

                match tx.commit().await {
                    Ok(()) => ScanOutcome {
                        ok: true,
                        committed,
                        scan_ref,
                        event_id,
                        source: Some(source),
                        evidence,
                        errors: vec![],
                        item_id: Some(item_id),
                        count: count_payload,
                    },
                    Err(e) => ScanOutcome::failure(scan_ref, "commit", e.to_string()),
                }
            }
            Err(err) => {
                let event_id = self
                    .audit
                    .write(
                        &mut tx,
                        FLOW_SCAN,
                        &format!("scan_{mode_name}_error"),
                        Some(&scan_ref),
                        Some(&scan_ref),
                        Some(json!({ "error": err.to_string() })),
                    )
                    .await
                    .ok();
                let _ = tx.commit().await;

                let mut outcome = ScanOutcome::failure(scan_ref, mode_name, err.to_string());
                outcome.event_id = event_id;
                outcome.source = Some(format!("scan_{mode_name}_error"));
                outcome.evidence = evidence;
                outcome.item_id = Some(item_id);
                outcome
            }
        }
    }
}
