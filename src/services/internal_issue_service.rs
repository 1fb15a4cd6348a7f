// src/services/internal_issue_service.rs

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Acquire, PgConnection, Postgres};

use crate::{
    common::error::AppError,
    db::{AuditRepository, DocumentsRepository},
    models::{
        documents::{InternalIssueDoc, InternalIssueDocWithLines},
        inventory::{norm_batch_code, AdjustMeta, Effect, Scope, StockAdjustment},
    },
    services::{
        fefo_allocator::FefoAllocator, stock_service::StockService,
        three_books::ThreeBooksEnforcer,
    },
};

const REASON_INTERNAL_OUT: &str = "INTERNAL_OUT";
const FLOW_OUTBOUND: &str = "OUTBOUND";

/// Saída interna (amostra / uso interno / descarte): cabeçalho + linhas,
/// DRAFT → CONFIRMED / CANCELED, razão só na confirmação.
///
/// - o cabeçalho registra o recebedor (recipient_name), obrigatório
///   antes de confirmar;
/// - linha pode fixar o lote; sem lote a baixa fan-out por FEFO com
///   ref_line = line_no*100 + seq;
/// - confirmação fecha com o verificador dos três livros.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalIssueService {
    docs: DocumentsRepository,
    audit: AuditRepository,
    stock_svc: StockService,
    fefo: FefoAllocator,
    enforcer: ThreeBooksEnforcer,
}

fn gen_doc_no(warehouse_id: i64, now: DateTime<Utc>) -> String {
    format!("INT-OUT:WH{}:{}", warehouse_id, now.format("%Y%m%d%H%M%S"))
}

fn gen_trace_id(warehouse_id: i64, doc_no: &str) -> String {
    format!("INT-OUT:{warehouse_id}:{doc_no}")
}

impl InternalIssueService {
    pub fn new(
        docs: DocumentsRepository,
        audit: AuditRepository,
        stock_svc: StockService,
        fefo: FefoAllocator,
        enforcer: ThreeBooksEnforcer,
    ) -> Self {
        Self {
            docs,
            audit,
            stock_svc,
            fefo,
            enforcer,
        }
    }

    async fn load(
        &self,
        conn: &mut PgConnection,
        doc_id: i64,
        for_update: bool,
    ) -> Result<InternalIssueDocWithLines, AppError> {
        let doc = self
            .docs
            .get_internal_doc(conn, doc_id, for_update)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("saída interna {doc_id}")))?;
        let lines = self.docs.list_internal_lines(conn, doc_id).await?;
        Ok(InternalIssueDocWithLines { doc, lines })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_doc<'a, A>(
        &self,
        db: A,
        scope: Scope,
        warehouse_id: i64,
        doc_type: &str,
        recipient_name: &str,
        recipient_note: Option<&str>,
        note: Option<&str>,
        trace_id: Option<String>,
    ) -> Result<InternalIssueDocWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let recipient = recipient_name.trim();
        if recipient.is_empty() {
            return Err(AppError::InvalidInput(
                "saída interna exige o nome do recebedor (recipient_name)".into(),
            ));
        }

        let mut tx = db.begin().await?;

        let now = Utc::now();
        let doc_no = gen_doc_no(warehouse_id, now);
        let ti = trace_id.unwrap_or_else(|| gen_trace_id(warehouse_id, &doc_no));

        let doc: InternalIssueDoc = self
            .docs
            .insert_internal_doc(
                &mut tx,
                scope,
                warehouse_id,
                &doc_no,
                doc_type,
                recipient,
                recipient_note,
                note,
                &ti,
            )
            .await?;

        self.audit
            .write(
                &mut tx,
                FLOW_OUTBOUND,
                "INTERNAL_OUT_CREATED",
                Some(&doc_no),
                Some(&ti),
                Some(json!({
                    "doc_id": doc.id,
                    "doc_no": doc_no,
                    "warehouse_id": warehouse_id,
                    "doc_type": doc_type,
                    "recipient_name": recipient,
                })),
            )
            .await?;

        let out = self.load(&mut tx, doc.id, false).await?;
        tx.commit().await?;
        Ok(out)
    }

    /// Acrescenta ou acumula uma linha (mesma chave item+lote soma):
    /// - só em DRAFT;
    /// - qty pode ser negativa para reduzir, mas o total nunca fica < 0.
    pub async fn upsert_line<'a, A>(
        &self,
        db: A,
        doc_id: i64,
        item_id: i64,
        qty: i64,
        batch_code: Option<&str>,
        note: Option<&str>,
    ) -> Result<InternalIssueDocWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut tx = db.begin().await?;

        if qty == 0 {
            let out = self.load(&mut tx, doc_id, false).await?;
            tx.commit().await?;
            return Ok(out);
        }

        let with_lines = self.load(&mut tx, doc_id, true).await?;
        if with_lines.doc.status != "DRAFT" {
            return Err(AppError::DocState(format!(
                "saída interna {} está {}; linhas só mudam em DRAFT",
                doc_id, with_lines.doc.status
            )));
        }

        let norm_code = norm_batch_code(batch_code);
        let existing = self
            .docs
            .find_internal_line(&mut tx, doc_id, item_id, norm_code.as_deref())
            .await?;

        match existing {
            Some(line) => {
                let new_qty = line.requested_qty + qty;
                if new_qty < 0 {
                    return Err(AppError::InvalidInput(format!(
                        "linha do item {item_id} ficaria negativa ({new_qty})"
                    )));
                }
                self.docs
                    .update_internal_line(&mut tx, line.id, new_qty, norm_code.as_deref(), note)
                    .await?;
            }
            None => {
                if qty < 0 {
                    return Err(AppError::InvalidInput(format!(
                        "linha do item {item_id} ficaria negativa ({qty})"
                    )));
                }
                let line_no = self.docs.next_internal_line_no(&mut tx, doc_id).await?;
                self.docs
                    .insert_internal_line(
                        &mut tx,
                        doc_id,
                        line_no,
                        item_id,
                        norm_code.as_deref(),
                        qty,
                        note,
                    )
                    .await?;
            }
        }

        let out = self.load(&mut tx, doc_id, false).await?;
        tx.commit().await?;
        Ok(out)
    }

    /// Confirma o documento: baixa real de estoque + razão + auditoria,
    /// fechando com o verificador dos três livros.
    pub async fn confirm<'a, A>(
        &self,
        db: A,
        doc_id: i64,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Result<InternalIssueDocWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut tx = db.begin().await?;

        let with_lines = self.load(&mut tx, doc_id, true).await?;
        let doc = &with_lines.doc;

        if doc.status != "DRAFT" {
            return Err(AppError::DocState(format!(
                "saída interna {} está {}; não pode ser confirmada de novo",
                doc_id, doc.status
            )));
        }
        if doc.recipient_name.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "saída interna {doc_id} sem recebedor; confirmação bloqueada"
            )));
        }
        if with_lines.lines.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "saída interna {doc_id} sem linhas; nada a confirmar"
            )));
        }

        let now = occurred_at.unwrap_or_else(Utc::now);
        let ref_doc = doc.doc_no.clone();
        let trace_id = doc
            .trace_id
            .clone()
            .unwrap_or_else(|| gen_trace_id(doc.warehouse_id, &doc.doc_no));
        let scope = doc.scope;
        let warehouse_id = doc.warehouse_id;

        let mut effects: Vec<Effect> = Vec::new();

        for line in &with_lines.lines {
            let qty = line.confirmed_qty.unwrap_or(line.requested_qty);
            if qty <= 0 {
                continue;
            }

            match norm_batch_code(line.batch_code.as_deref()) {
                // Lote fixado na linha: baixa direta.
                Some(code) => {
                    let out = self
                        .stock_svc
                        .adjust(
                            &mut tx,
                            StockAdjustment {
                                scope,
                                warehouse_id,
                                item_id: line.item_id,
                                batch_code: Some(code),
                                delta: -qty,
                                reason: REASON_INTERNAL_OUT.to_string(),
                                ref_doc: ref_doc.clone(),
                                ref_line: line.line_no,
                                occurred_at: now,
                                production_date: None,
                                expiry_date: None,
                                trace_id: Some(trace_id.clone()),
                                meta: AdjustMeta::default(),
                            },
                        )
                        .await?;

                    effects.push(Effect {
                        warehouse_id,
                        item_id: line.item_id,
                        batch_code: out.batch_code,
                        qty_delta: -qty,
                        ref_doc: ref_doc.clone(),
                        ref_line: line.line_no,
                        reason: Some(REASON_INTERNAL_OUT.to_string()),
                    });
                }
                // Sem lote: fan-out FEFO, ref_line = line_no*100 + seq.
                None => {
                    let res = self
                        .fefo
                        .ship(
                            &mut tx,
                            scope,
                            warehouse_id,
                            line.item_id,
                            qty,
                            REASON_INTERNAL_OUT,
                            &ref_doc,
                            now,
                            false,
                            line.line_no * 100 + 1,
                            Some(trace_id.clone()),
                            None,
                        )
                        .await?;

                    for leg in res.legs {
                        effects.push(Effect {
                            warehouse_id,
                            item_id: line.item_id,
                            batch_code: leg.batch_code,
                            qty_delta: leg.delta,
                            ref_doc: ref_doc.clone(),
                            ref_line: leg.ref_line,
                            reason: Some(REASON_INTERNAL_OUT.to_string()),
                        });
                    }
                }
            }
        }

        self.docs
            .set_internal_doc_status(&mut tx, doc_id, "CONFIRMED", Some(now), None)
            .await?;

        self.audit
            .write(
                &mut tx,
                FLOW_OUTBOUND,
                "INTERNAL_OUT_CONFIRMED",
                Some(&ref_doc),
                Some(&trace_id),
                Some(json!({
                    "doc_id": doc_id,
                    "doc_no": ref_doc,
                    "warehouse_id": warehouse_id,
                    "recipient_name": doc.recipient_name,
                    "lines": with_lines
                        .lines
                        .iter()
                        .map(|ln| json!({
                            "line_no": ln.line_no,
                            "item_id": ln.item_id,
                            "batch_code": ln.batch_code,
                            "requested_qty": ln.requested_qty,
                            "confirmed_qty": ln.confirmed_qty,
                        }))
                        .collect::<Vec<_>>(),
                })),
            )
            .await?;

        self.enforcer
            .enforce(&mut tx, scope, &ref_doc, &effects, now)
            .await?;

        let out = self.load(&mut tx, doc_id, false).await?;
        tx.commit().await?;

        tracing::info!(doc_no = %out.doc.doc_no, "saída interna confirmada");
        Ok(out)
    }

    /// Cancela um rascunho: nada de estoque para desfazer.
    pub async fn cancel<'a, A>(
        &self,
        db: A,
        doc_id: i64,
    ) -> Result<InternalIssueDocWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut tx = db.begin().await?;

        let with_lines = self.load(&mut tx, doc_id, true).await?;
        if with_lines.doc.status != "DRAFT" {
            return Err(AppError::DocState(format!(
                "saída interna {} está {}; não pode ser cancelada",
                doc_id, with_lines.doc.status
            )));
        }

        self.docs
            .set_internal_doc_status(&mut tx, doc_id, "CANCELED", None, Some(Utc::now()))
            .await?;

        self.audit
            .write(
                &mut tx,
                FLOW_OUTBOUND,
                "INTERNAL_OUT_CANCELED",
                Some(&with_lines.doc.doc_no),
                with_lines.doc.trace_id.as_deref(),
                Some(json!({
                    "doc_id": doc_id,
                    "doc_no": with_lines.doc.doc_no,
                    "warehouse_id": with_lines.doc.warehouse_id,
                })),
            )
            .await?;

        let out = self.load(&mut tx, doc_id, false).await?;
        tx.commit().await?;
        Ok(out)
    }

    pub async fn get<'a, A>(&self, db: A, doc_id: i64) -> Result<InternalIssueDocWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut conn = db.acquire().await?;
        self.load(&mut conn, doc_id, false).await
    }
}
