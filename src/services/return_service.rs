// src/services/return_service.rs

use chrono::{DateTime, Utc};
use sqlx::{Acquire, PgConnection, Postgres};

use crate::{
    common::error::AppError,
    db::{DocumentsRepository, StockRepository},
    models::{
        documents::ReturnTaskWithLines,
        inventory::{norm_batch_code, AdjustMeta, Effect, Scope, StockAdjustment},
    },
    services::{stock_service::StockService, three_books::ThreeBooksEnforcer},
};

const REASON_RETURN_OUT: &str = "RETURN_OUT";

/// Devolução a fornecedor contra um pedido de compra:
///
/// - create_for_po: tarefa DRAFT; expected_qty = min(recebido no PO,
///   disponível no armazém) — não se promete devolver o que não há;
/// - record_pick: acumula intenção (picked_qty); nada de estoque se move,
///   e o lote é obrigatório desde o primeiro pick;
/// - commit: a única baixa real — adjust(-picked, RETURN_OUT,
///   ref=RTN-{task}, ref_line = id da linha) e desconto do recebido
///   do PO (nunca abaixo de zero), fechado pelos três livros.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnTaskService {
    docs: DocumentsRepository,
    stocks: StockRepository,
    stock_svc: StockService,
    enforcer: ThreeBooksEnforcer,
}

impl ReturnTaskService {
    pub fn new(
        docs: DocumentsRepository,
        stocks: StockRepository,
        stock_svc: StockService,
        enforcer: ThreeBooksEnforcer,
    ) -> Self {
        Self {
            docs,
            stocks,
            stock_svc,
            enforcer,
        }
    }

    async fn load(
        &self,
        conn: &mut PgConnection,
        task_id: i64,
        for_update: bool,
    ) -> Result<ReturnTaskWithLines, AppError> {
        let task = self
            .docs
            .get_return_task(conn, task_id, for_update)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("tarefa de devolução {task_id}")))?;
        let lines = self.docs.list_return_lines(conn, task_id).await?;
        Ok(ReturnTaskWithLines { task, lines })
    }

    fn line_status(picked: i64, expected: Option<i64>) -> &'static str {
        match expected {
            Some(e) if picked == e => "MATCHED",
            Some(_) => "MISMATCH",
            None => "DRAFT",
        }
    }

    pub async fn create_for_po<'a, A>(
        &self,
        db: A,
        scope: Scope,
        po_id: i64,
        warehouse_id: Option<i64>,
        include_zero_received: bool,
    ) -> Result<ReturnTaskWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut tx = db.begin().await?;

        let po = self
            .docs
            .get_po(&mut tx, po_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("pedido de compra {po_id}")))?;
        let po_lines = self.docs.list_po_lines(&mut tx, po_id).await?;
        let wh_id = warehouse_id.unwrap_or(po.warehouse_id);

        let task = self
            .docs
            .insert_return_task(
                &mut tx,
                scope,
                Some(po.id),
                wh_id,
                Some(&po.supplier_name),
                Some(&format!("return from PO-{}", po.id)),
            )
            .await?;

        let mut created = 0usize;
        for line in &po_lines {
            let received = line.qty_received.max(0);
            if received <= 0 && !include_zero_received {
                continue;
            }

            // Teto honesto: nunca esperar devolver mais do que existe.
            let available = self
                .stocks
                .available_total(&mut tx, scope, wh_id, line.item_id)
                .await?;
            let expected = received.min(available).max(0);

            self.docs
                .insert_return_line(
                    &mut tx,
                    task.id,
                    Some(line.id),
                    line.item_id,
                    None,
                    Some(expected),
                    0,
                    "DRAFT",
                )
                .await?;
            created += 1;
        }

        if created == 0 {
            return Err(AppError::DocState(format!(
                "PO {po_id} não tem quantidade recebida para devolver"
            )));
        }

        let out = self.load(&mut tx, task.id, false).await?;
        tx.commit().await?;
        Ok(out)
    }

    /// Registra intenção de pick na tarefa. Estoque intocado.
    pub async fn record_pick<'a, A>(
        &self,
        db: A,
        task_id: i64,
        item_id: i64,
        qty: i64,
        batch_code: &str,
    ) -> Result<ReturnTaskWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let Some(code) = norm_batch_code(Some(batch_code)) else {
            return Err(AppError::InvalidInput(
                "pick de devolução exige batch_code".into(),
            ));
        };

        let mut tx = db.begin().await?;

        if qty == 0 {
            let out = self.load(&mut tx, task_id, false).await?;
            tx.commit().await?;
            return Ok(out);
        }

        let with_lines = self.load(&mut tx, task_id, true).await?;
        if with_lines.task.status != "DRAFT" {
            return Err(AppError::DocState(format!(
                "tarefa {} está {}; picks só em DRAFT",
                task_id, with_lines.task.status
            )));
        }

        let existing = self
            .docs
            .find_return_line(&mut tx, task_id, item_id, &code)
            .await?
            // linha do PO ainda sem lote também serve de alvo
            .or_else(|| {
                with_lines
                    .lines
                    .iter()
                    .find(|l| l.item_id == item_id && l.batch_code.is_none())
                    .cloned()
            });

        match existing {
            Some(line) => {
                let picked = line.picked_qty + qty;
                if picked < 0 {
                    return Err(AppError::InvalidInput(format!(
                        "picked_qty do item {item_id} ficaria negativo ({picked})"
                    )));
                }
                let status = Self::line_status(picked, line.expected_qty);
                self.docs
                    .update_return_line_pick(&mut tx, line.id, picked, &code, status)
                    .await?;
            }
            None => {
                if qty < 0 {
                    return Err(AppError::InvalidInput(format!(
                        "picked_qty do item {item_id} ficaria negativo ({qty})"
                    )));
                }
                self.docs
                    .insert_return_line(
                        &mut tx,
                        task_id,
                        None,
                        item_id,
                        Some(&code),
                        None,
                        qty,
                        "DRAFT",
                    )
                    .await?;
            }
        }

        let out = self.load(&mut tx, task_id, false).await?;
        tx.commit().await?;
        Ok(out)
    }

    /// A baixa real: uma perna de razão por linha com pick, e o recebido
    /// do PO desce junto.
    pub async fn commit<'a, A>(
        &self,
        db: A,
        task_id: i64,
        trace_id: Option<String>,
        occurred_at: Option<DateTime<Utc>>,
    ) -> Result<ReturnTaskWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut tx = db.begin().await?;

        let with_lines = self.load(&mut tx, task_id, true).await?;
        let task = &with_lines.task;

        if task.status != "DRAFT" {
            return Err(AppError::DocState(format!(
                "tarefa {} está {}; commit já aconteceu",
                task_id, task.status
            )));
        }
        if with_lines.lines.is_empty() {
            return Err(AppError::DocState(format!(
                "tarefa {task_id} sem linhas; nada a devolver"
            )));
        }

        // Pré-validação: linha com pick sem lote não passa.
        for line in &with_lines.lines {
            if line.picked_qty != 0 && norm_batch_code(line.batch_code.as_deref()).is_none() {
                return Err(AppError::BatchRequired {
                    item_id: line.item_id,
                });
            }
        }

        let now = occurred_at.unwrap_or_else(Utc::now);
        let ref_doc = format!("RTN-{}", task.id);
        let scope = task.scope;
        let warehouse_id = task.warehouse_id;

        let mut effects: Vec<Effect> = Vec::new();

        for line in &with_lines.lines {
            let picked = line.picked_qty;
            if picked == 0 {
                self.docs
                    .mark_return_line_committed(&mut tx, line.id, 0)
                    .await?;
                continue;
            }

            let batch_code = norm_batch_code(line.batch_code.as_deref());
            let ref_line = line.id as i32;

            let out = self
                .stock_svc
                .adjust(
                    &mut tx,
                    StockAdjustment {
                        scope,
                        warehouse_id,
                        item_id: line.item_id,
                        batch_code: batch_code.clone(),
                        delta: -picked,
                        reason: REASON_RETURN_OUT.to_string(),
                        ref_doc: ref_doc.clone(),
                        ref_line,
                        occurred_at: now,
                        production_date: None,
                        expiry_date: None,
                        trace_id: trace_id.clone(),
                        meta: AdjustMeta::default(),
                    },
                )
                .await?;

            effects.push(Effect {
                warehouse_id,
                item_id: line.item_id,
                batch_code: out.batch_code,
                qty_delta: -picked,
                ref_doc: ref_doc.clone(),
                ref_line,
                reason: Some(REASON_RETURN_OUT.to_string()),
            });

            self.docs
                .mark_return_line_committed(&mut tx, line.id, picked)
                .await?;

            if let Some(po_line_id) = line.po_line_id {
                self.docs
                    .decrement_po_line_received(&mut tx, po_line_id, picked)
                    .await?;
            }
        }

        self.docs
            .set_return_task_status(&mut tx, task_id, "COMMITTED")
            .await?;

        self.enforcer
            .enforce(&mut tx, scope, &ref_doc, &effects, now)
            .await?;

        let out = self.load(&mut tx, task_id, false).await?;
        tx.commit().await?;

        tracing::info!(task_id, ref_doc = %ref_doc, "devolução a fornecedor confirmada");
        Ok(out)
    }

    pub async fn get<'a, A>(&self, db: A, task_id: i64) -> Result<ReturnTaskWithLines, AppError>
    where
        A: Acquire<'a, Database = Postgres>,
    {
        let mut conn = db.acquire().await?;
        self.load(&mut conn, task_id, false).await
    }
}
