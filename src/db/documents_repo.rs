// src/db/documents_repo.rs
//
// Persistência dos documentos que orbitam o núcleo: saída interna e
// devolução a fornecedor (mais o pedido de compra que a sustenta).

use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    models::{
        documents::{
            InternalIssueDoc, InternalIssueLine, PurchaseOrder, PurchaseOrderLine, ReturnTask,
            ReturnTaskLine,
        },
        inventory::Scope,
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentsRepository;

impl DocumentsRepository {
    pub fn new() -> Self {
        Self
    }

    // ------------------------------------------------------------------
    // Saída interna
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_internal_doc(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        warehouse_id: i64,
        doc_no: &str,
        doc_type: &str,
        recipient_name: &str,
        recipient_note: Option<&str>,
        note: Option<&str>,
        trace_id: &str,
    ) -> Result<InternalIssueDoc, AppError> {
        let doc = sqlx::query_as::<_, InternalIssueDoc>(
            r#"
            INSERT INTO internal_issue_docs (
                scope, warehouse_id, doc_no, doc_type, status,
                recipient_name, recipient_note, note, trace_id
            )
            VALUES ($1, $2, $3, $4, 'DRAFT', $5, $6, $7, $8)
            RETURNING id, scope, warehouse_id, doc_no, doc_type, status,
                      recipient_name, recipient_note, note, trace_id,
                      created_at, confirmed_at, canceled_at
            "#,
        )
        .bind(scope)
        .bind(warehouse_id)
        .bind(doc_no)
        .bind(doc_type)
        .bind(recipient_name)
        .bind(recipient_note)
        .bind(note)
        .bind(trace_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(doc)
    }

    pub async fn get_internal_doc(
        &self,
        conn: &mut PgConnection,
        doc_id: i64,
        for_update: bool,
    ) -> Result<Option<InternalIssueDoc>, AppError> {
        let base = r#"
            SELECT id, scope, warehouse_id, doc_no, doc_type, status,
                   recipient_name, recipient_note, note, trace_id,
                   created_at, confirmed_at, canceled_at
              FROM internal_issue_docs
             WHERE id = $1
        "#;
        let sql = if for_update {
            format!("{base} FOR UPDATE")
        } else {
            base.to_string()
        };

        let doc = sqlx::query_as::<_, InternalIssueDoc>(&sql)
            .bind(doc_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(doc)
    }

    pub async fn list_internal_lines(
        &self,
        conn: &mut PgConnection,
        doc_id: i64,
    ) -> Result<Vec<InternalIssueLine>, AppError> {
        let lines = sqlx::query_as::<_, InternalIssueLine>(
            r#"
            SELECT id, doc_id, line_no, item_id, batch_code,
                   requested_qty, confirmed_qty, note
              FROM internal_issue_lines
             WHERE doc_id = $1
             ORDER BY line_no, id
            "#,
        )
        .bind(doc_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    pub async fn find_internal_line(
        &self,
        conn: &mut PgConnection,
        doc_id: i64,
        item_id: i64,
        batch_code: Option<&str>,
    ) -> Result<Option<InternalIssueLine>, AppError> {
        let line = sqlx::query_as::<_, InternalIssueLine>(
            r#"
            SELECT id, doc_id, line_no, item_id, batch_code,
                   requested_qty, confirmed_qty, note
              FROM internal_issue_lines
             WHERE doc_id = $1
               AND item_id = $2
               AND batch_code IS NOT DISTINCT FROM $3
             LIMIT 1
            "#,
        )
        .bind(doc_id)
        .bind(item_id)
        .bind(batch_code)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(line)
    }

    pub async fn next_internal_line_no(
        &self,
        conn: &mut PgConnection,
        doc_id: i64,
    ) -> Result<i32, AppError> {
        let next: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(line_no), 0) + 1 FROM internal_issue_lines WHERE doc_id = $1",
        )
        .bind(doc_id)
        .fetch_one(&mut *conn)
        .await?;

        Ok(next)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_internal_line(
        &self,
        conn: &mut PgConnection,
        doc_id: i64,
        line_no: i32,
        item_id: i64,
        batch_code: Option<&str>,
        requested_qty: i64,
        note: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO internal_issue_lines (doc_id, line_no, item_id, batch_code, requested_qty, note)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(doc_id)
        .bind(line_no)
        .bind(item_id)
        .bind(batch_code)
        .bind(requested_qty)
        .bind(note)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn update_internal_line(
        &self,
        conn: &mut PgConnection,
        line_id: i64,
        requested_qty: i64,
        batch_code: Option<&str>,
        note: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE internal_issue_lines
               SET requested_qty = $2,
                   batch_code = COALESCE(batch_code, $3),
                   note = COALESCE($4, note)
             WHERE id = $1
            "#,
        )
        .bind(line_id)
        .bind(requested_qty)
        .bind(batch_code)
        .bind(note)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn set_internal_doc_status(
        &self,
        conn: &mut PgConnection,
        doc_id: i64,
        status: &str,
        confirmed_at: Option<DateTime<Utc>>,
        canceled_at: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE internal_issue_docs
               SET status = $2,
                   confirmed_at = COALESCE($3, confirmed_at),
                   canceled_at = COALESCE($4, canceled_at)
             WHERE id = $1
            "#,
        )
        .bind(doc_id)
        .bind(status)
        .bind(confirmed_at)
        .bind(canceled_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Pedido de compra (base da devolução)
    // ------------------------------------------------------------------

    pub async fn get_po(
        &self,
        conn: &mut PgConnection,
        po_id: i64,
    ) -> Result<Option<PurchaseOrder>, AppError> {
        let po = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT id, warehouse_id, supplier_name, status, created_at
              FROM purchase_orders
             WHERE id = $1
            "#,
        )
        .bind(po_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(po)
    }

    pub async fn list_po_lines(
        &self,
        conn: &mut PgConnection,
        po_id: i64,
    ) -> Result<Vec<PurchaseOrderLine>, AppError> {
        let lines = sqlx::query_as::<_, PurchaseOrderLine>(
            r#"
            SELECT id, po_id, line_no, item_id, qty_ordered, qty_received
              FROM purchase_order_lines
             WHERE po_id = $1
             ORDER BY line_no, id
            "#,
        )
        .bind(po_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Desconta a devolução do recebido do PO, sem deixar negativo.
    pub async fn decrement_po_line_received(
        &self,
        conn: &mut PgConnection,
        po_line_id: i64,
        qty: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE purchase_order_lines SET qty_received = GREATEST(qty_received - $2, 0) WHERE id = $1",
        )
        .bind(po_line_id)
        .bind(qty)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Tarefa de devolução
    // ------------------------------------------------------------------

    pub async fn insert_return_task(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        po_id: Option<i64>,
        warehouse_id: i64,
        supplier_name: Option<&str>,
        remark: Option<&str>,
    ) -> Result<ReturnTask, AppError> {
        let task = sqlx::query_as::<_, ReturnTask>(
            r#"
            INSERT INTO return_tasks (scope, po_id, warehouse_id, supplier_name, status, remark)
            VALUES ($1, $2, $3, $4, 'DRAFT', $5)
            RETURNING id, scope, po_id, warehouse_id, supplier_name, status, remark, created_at
            "#,
        )
        .bind(scope)
        .bind(po_id)
        .bind(warehouse_id)
        .bind(supplier_name)
        .bind(remark)
        .fetch_one(&mut *conn)
        .await?;

        Ok(task)
    }

    pub async fn get_return_task(
        &self,
        conn: &mut PgConnection,
        task_id: i64,
        for_update: bool,
    ) -> Result<Option<ReturnTask>, AppError> {
        let base = r#"
            SELECT id, scope, po_id, warehouse_id, supplier_name, status, remark, created_at
              FROM return_tasks
             WHERE id = $1
        "#;
        let sql = if for_update {
            format!("{base} FOR UPDATE")
        } else {
            base.to_string()
        };

        let task = sqlx::query_as::<_, ReturnTask>(&sql)
            .bind(task_id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(task)
    }

    pub async fn list_return_lines(
        &self,
        conn: &mut PgConnection,
        task_id: i64,
    ) -> Result<Vec<ReturnTaskLine>, AppError> {
        let lines = sqlx::query_as::<_, ReturnTaskLine>(
            r#"
            SELECT id, task_id, po_line_id, item_id, batch_code,
                   expected_qty, picked_qty, committed_qty, status
              FROM return_task_lines
             WHERE task_id = $1
             ORDER BY id
            "#,
        )
        .bind(task_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    pub async fn find_return_line(
        &self,
        conn: &mut PgConnection,
        task_id: i64,
        item_id: i64,
        batch_code: &str,
    ) -> Result<Option<ReturnTaskLine>, AppError> {
        let line = sqlx::query_as::<_, ReturnTaskLine>(
            r#"
            SELECT id, task_id, po_line_id, item_id, batch_code,
                   expected_qty, picked_qty, committed_qty, status
              FROM return_task_lines
             WHERE task_id = $1 AND item_id = $2 AND batch_code = $3
             LIMIT 1
            "#,
        )
        .bind(task_id)
        .bind(item_id)
        .bind(batch_code)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(line)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_return_line(
        &self,
        conn: &mut PgConnection,
        task_id: i64,
        po_line_id: Option<i64>,
        item_id: i64,
        batch_code: Option<&str>,
        expected_qty: Option<i64>,
        picked_qty: i64,
        status: &str,
    ) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO return_task_lines (
                task_id, po_line_id, item_id, batch_code,
                expected_qty, picked_qty, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(task_id)
        .bind(po_line_id)
        .bind(item_id)
        .bind(batch_code)
        .bind(expected_qty)
        .bind(picked_qty)
        .bind(status)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    pub async fn update_return_line_pick(
        &self,
        conn: &mut PgConnection,
        line_id: i64,
        picked_qty: i64,
        batch_code: &str,
        status: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE return_task_lines
               SET picked_qty = $2,
                   batch_code = COALESCE(batch_code, $3),
                   status = $4
             WHERE id = $1
            "#,
        )
        .bind(line_id)
        .bind(picked_qty)
        .bind(batch_code)
        .bind(status)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn mark_return_line_committed(
        &self,
        conn: &mut PgConnection,
        line_id: i64,
        committed_qty: i64,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE return_task_lines SET committed_qty = $2, status = 'COMMITTED' WHERE id = $1",
        )
        .bind(line_id)
        .bind(committed_qty)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn set_return_task_status(
        &self,
        conn: &mut PgConnection,
        task_id: i64,
        status: &str,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE return_tasks SET status = $2 WHERE id = $1")
            .bind(task_id)
            .bind(status)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}
