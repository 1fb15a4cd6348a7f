// src/db/audit_repo.rs

use sqlx::PgConnection;

use crate::common::error::AppError;

/// Trilha de auditoria dos fluxos de scan e de documentos. Só acrescenta;
/// leitura fica para ferramentas externas.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRepository;

impl AuditRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn write(
        &self,
        conn: &mut PgConnection,
        flow: &str,
        event: &str,
        ref_doc: Option<&str>,
        trace_id: Option<&str>,
        meta: Option<serde_json::Value>,
    ) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO audit_events (flow, event, ref, trace_id, meta)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(flow)
        .bind(event)
        .bind(ref_doc)
        .bind(trace_id)
        .bind(meta)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }
}
