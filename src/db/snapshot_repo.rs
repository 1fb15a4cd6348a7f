// src/db/snapshot_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    models::inventory::{Scope, SnapshotRow, SnapshotTrendPoint, ThreeBooksSummary},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotRepository;

impl SnapshotRepository {
    pub fn new() -> Self {
        Self
    }

    async fn delete_day(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM stock_snapshots WHERE scope = $1 AND snapshot_date = $2")
            .bind(scope)
            .bind(day)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Apaga e regrava o dia a partir de stocks (a foto é derivada; stocks
    /// é a fonte de verdade).
    pub async fn rebuild_day_from_stocks(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
    ) -> Result<u64, AppError> {
        self.delete_day(conn, scope, day).await?;

        let res = sqlx::query(
            r#"
            INSERT INTO stock_snapshots (
                scope, snapshot_date, warehouse_id, item_id, batch_code,
                qty_on_hand, qty_available
            )
            SELECT $1, $2, s.warehouse_id, s.item_id, s.batch_code,
                   SUM(s.qty), SUM(s.qty)
              FROM stocks s
             WHERE s.scope = $1
             GROUP BY s.warehouse_id, s.item_id, s.batch_code
            "#,
        )
        .bind(scope)
        .bind(day)
        .execute(&mut *conn)
        .await?;

        Ok(res.rows_affected())
    }

    pub async fn prev_snapshot_day(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        before: NaiveDate,
    ) -> Result<Option<NaiveDate>, AppError> {
        let day: Option<NaiveDate> = sqlx::query_scalar(
            "SELECT MAX(snapshot_date) FROM stock_snapshots WHERE scope = $1 AND snapshot_date < $2",
        )
        .bind(scope)
        .bind(before)
        .fetch_one(&mut *conn)
        .await?;

        Ok(day)
    }

    /// Regrava `day` como snapshot(prev) + Σdelta do razão na janela
    /// [from, to). FULL OUTER JOIN: chaves que só existem de um lado
    /// também entram.
    #[allow(clippy::too_many_arguments)]
    pub async fn backfill_from_prev(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
        prev_day: NaiveDate,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        self.delete_day(conn, scope, day).await?;

        let res = sqlx::query(
            r#"
            INSERT INTO stock_snapshots (
                scope, snapshot_date, warehouse_id, item_id, batch_code,
                qty_on_hand, qty_available
            )
            SELECT $1, $2,
                   COALESCE(b.warehouse_id, d.warehouse_id),
                   COALESCE(b.item_id, d.item_id),
                   COALESCE(b.batch_code, d.batch_code),
                   COALESCE(b.qty_on_hand, 0) + COALESCE(d.delta_sum, 0),
                   COALESCE(b.qty_on_hand, 0) + COALESCE(d.delta_sum, 0)
              FROM (SELECT warehouse_id, item_id, batch_code, batch_code_key, qty_on_hand
                      FROM stock_snapshots
                     WHERE scope = $1 AND snapshot_date = $3) b
              FULL OUTER JOIN (
                    SELECT warehouse_id, item_id, batch_code, batch_code_key,
                           SUM(delta) AS delta_sum
                      FROM stock_ledger
                     WHERE scope = $1 AND occurred_at >= $4 AND occurred_at < $5
                     GROUP BY warehouse_id, item_id, batch_code, batch_code_key
              ) d
                ON d.warehouse_id = b.warehouse_id
               AND d.item_id = b.item_id
               AND d.batch_code_key = b.batch_code_key
            "#,
        )
        .bind(scope)
        .bind(day)
        .bind(prev_day)
        .bind(from)
        .bind(to)
        .execute(&mut *conn)
        .await?;

        Ok(res.rows_affected())
    }

    /// Sem corte anterior: só a janela do próprio dia conta.
    pub async fn backfill_day_window(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        self.delete_day(conn, scope, day).await?;

        let res = sqlx::query(
            r#"
            INSERT INTO stock_snapshots (
                scope, snapshot_date, warehouse_id, item_id, batch_code,
                qty_on_hand, qty_available
            )
            SELECT $1, $2, warehouse_id, item_id, batch_code,
                   SUM(delta), SUM(delta)
              FROM stock_ledger
             WHERE scope = $1 AND occurred_at >= $3 AND occurred_at < $4
             GROUP BY warehouse_id, item_id, batch_code
            "#,
        )
        .bind(scope)
        .bind(day)
        .bind(from)
        .bind(to)
        .execute(&mut *conn)
        .await?;

        Ok(res.rows_affected())
    }

    /// Leitura pontual para o verificador dos três livros.
    pub async fn qty_on_hand_of_key(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
        warehouse_id: i64,
        item_id: i64,
        batch_code_key: &str,
    ) -> Result<i64, AppError> {
        let qty: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(
                (SELECT qty_on_hand
                   FROM stock_snapshots
                  WHERE scope = $1 AND snapshot_date = $2
                    AND warehouse_id = $3 AND item_id = $4
                    AND batch_code_key = $5),
                0)
            "#,
        )
        .bind(scope)
        .bind(day)
        .bind(warehouse_id)
        .bind(item_id)
        .bind(batch_code_key)
        .fetch_one(&mut *conn)
        .await?;

        Ok(qty)
    }

    pub async fn list_day(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
    ) -> Result<Vec<SnapshotRow>, AppError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT scope, snapshot_date, warehouse_id, item_id, batch_code,
                   qty_on_hand, qty_available
              FROM stock_snapshots
             WHERE scope = $1 AND snapshot_date = $2
             ORDER BY warehouse_id, item_id, batch_code_key
            "#,
        )
        .bind(scope)
        .bind(day)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows)
    }

    /// Σ dos três livros para painéis de sanidade.
    pub async fn three_books_summary(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
    ) -> Result<ThreeBooksSummary, AppError> {
        let summary = sqlx::query_as::<_, ThreeBooksSummary>(
            r#"
            SELECT
              COALESCE((SELECT SUM(qty) FROM stocks WHERE scope = $1), 0)::bigint
                  AS sum_stocks,
              COALESCE((SELECT SUM(delta) FROM stock_ledger WHERE scope = $1), 0)::bigint
                  AS sum_ledger,
              COALESCE((SELECT SUM(qty_on_hand) FROM stock_snapshots WHERE scope = $1), 0)::bigint
                  AS sum_snapshot_on_hand,
              COALESCE((SELECT SUM(qty_available) FROM stock_snapshots WHERE scope = $1), 0)::bigint
                  AS sum_snapshot_available
            "#,
        )
        .bind(scope)
        .fetch_one(&mut *conn)
        .await?;

        Ok(summary)
    }

    pub async fn trends(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        item_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SnapshotTrendPoint>, AppError> {
        let points = sqlx::query_as::<_, SnapshotTrendPoint>(
            r#"
            SELECT snapshot_date,
                   SUM(qty_on_hand)::bigint   AS qty_on_hand,
                   SUM(qty_available)::bigint AS qty_available
              FROM stock_snapshots
             WHERE scope = $1
               AND item_id = $2
               AND snapshot_date BETWEEN $3 AND $4
             GROUP BY snapshot_date
             ORDER BY snapshot_date
            "#,
        )
        .bind(scope)
        .bind(item_id)
        .bind(from)
        .bind(to)
        .fetch_all(&mut *conn)
        .await?;

        Ok(points)
    }
}
