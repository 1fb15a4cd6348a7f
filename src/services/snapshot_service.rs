// src/services/snapshot_service.rs

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgConnection;

use crate::{
    common::error::AppError,
    db::SnapshotRepository,
    models::inventory::{Scope, SnapshotRow, SnapshotTrendPoint, ThreeBooksSummary},
};

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Foto diária do estoque. Estritamente derivada: stocks manda, a foto
/// observa. Regravação é idempotente (delete + insert do dia).
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotService {
    snapshots: SnapshotRepository,
}

impl SnapshotService {
    pub fn new(snapshots: SnapshotRepository) -> Self {
        Self { snapshots }
    }

    /// Regrava o dia corrente a partir de stocks.
    pub async fn rebuild_today(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
    ) -> Result<u64, AppError> {
        self.rebuild_day(conn, scope, Utc::now().date_naive()).await
    }

    /// Regrava um dia específico a partir do estado atual de stocks.
    /// Para dias passados use `backfill`.
    pub async fn rebuild_day(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
    ) -> Result<u64, AppError> {
        self.snapshots
            .rebuild_day_from_stocks(conn, scope, day)
            .await
    }

    /// Reconstrói um corte passado repassando os deltas do razão:
    /// snapshot(cut) = snapshot(corte anterior) + Σdelta na janela
    /// (fim do corte anterior, fim do cut]. Sem corte anterior, vale só
    /// a janela do próprio dia.
    pub async fn backfill(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        cut: NaiveDate,
    ) -> Result<u64, AppError> {
        let today = Utc::now().date_naive();
        if cut >= today {
            // dia corrente (ou futuro por engano): a verdade é stocks
            return self.rebuild_day(conn, scope, cut).await;
        }

        let cut_end = day_start(cut) + Duration::days(1);
        let prev = self.snapshots.prev_snapshot_day(conn, scope, cut).await?;

        match prev {
            Some(prev_day) => {
                let from = day_start(prev_day) + Duration::days(1);
                self.snapshots
                    .backfill_from_prev(conn, scope, cut, prev_day, from, cut_end)
                    .await
            }
            None => {
                self.snapshots
                    .backfill_day_window(conn, scope, cut, day_start(cut), cut_end)
                    .await
            }
        }
    }

    /// Σqty de stocks, Σdelta do razão, Σ da foto — painel de sanidade.
    pub async fn three_books_summary(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
    ) -> Result<ThreeBooksSummary, AppError> {
        self.snapshots.three_books_summary(conn, scope).await
    }

    pub async fn list_day(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        day: NaiveDate,
    ) -> Result<Vec<SnapshotRow>, AppError> {
        self.snapshots.list_day(conn, scope, day).await
    }

    pub async fn trends(
        &self,
        conn: &mut PgConnection,
        scope: Scope,
        item_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SnapshotTrendPoint>, AppError> {
        if to < from {
            return Err(AppError::InvalidInput(
                "intervalo invertido: 'to' antes de 'from'".into(),
            ));
        }
        self.snapshots.trends(conn, scope, item_id, from, to).await
    }
}
