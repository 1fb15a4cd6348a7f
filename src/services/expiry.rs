// src/services/expiry.rs

use chrono::{Datelike, Duration, NaiveDate, Utc};
use sqlx::PgConnection;

use crate::{common::error::AppError, db::ItemRepository};

/// Tolerância (em dias) do cheque suave entre a validade calculada e a
/// informada; divergência maior vira alerta de auditoria, nunca bloqueio.
const CONSISTENCY_TOLERANCE_DAYS: i64 = 3;

/// Unidade da validade:
/// - DAY   : por dias corridos
/// - MONTH : por mês natural (igual ao "18 meses" da embalagem)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelfLifeUnit {
    Day,
    Month,
}

impl ShelfLifeUnit {
    /// Dados sujos no cadastro caem em DAY para não derrubar a gravação.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("MONTH") => ShelfLifeUnit::Month,
            _ => ShelfLifeUnit::Day,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ShelfLife {
    pub value: i32,
    pub unit: ShelfLifeUnit,
}

impl ShelfLife {
    pub fn is_effective(&self) -> bool {
        self.value > 0
    }
}

/// Soma meses "de calendário", não 30·N dias:
/// - 2025-01-15 + 1 → 2025-02-15
/// - 2025-01-31 + 1 → 2025-02-28 (último dia do mês)
/// - 2025-01-31 + 2 → 2025-03-31
pub fn add_months(d: NaiveDate, months: i32) -> NaiveDate {
    if months == 0 {
        return d;
    }

    let total = d.year() * 12 + d.month0() as i32 + months;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;

    let last_day = last_day_of_month(year, month);
    let day = d.day().min(last_day);

    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(d)
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|first| first.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// expiry = production + validade. O valor devolvido é o último dia
/// conforme (inclusive): hoje <= expiry ⇒ dentro da validade.
pub fn compute_expiry(production_date: NaiveDate, shelf_life: ShelfLife) -> NaiveDate {
    match shelf_life.unit {
        ShelfLifeUnit::Day => production_date + Duration::days(i64::from(shelf_life.value)),
        ShelfLifeUnit::Month => add_months(production_date, shelf_life.value),
    }
}

/// Regra única de resolução de validade:
/// 1) expiry explícito vence (o que está impresso na embalagem);
/// 2) senão, production + validade configurada;
/// 3) senão, None — o chamador decide se aceita.
pub fn resolve_expiry_date(
    production_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    shelf_life: Option<ShelfLife>,
) -> Option<NaiveDate> {
    if expiry_date.is_some() {
        return expiry_date;
    }

    match (production_date, shelf_life) {
        (Some(p), Some(sl)) if sl.is_effective() => Some(compute_expiry(p, sl)),
        _ => None,
    }
}

/// Cheque suave: |calculado − informado| dentro da tolerância?
/// Informação incompleta conta como "sem problema detectado".
pub fn expiry_is_consistent(
    production_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    shelf_life: Option<ShelfLife>,
) -> bool {
    let (Some(p), Some(e), Some(sl)) = (production_date, expiry_date, shelf_life) else {
        return true;
    };
    if !sl.is_effective() {
        return true;
    }

    let expected = compute_expiry(p, sl);
    (e - expected).num_days().abs() <= CONSISTENCY_TOLERANCE_DAYS
}

/// Resolve o par (production, expiry) para um item, lendo a configuração
/// de validade do cadastro. Só leitura; quem grava é o ajuste.
pub async fn resolve_batch_dates_for_item(
    conn: &mut PgConnection,
    items: &ItemRepository,
    item_id: i64,
    production_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
) -> Result<(Option<NaiveDate>, Option<NaiveDate>), AppError> {
    let shelf_life = items.shelf_life(conn, item_id).await?.and_then(|cfg| {
        cfg.shelf_life_value.map(|value| ShelfLife {
            value,
            unit: ShelfLifeUnit::parse(cfg.shelf_life_unit.as_deref()),
        })
    });

    // Veio expiry explícito: respeita, só cruza com a configuração.
    if expiry_date.is_some() {
        if !expiry_is_consistent(production_date, expiry_date, shelf_life) {
            tracing::warn!(
                item_id,
                ?production_date,
                ?expiry_date,
                "validade informada diverge da calculada pela configuração do item"
            );
        }
        return Ok((production_date, expiry_date));
    }

    // Sem production não há o que derivar.
    let Some(p) = production_date else {
        return Ok((None, None));
    };

    let computed = resolve_expiry_date(Some(p), None, shelf_life);
    Ok((Some(p), computed))
}

/// Conveniência para "ainda vale em `as_of`?"
pub fn is_expired(expiry_date: Option<NaiveDate>, as_of: NaiveDate) -> bool {
    expiry_date.is_some_and(|e| e < as_of)
}

/// Data padrão de produção quando o fluxo de entrada não informou nada.
pub fn default_production_date() -> NaiveDate {
    Utc::now().date_naive()
}
