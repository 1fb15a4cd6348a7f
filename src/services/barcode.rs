// src/services/barcode.rs
//
// Camadas puras de decodificação de scan: tokens KV, datas e GS1.
// Nada aqui toca o banco; a resolução item/barcode fica no orquestrador.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::scan::ParsedScan;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    // "CHAVE:valor" separado por espaços; chaves fora da tabela são ignoradas
    Regex::new(r"([A-Za-z_]+)\s*:\s*([^\s]+)").unwrap_or_else(|e| panic!("regex inválida: {e}"))
});

/// Extrai os tokens KV suportados de um barcode livre:
/// ITM/ITEM/ITEM_ID, QTY, B/BATCH/BATCH_CODE, PD/MFG, EXP/EXPIRY,
/// WH/WAREHOUSE/WAREHOUSE_ID, TLID/TASK_LINE_ID.
pub fn parse_tokens(s: &str) -> ParsedScan {
    let mut out = ParsedScan::default();

    for cap in TOKEN_RE.captures_iter(s) {
        let key = cap[1].to_uppercase();
        let val = &cap[2];

        match key.as_str() {
            "ITM" | "ITEM" | "ITEM_ID" => {
                if let Ok(v) = val.parse::<i64>() {
                    out.item_id = Some(v);
                }
            }
            "QTY" => {
                if let Ok(v) = val.parse::<i64>() {
                    out.qty = Some(v);
                }
            }
            "WH" | "WAREHOUSE" | "WAREHOUSE_ID" => {
                if let Ok(v) = val.parse::<i64>() {
                    out.warehouse_id = Some(v);
                }
            }
            "TLID" | "TASK_LINE_ID" => {
                if let Ok(v) = val.parse::<i64>() {
                    out.task_line_id = Some(v);
                }
            }
            "B" | "BATCH" | "BATCH_CODE" => {
                out.batch_code = Some(val.to_string());
            }
            "PD" | "MFG" => {
                out.production_date = coerce_date(val);
            }
            "EXP" | "EXPIRY" => {
                out.expiry_date = coerce_date(val);
            }
            _ => {}
        }
    }

    out
}

/// Converte entradas heterogêneas em data: ISO (yyyy-mm-dd), yyyymmdd,
/// ou timestamp ISO. Inválido vira None; quem valida é o fluxo.
pub fn coerce_date(v: &str) -> Option<NaiveDate> {
    let s = v.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(d) = s.parse::<NaiveDate>() {
        return Some(d);
    }
    if let Ok(dt) = s.parse::<NaiveDateTime>() {
        return Some(dt.date());
    }
    if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        let y = s[0..4].parse().ok()?;
        let m = s[4..6].parse().ok()?;
        let d = s[6..8].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    None
}

// ---------------------------------------------------------------------------
// GS1 (AIs 01 = GTIN-14, 17 = validade YYMMDD, 10 = lote variável)
// ---------------------------------------------------------------------------

const AI_GTIN_LEN: usize = 14;
const AI_EXPIRY_LEN: usize = 6;
const AI_BATCH_MAX: usize = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gs1Data {
    pub gtin: Option<String>,
    pub batch_code: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

impl Gs1Data {
    pub fn is_empty(&self) -> bool {
        self.gtin.is_none() && self.batch_code.is_none() && self.expiry_date.is_none()
    }
}

static AIMED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d{2})\)([^()]+)").unwrap_or_else(|e| panic!("regex inválida: {e}"))
});

fn parse_yymmdd(val: &str) -> Option<NaiveDate> {
    if val.len() < AI_EXPIRY_LEN || !val.chars().take(AI_EXPIRY_LEN).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let y = 2000 + val[0..2].parse::<i32>().ok()?;
    let m = val[2..4].parse::<u32>().ok()?;
    let d = val[4..6].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Forma "aimed": (01)GTIN(17)YYMMDD(10)LOTE
fn parse_aimed(code: &str) -> Gs1Data {
    let mut out = Gs1Data::default();

    for cap in AIMED_RE.captures_iter(code) {
        let val = &cap[2];
        match &cap[1] {
            "01" => out.gtin = Some(val.chars().take(AI_GTIN_LEN).collect()),
            "17" => out.expiry_date = parse_yymmdd(val),
            "10" => out.batch_code = Some(val.chars().take(AI_BATCH_MAX).collect()),
            _ => {}
        }
    }

    out
}

fn is_known_ai(s: &str) -> bool {
    matches!(s, "01" | "17" | "10")
}

/// Forma compacta sem parênteses: 01 + 14 dígitos + 17 + 6 dígitos + 10 + lote.
/// O lote vai até o próximo AI conhecido ou o fim da string.
fn parse_compact(code: &str) -> Gs1Data {
    let mut out = Gs1Data::default();
    let bytes = code.as_bytes();
    let n = bytes.len();
    let mut i = 0usize;

    while i + 2 <= n {
        let ai = &code[i..i + 2];
        i += 2;

        match ai {
            "01" if i + AI_GTIN_LEN <= n => {
                out.gtin = Some(code[i..i + AI_GTIN_LEN].to_string());
                i += AI_GTIN_LEN;
            }
            "17" if i + AI_EXPIRY_LEN <= n => {
                out.expiry_date = parse_yymmdd(&code[i..i + AI_EXPIRY_LEN]);
                i += AI_EXPIRY_LEN;
            }
            "10" => {
                let mut j = i;
                while j < n && !(j + 2 <= n && is_known_ai(&code[j..j + 2])) {
                    j += 1;
                }
                out.batch_code = Some(code[i..j].chars().take(AI_BATCH_MAX).collect());
                i = j;
            }
            _ => break,
        }
    }

    out
}

/// Heurística de entrada: com parênteses ⇒ aimed; string inteiramente
/// numérica começando por 01 ⇒ compacta; o resto não é GS1.
/// Na forma compacta só dígitos contam: lote alfanumérico sem parênteses
/// não é decodificável com segurança e é recusado em silêncio.
pub fn parse_gs1(code: &str) -> Gs1Data {
    let s = code.trim();
    if s.is_empty() {
        return Gs1Data::default();
    }

    if s.contains('(') && s.contains(')') {
        return parse_aimed(s);
    }
    if s.starts_with("01") && s.len() >= 4 && s.chars().all(|c| c.is_ascii_digit()) {
        return parse_compact(s);
    }

    Gs1Data::default()
}
