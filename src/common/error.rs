// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::inventory::ThreeBooksReport;

/// Ações de remediação sugeridas à UI quando falta estoque.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RemediationHint {
    RescanStock,
    AdjustToAvailable,
}

/// Diagnóstico estruturado de estoque insuficiente (explicação de shortage).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsufficientStock {
    pub warehouse_id: i64,
    pub item_id: i64,
    pub batch_code: Option<String>,
    pub required: i64,
    pub available: i64,
    pub shortage: i64,
    pub next_actions: Vec<RemediationHint>,
}

impl InsufficientStock {
    pub fn new(
        warehouse_id: i64,
        item_id: i64,
        batch_code: Option<String>,
        required: i64,
        available: i64,
    ) -> Self {
        Self {
            warehouse_id,
            item_id,
            batch_code,
            required,
            available,
            shortage: (required - available).max(0),
            next_actions: vec![RemediationHint::RescanStock, RemediationHint::AdjustToAvailable],
        }
    }
}

// Nosso tipo de erro principal (Enum do Backend)
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Item {item_id} é controlado por lote; batch_code é obrigatório")]
    BatchRequired { item_id: i64 },

    #[error("Estoque insuficiente: faltam {} (pedido {}, disponível {})", .0.shortage, .0.required, .0.available)]
    InsufficientStock(InsufficientStock),

    #[error("Datas inconsistentes: expiry {expiry} anterior a production {production}")]
    DateConsistency {
        production: chrono::NaiveDate,
        expiry: chrono::NaiveDate,
    },

    #[error("Barcode não resolvido: {0}")]
    UnknownBarcode(String),

    #[error("FEATURE_DISABLED: {0}")]
    FeatureDisabled(String),

    #[error("Três livros inconsistentes após commit")]
    ThreeBooksViolation(Box<ThreeBooksReport>),

    #[error("Estado de documento não permite a operação: {0}")]
    DocState(String),

    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error("Não foi encontrado o recurso: {0}")]
    ResourceNotFound(String),

    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Violação de integridade: {0}")]
    Integrity(String),

    // Erros técnicos (wrappers)
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn insufficient(
        warehouse_id: i64,
        item_id: i64,
        batch_code: Option<String>,
        required: i64,
        available: i64,
    ) -> Self {
        AppError::InsufficientStock(InsufficientStock::new(
            warehouse_id,
            item_id,
            batch_code,
            required,
            available,
        ))
    }
}

// --- Estrutura de Resposta da API (JSON) ---
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    #[serde(skip)]
    pub status: StatusCode,

    pub error: String,

    // Só aparece no JSON se tiver conteúdo (ex: shortage, relatório dos três livros)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        // Logging antes de responder: avisos para regra de negócio,
        // erro para falhas de infraestrutura e para o watchdog.
        match &err {
            AppError::ValidationError(e) => tracing::warn!("⚠️ Validação falhou: {:?}", e),
            AppError::BatchRequired { .. }
            | AppError::InsufficientStock(_)
            | AppError::DateConsistency { .. }
            | AppError::DocState(_)
            | AppError::UnknownBarcode(_)
            | AppError::FeatureDisabled(_) => tracing::warn!("⚠️ Regra de negócio: {}", err),
            AppError::ThreeBooksViolation(report) => {
                tracing::error!("🔥 TRÊS LIVROS INCONSISTENTES: {:?}", report)
            }
            AppError::DatabaseError(e) => tracing::error!("🔥 ERRO DE BANCO: {:?}", e),
            AppError::InternalServerError(e) => tracing::error!("🔥 ERRO INTERNO: {:?}", e),
            _ => tracing::info!("ℹ️ Erro API: {}", err),
        }

        let message = err.to_string();
        let (status, details) = match err {
            AppError::ValidationError(errs) => (
                StatusCode::BAD_REQUEST,
                serde_json::to_value(errs).ok(),
            ),
            AppError::BatchRequired { .. } => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::InsufficientStock(detail) => (
                StatusCode::CONFLICT,
                serde_json::to_value(detail).ok(),
            ),
            AppError::DateConsistency { .. } => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::UnknownBarcode(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::FeatureDisabled(_) => (StatusCode::FORBIDDEN, None),
            AppError::ThreeBooksViolation(report) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::to_value(&*report).ok(),
            ),
            AppError::DocState(_) => (StatusCode::CONFLICT, None),
            AppError::InvalidInput(_) => (StatusCode::UNPROCESSABLE_ENTITY, None),
            AppError::ResourceNotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Integrity(_) => (StatusCode::CONFLICT, None),

            // Unicidade/FK vindas do banco nunca são re-tentadas: viram 409.
            AppError::DatabaseError(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation() =>
            {
                (StatusCode::CONFLICT, None)
            }

            // Erros internos (escondemos os detalhes técnicos do usuário)
            _ => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        ApiError {
            status,
            error: message,
            details,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

// Conversões diretas para o `?` dos handlers.
impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        AppError::from(e).into()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::from(e).into()
    }
}
