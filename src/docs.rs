// src/docs.rs

use utoipa::OpenApi;

use crate::common;
use crate::db;
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Scan ---
        handlers::scan::ingest_scan,

        // --- Stock / Ledger ---
        handlers::stock::adjust_stock,
        handlers::stock::list_stock,
        handlers::stock::query_ledger,
        handlers::stock::summarize_ledger,
        handlers::stock::reconcile_ledger,
        handlers::stock::opening_backfill,

        // --- Documents ---
        handlers::documents::confirm_receipt,
        handlers::documents::create_internal_issue,
        handlers::documents::upsert_internal_issue_line,
        handlers::documents::confirm_internal_issue,
        handlers::documents::cancel_internal_issue,
        handlers::documents::get_internal_issue,
        handlers::documents::create_return_task,
        handlers::documents::record_return_pick,
        handlers::documents::commit_return_task,
        handlers::documents::get_return_task,

        // --- Outbound ---
        handlers::outbound::commit_outbound,

        // --- Snapshot ---
        handlers::snapshot::run_snapshot,
        handlers::snapshot::three_books_summary,
        handlers::snapshot::list_snapshot_day,
        handlers::snapshot::snapshot_trends,
    ),
    components(
        schemas(
            models::inventory::Scope,
            models::inventory::ReasonCanon,
            models::inventory::Item,
            models::inventory::Batch,
            models::inventory::StockSlot,
            models::inventory::LedgerEntry,
            models::inventory::SnapshotRow,
            models::inventory::AdjustOutcome,
            models::inventory::Effect,
            models::inventory::ThreeBooksReport,
            models::inventory::ThreeBooksSummary,
            models::inventory::ReconcileRow,
            models::inventory::ReasonStat,
            models::inventory::SnapshotTrendPoint,
            models::documents::ReceiptDoc,
            models::documents::ReceiptLine,
            models::documents::LineStatus,
            models::documents::LineResult,
            models::documents::ShipLine,
            models::documents::ShipOutcome,
            models::documents::InternalIssueDoc,
            models::documents::InternalIssueLine,
            models::documents::InternalIssueDocWithLines,
            models::documents::PurchaseOrder,
            models::documents::PurchaseOrderLine,
            models::documents::ReturnTask,
            models::documents::ReturnTaskLine,
            models::documents::ReturnTaskWithLines,
            models::scan::ScanRequest,
            models::scan::ScanMode,
            models::scan::ScanOutcome,
            models::scan::ScanError,
            models::scan::ScanEvidence,
            models::scan::CountResult,
            common::error::ApiError,
            common::error::InsufficientStock,
            common::error::RemediationHint,
            db::ledger_repo::LedgerFilter,
            services::receipt_service::ReceiptOutcome,
            services::reconcile_service::OpeningBackfillOutcome,
            services::fefo_allocator::PlanLeg,
            services::fefo_allocator::ShipLeg,
            services::fefo_allocator::ShipResult,
            handlers::stock::AdjustPayload,
            handlers::stock::LedgerSummaryResponse,
            handlers::documents::CreateInternalIssuePayload,
            handlers::documents::UpsertIssueLinePayload,
            handlers::documents::ConfirmPayload,
            handlers::documents::CreateReturnTaskPayload,
            handlers::documents::RecordPickPayload,
            handlers::documents::CommitReturnPayload,
            handlers::outbound::ShipCommitPayload,
            handlers::snapshot::RunSnapshotPayload,
            handlers::snapshot::RunSnapshotResponse,
        )
    ),
    tags(
        (name = "scan", description = "Ingestão de scans de coletor"),
        (name = "stock", description = "Saldo e ajuste"),
        (name = "ledger", description = "Razão de movimentos"),
        (name = "documents", description = "Recebimento, saída interna e devolução"),
        (name = "outbound", description = "Saída de pedido"),
        (name = "snapshot", description = "Foto diária e três livros"),
    )
)]
pub struct ApiDoc;
