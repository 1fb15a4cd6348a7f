// src/config.rs

// Importe dos serviços
use crate::services::{
    count_service::CountService, fefo_allocator::FefoAllocator,
    internal_issue_service::InternalIssueService, outbound_service::OutboundService,
    receipt_service::ReceiptService, reconcile_service::ReconcileService,
    return_service::ReturnTaskService, scan_orchestrator::ScanOrchestrator,
    snapshot_service::SnapshotService, stock_service::StockService,
    three_books::ThreeBooksEnforcer,
};

// Importe dos repositórios
use crate::db::{
    AuditRepository, BatchRepository, DocumentsRepository, ItemRepository, LedgerRepository,
    SnapshotRepository, StockRepository,
};

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,

    // repositórios (as consultas diretas dos handlers passam por eles)
    pub ledger_repo: LedgerRepository,
    pub stock_repo: StockRepository,
    pub snapshot_repo: SnapshotRepository,

    // serviços
    pub stock_service: StockService,
    pub fefo: FefoAllocator,
    pub snapshot_service: SnapshotService,
    pub enforcer: ThreeBooksEnforcer,
    pub receipt_service: ReceiptService,
    pub outbound_service: OutboundService,
    pub count_service: CountService,
    pub internal_issue_service: InternalIssueService,
    pub return_service: ReturnTaskService,
    pub reconcile_service: ReconcileService,
    pub scan_orchestrator: ScanOrchestrator,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(db_pool))
    }

    /// Monta o gráfico de dependências sobre uma pool já existente
    /// (o caminho dos testes de integração).
    pub fn with_pool(db_pool: PgPool) -> Self {
        // Repositórios
        let item_repo = ItemRepository::new();
        let stock_repo = StockRepository::new();
        let batch_repo = BatchRepository::new();
        let ledger_repo = LedgerRepository::new();
        let snapshot_repo = SnapshotRepository::new();
        let documents_repo = DocumentsRepository::new();
        let audit_repo = AuditRepository::new();

        // Serviços — as folhas primeiro, os workflows por cima
        let stock_service = StockService::new(item_repo, stock_repo, batch_repo, ledger_repo);
        let fefo = FefoAllocator::new(stock_repo, stock_service);
        let snapshot_service = SnapshotService::new(snapshot_repo);
        let enforcer =
            ThreeBooksEnforcer::new(ledger_repo, stock_repo, snapshot_repo, snapshot_service);

        let receipt_service = ReceiptService::new(stock_service, enforcer);
        let outbound_service = OutboundService::new(stock_service, fefo, ledger_repo, enforcer);
        let count_service = CountService::new(item_repo, stock_repo, stock_service, enforcer);
        let internal_issue_service = InternalIssueService::new(
            documents_repo,
            audit_repo,
            stock_service,
            fefo,
            enforcer,
        );
        let return_service =
            ReturnTaskService::new(documents_repo, stock_repo, stock_service, enforcer);
        let reconcile_service = ReconcileService::new(ledger_repo);
        let scan_orchestrator = ScanOrchestrator::new(
            item_repo,
            audit_repo,
            receipt_service,
            count_service,
            stock_service,
            enforcer,
        );

        Self {
            db_pool,
            ledger_repo,
            stock_repo,
            snapshot_repo,
            stock_service,
            fefo,
            snapshot_service,
            enforcer,
            receipt_service,
            outbound_service,
            count_service,
            internal_issue_service,
            return_service,
            reconcile_service,
            scan_orchestrator,
        }
    }
}
