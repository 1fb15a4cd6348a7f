pub mod audit_repo;
pub mod batch_repo;
pub mod documents_repo;
pub mod item_repo;
pub mod ledger_repo;
pub mod snapshot_repo;
pub mod stock_repo;

pub use audit_repo::AuditRepository;
pub use batch_repo::BatchRepository;
pub use documents_repo::DocumentsRepository;
pub use item_repo::ItemRepository;
pub use ledger_repo::LedgerRepository;
pub use snapshot_repo::SnapshotRepository;
pub use stock_repo::StockRepository;
