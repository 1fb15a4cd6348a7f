pub mod barcode;
pub mod count_service;
pub mod expiry;
pub mod fefo_allocator;
pub mod internal_issue_service;
pub mod outbound_service;
pub mod receipt_service;
pub mod reconcile_service;
pub mod return_service;
pub mod scan_orchestrator;
pub mod snapshot_service;
pub mod stock_service;
pub mod three_books;
