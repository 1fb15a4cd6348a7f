pub mod documents;
pub mod outbound;
pub mod scan;
pub mod snapshot;
pub mod stock;
