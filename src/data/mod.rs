pub mod ingestion;
pub mod processing;
pub mod table;

pub use ingestion::Fetcher;
pub use processing::{Enricher, WindowOrder};
pub use table::PriceTable;
