// Pipeline ingestion: CSV acquisition (file, CMS API, seeded sample) and the raw load

pub mod cms_api;
pub mod csv_source;
pub mod loader;
pub mod sample;

pub use loader::{extract_load, LoadSummary};
