// Pipeline processing: SQL models, data-quality tests and model documentation

pub mod docs;
pub mod models;
pub mod quality_gate;
