use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extraction failed: {0}")]
    Extract(String),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] rusqlite::Error),

    #[error("Cannot open warehouse at {path}: {message}")]
    WarehouseOpen { path: String, message: String },

    #[error("Transform of model '{model}' failed: {message}")]
    Transform { model: String, message: String },

    #[error("{failed} data test(s) failed: {}", names.join(", "))]
    DataTests { failed: usize, names: Vec<String> },

    #[error("Documentation generation failed: {0}")]
    Docs(String),

    #[error("Visualization failed: {0}")]
    Visualize(String),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap an error with the pipeline stage it surfaced in.
    pub fn in_stage(self, stage: &'static str) -> Self {
        match self {
            PipelineError::Stage { .. } => self,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Process exit code for this failure. Stage failures use the code of the stage.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Stage { stage, .. } => crate::constants::stage_exit_code(stage),
            PipelineError::Config(_) | PipelineError::Toml(_) => 1,
            PipelineError::Extract(_)
            | PipelineError::Csv(_)
            | PipelineError::Http(_)
            | PipelineError::Io(_)
            | PipelineError::Json(_) => 2,
            PipelineError::Warehouse(_)
            | PipelineError::WarehouseOpen { .. }
            | PipelineError::Transform { .. } => 3,
            PipelineError::DataTests { .. } => 4,
            PipelineError::Docs(_) => 5,
            PipelineError::Visualize(_) => 6,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
