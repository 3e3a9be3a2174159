use thiserror::Error;

use crate::db::DatabaseFailure;

pub type Result<T> = std::result::Result<T, WorkloadError>;

#[derive(Error, Debug)]
pub enum WorkloadError {
    #[error("Database error: {0}")]
    Database(DatabaseFailure),

    #[error("Measurement run returned no plan for: {0}")]
    MissingPlan(String),

    #[error("Model training failed: {0}")]
    Trainer(String),

    #[error("Training manifest error: {0}")]
    Manifest(#[from] csv::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkloadError {
    pub fn database(err: &tokio_postgres::Error, statement: &str) -> Self {
        WorkloadError::Database(DatabaseFailure::from_pg_error(err, statement))
    }
}
