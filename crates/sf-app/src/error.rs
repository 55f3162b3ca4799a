//! Error types for the sf-app service layer.

use std::path::PathBuf;

use sf_core::ManualId;
use sf_graph::{EntityFamily, GraphError};
use sf_results::ResultsError;
use sf_store::StoreError;

/// Application error type wrapping the backend crates' errors for the CLI
/// and any other front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Network error: {0}")]
    Graph(#[from] GraphError),

    #[error("Results error: {0}")]
    Results(#[from] ResultsError),

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("No {family:?} entity with manual id {id}")]
    UnknownEntity { family: EntityFamily, id: ManualId },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for sf-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// The store-level cause, if any.
    pub fn as_store(&self) -> Option<&StoreError> {
        match self {
            AppError::Store(e) => Some(e),
            _ => None,
        }
    }
}
