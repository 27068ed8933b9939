use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Everything that can go wrong while loading, querying or exporting.
///
/// None of these are fatal to the dashboard: the caller swaps the affected
/// section for a placeholder and carries on.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("{} is not available: {source}", path.display())]
    ResourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV: {0}")]
    Csv(#[from] PolarsError),

    #[error("{table} has no `{column}` column")]
    MissingColumn { table: String, column: String },

    #[error("{kind} \"{key}\" not found")]
    KeyNotFound { kind: &'static str, key: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DashboardError {
    pub fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DashboardError::ResourceUnavailable {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DashboardError::KeyNotFound { .. })
    }
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
