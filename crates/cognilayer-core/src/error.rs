//! Error types for Cognilayer

use crate::types::NodeId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A node id that is not (or no longer) in the graph.
    #[error("node not found: {0}")]
    NotFound(NodeId),

    #[error("summarization unavailable: {0}")]
    SummarizationUnavailable(String),

    #[error("deduction unavailable: {0}")]
    DeductionUnavailable(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn summarization(reason: impl Into<String>) -> Self {
        Self::SummarizationUnavailable(reason.into())
    }

    pub fn deduction(reason: impl Into<String>) -> Self {
        Self::DeductionUnavailable(reason.into())
    }

    /// Transient failures of a delegated call. The conversation keeps going
    /// on stale memory when one of these surfaces.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::SummarizationUnavailable(_) | Self::DeductionUnavailable(_)
        )
    }
}
