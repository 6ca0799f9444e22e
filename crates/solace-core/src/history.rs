//! History-store collaborator interface: past-session summaries and
//! fire-and-forget interaction logging.
//!
//! Failures on this seam are always recoverable: the pipeline catches them at
//! the call site, logs, and proceeds as if no history were available.

use async_trait::async_trait;

use crate::shared::{HistorySummary, InteractionRecord};

/// Result type for history store operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),

    #[error("history query failed: {0}")]
    QueryFailed(String),

    #[error("interaction write failed: {0}")]
    WriteFailed(String),
}

/// External temporal-history collaborator consumed by the pipeline.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Fetches a structured summary of past sessions, or `None` when the
    /// user has no recorded history.
    async fn fetch_history(&self, user_id: &str) -> HistoryResult<Option<HistorySummary>>;

    /// Appends a completed interaction. Fire-and-forget from the pipeline's
    /// point of view.
    async fn append_interaction(&self, record: &InteractionRecord) -> HistoryResult<()>;
}

/// No-op store for history-less deployments and wiring tests.
pub struct NullHistoryStore;

#[async_trait]
impl HistoryStore for NullHistoryStore {
    async fn fetch_history(&self, _user_id: &str) -> HistoryResult<Option<HistorySummary>> {
        Ok(None)
    }

    async fn append_interaction(&self, _record: &InteractionRecord) -> HistoryResult<()> {
        Ok(())
    }
}
