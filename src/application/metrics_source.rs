// Source trait for health snapshots
use crate::domain::snapshot::Snapshot;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("invalid snapshot payload: {0}")]
    Decode(String),
}

#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch one snapshot. Timeouts are the implementation's concern.
    async fn fetch(&self) -> Result<Snapshot, SourceError>;
}
