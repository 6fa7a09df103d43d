//! Static fallback dataset read from a local JSON file.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use super::EntitySource;
use crate::error::AppError;
use crate::models::upstream::{ingest_records, UpstreamDocument};
use crate::models::RawEntity;

/// Reads entity records from a file on disk.
///
/// The file holds either a bare array of entity records or a saved upstream
/// document (`{"data": {"projects": [...]}}`).
#[derive(Debug, Clone)]
pub struct FallbackRepository {
    path: PathBuf,
}

impl FallbackRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads and validates every record in the file.
    pub async fn load(&self) -> Result<Vec<RawEntity>, AppError> {
        let raw = tokio::fs::read(&self.path).await?;
        let value: Value = serde_json::from_slice(&raw)?;

        let records = match value {
            Value::Array(records) => records,
            other => serde_json::from_value::<UpstreamDocument>(other)?
                .records()
                .map_err(|reason| AppError::MalformedDocument {
                    url: self.path.display().to_string(),
                    reason,
                })?
                .into_vec(),
        };

        let ingest = ingest_records(&records);
        tracing::info!(
            path = %self.path.display(),
            entities = ingest.entities.len(),
            quarantined = ingest.quarantined,
            "Loaded fallback dataset"
        );
        Ok(ingest.entities)
    }
}

#[async_trait]
impl EntitySource for FallbackRepository {
    fn describe(&self) -> String {
        format!("fallback {}", self.path.display())
    }

    async fn fetch_all(&self) -> Result<Vec<RawEntity>, AppError> {
        self.load().await
    }
}
