//! Seam between the snapshot cache and the places entities come from.

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::RawEntity;

/// A source of raw entity listings.
///
/// Implemented by the upstream HTTP client and the static fallback file.
/// The cache only ever asks for the complete listing; ordering of the
/// returned entities is preserved through reconciliation.
#[async_trait]
pub trait EntitySource: Send + Sync {
    /// Short human-readable description, used in log lines.
    fn describe(&self) -> String;

    /// Retrieves the complete listing.
    async fn fetch_all(&self) -> Result<Vec<RawEntity>, AppError>;
}
