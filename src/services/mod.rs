//! Business logic over the cached dataset.
//!
//! Services are resolved from the application context through `FromRef`.

mod cache;
mod graph;
pub mod reconcile;
mod stats;

pub use cache::{CacheSnapshot, SnapshotCache};
pub use graph::{GraphService, ProjectDetails, RefreshSummary};
pub use reconcile::reconcile;
pub use stats::{
    summarize_dataset, DatasetStats, GiverSummary, GrantEntry, RelationCounts, StatsService,
};
