//! TTL snapshot cache over the fetch and reconcile pipeline.
//!
//! The cache owns a single snapshot that is replaced wholesale on refresh.
//! Readers get an `Arc<Dataset>` and never observe a partial update.
//! A failed refresh degrades to the fallback source, then to an empty
//! dataset, so [`SnapshotCache::get`] never fails.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::config::CacheConfig;
use crate::models::{DataOrigin, Dataset};
use crate::repositories::EntitySource;
use crate::services::reconcile::reconcile;

/// A reconciled dataset and when it was captured.
#[derive(Debug)]
pub struct CacheSnapshot {
    pub dataset: Arc<Dataset>,
    /// When the refresh that produced this snapshot began fetching.
    pub started_at: Instant,
    pub captured_at: Instant,
    pub captured_wall: DateTime<Utc>,
}

impl CacheSnapshot {
    fn new(dataset: Dataset, started_at: Instant) -> Self {
        Self {
            dataset: Arc::new(dataset),
            started_at,
            captured_at: Instant::now(),
            captured_wall: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Process-wide dataset cache, shared through the application context.
pub struct SnapshotCache {
    snapshot: RwLock<Option<Arc<CacheSnapshot>>>,
    refresh_lock: Mutex<()>,
    ttl: Duration,
    single_flight: bool,
    primary: Option<Arc<dyn EntitySource>>,
    fallback: Option<Arc<dyn EntitySource>>,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("ttl", &self.ttl)
            .field("single_flight", &self.single_flight)
            .field("primary", &self.primary.as_ref().map(|s| s.describe()))
            .field("fallback", &self.fallback.as_ref().map(|s| s.describe()))
            .finish()
    }
}

impl SnapshotCache {
    /// Creates an empty cache with no sources; see [`Self::with_primary`].
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            ttl: config.ttl(),
            single_flight: config.single_flight,
            primary: None,
            fallback: None,
        }
    }

    pub fn with_primary(mut self, source: Arc<dyn EntitySource>) -> Self {
        self.primary = Some(source);
        self
    }

    pub fn with_fallback(mut self, source: Arc<dyn EntitySource>) -> Self {
        self.fallback = Some(source);
        self
    }

    /// Returns the current dataset, refreshing it when absent, expired, or
    /// when `force_refresh` is set.
    pub async fn get(&self, force_refresh: bool) -> Arc<Dataset> {
        let requested_at = Instant::now();

        if !force_refresh {
            if let Some(snapshot) = self.peek().await {
                if snapshot.is_fresh(self.ttl) {
                    return Arc::clone(&snapshot.dataset);
                }
            }
        }

        let _guard = if self.single_flight {
            Some(self.refresh_lock.lock().await)
        } else {
            None
        };

        // Another caller may have refreshed while we waited for the lock. A
        // forced refresh only accepts data fetched after it was requested.
        if let Some(snapshot) = self.peek().await {
            let reusable = if force_refresh {
                snapshot.started_at >= requested_at
            } else {
                snapshot.captured_at >= requested_at || snapshot.is_fresh(self.ttl)
            };
            if reusable {
                return Arc::clone(&snapshot.dataset);
            }
        }

        let started_at = Instant::now();
        let snapshot = Arc::new(CacheSnapshot::new(self.load().await, started_at));
        *self.snapshot.write().await = Some(Arc::clone(&snapshot));
        Arc::clone(&snapshot.dataset)
    }

    /// Drops the held snapshot; the next `get` refreshes.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
        tracing::info!("Snapshot cache cleared");
    }

    /// The held snapshot, regardless of age.
    pub async fn peek(&self) -> Option<Arc<CacheSnapshot>> {
        self.snapshot.read().await.clone()
    }

    /// Runs one refresh: primary source, then fallback, then empty.
    async fn load(&self) -> Dataset {
        if let Some(primary) = &self.primary {
            match primary.fetch_all().await {
                Ok(listing) => {
                    let dataset = reconcile(listing, DataOrigin::Live);
                    tracing::info!(
                        source = %primary.describe(),
                        entities = dataset.len(),
                        placeholders = dataset.report.placeholders.len(),
                        "Snapshot refreshed"
                    );
                    return dataset;
                }
                Err(e) if e.is_configuration() => {
                    tracing::warn!(source = %primary.describe(), error = %e, "Primary source misconfigured");
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(source = %primary.describe(), error = %e, "Primary source rate limited");
                }
                Err(e) => {
                    tracing::error!(source = %primary.describe(), error = %e, "Refresh failed");
                }
            }
        }

        if let Some(fallback) = &self.fallback {
            match fallback.fetch_all().await {
                Ok(listing) => {
                    let dataset = reconcile(listing, DataOrigin::Fallback);
                    tracing::warn!(
                        source = %fallback.describe(),
                        entities = dataset.len(),
                        "Serving fallback dataset"
                    );
                    return dataset;
                }
                Err(e) => {
                    tracing::error!(source = %fallback.describe(), error = %e, "Fallback load failed");
                }
            }
        }

        tracing::error!("No data source available, serving an empty dataset");
        Dataset::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::RawEntity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source that counts calls and can be told to fail.
    struct StubSource {
        entities: Vec<RawEntity>,
        fail: bool,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn ok(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                entities: ids
                    .iter()
                    .map(|id| RawEntity::placeholder((*id).into(), format!("E{id}")))
                    .collect(),
                fail: false,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                entities: Vec::new(),
                fail: true,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(ids: &[&str], delay: Duration) -> Arc<Self> {
            let mut source = Arc::into_inner(Self::ok(ids)).unwrap();
            source.delay = delay;
            Arc::new(source)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EntitySource for StubSource {
        fn describe(&self) -> String {
            "stub".to_string()
        }

        async fn fetch_all(&self) -> Result<Vec<RawEntity>, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(AppError::RateLimited {
                    url: "http://stub".to_string(),
                    attempts: 3,
                });
            }
            Ok(self.entities.clone())
        }
    }

    fn config(ttl_secs: u64) -> CacheConfig {
        CacheConfig {
            ttl_secs,
            single_flight: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_controls_refresh() {
        let source = StubSource::ok(&["1"]);
        let cache = SnapshotCache::new(&config(60)).with_primary(source.clone());

        assert_eq!(cache.get(false).await.len(), 1);
        cache.get(false).await;
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.get(false).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_refresh_and_invalidate() {
        let source = StubSource::ok(&["1"]);
        let cache = SnapshotCache::new(&config(300)).with_primary(source.clone());

        cache.get(false).await;
        cache.get(true).await;
        assert_eq!(source.calls(), 2);

        cache.invalidate().await;
        assert!(cache.peek().await.is_none());
        cache.get(false).await;
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_falls_back_when_primary_fails() {
        let primary = StubSource::failing();
        let fallback = StubSource::ok(&["7", "8"]);
        let cache = SnapshotCache::new(&config(300))
            .with_primary(primary.clone())
            .with_fallback(fallback.clone());

        let dataset = cache.get(false).await;
        assert_eq!(dataset.origin, DataOrigin::Fallback);
        assert_eq!(dataset.len(), 2);
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_when_every_source_fails() {
        let cache = SnapshotCache::new(&config(300))
            .with_primary(StubSource::failing())
            .with_fallback(StubSource::failing());

        let dataset = cache.get(false).await;
        assert_eq!(dataset.origin, DataOrigin::Empty);
        assert!(dataset.is_empty());
    }

    #[tokio::test]
    async fn test_no_sources_is_empty() {
        let cache = SnapshotCache::new(&config(300));
        assert_eq!(cache.get(false).await.origin, DataOrigin::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_share_one_fetch() {
        let source = StubSource::slow(&["1"], Duration::from_millis(50));
        let cache = Arc::new(SnapshotCache::new(&config(300)).with_primary(source.clone()));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get(false).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().len(), 1);
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_refresh_ignores_refresh_already_in_flight() {
        let source = StubSource::slow(&["1"], Duration::from_millis(50));
        let cache = Arc::new(SnapshotCache::new(&config(300)).with_primary(source.clone()));

        let first = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(true).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(true).await })
        };

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(source.calls(), 2);

        let snapshot = cache.peek().await.unwrap();
        assert!(snapshot.started_at < snapshot.captured_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_refreshes_without_single_flight() {
        let source = StubSource::slow(&["1"], Duration::from_millis(50));
        let cache = Arc::new(
            SnapshotCache::new(&CacheConfig {
                ttl_secs: 300,
                single_flight: false,
            })
            .with_primary(source.clone()),
        );

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get(false).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(source.calls(), 3);
    }
}
