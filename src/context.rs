//! Application context providing the dependency root.

use std::sync::Arc;

use crate::config::Config;
use crate::di::FromRef;
use crate::error::AppError;
use crate::repositories::{EntitySource, FallbackRepository, UpstreamRepository};
use crate::services::SnapshotCache;

/// Shared snapshot cache handle.
pub type AppCache = Arc<SnapshotCache>;

/// Upstream client, absent when running from the fallback dataset only.
pub type AppUpstream = Option<Arc<UpstreamRepository>>;

/// Root application context.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone, Debug)]
pub struct Context {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Process-wide dataset snapshot.
    pub cache: AppCache,
    pub upstream: AppUpstream,
}

impl Context {
    /// Wires the data sources and cache described by `config`.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let upstream = if config.fallback.only {
            tracing::info!("Fallback-only mode, upstream disabled");
            None
        } else {
            Some(Arc::new(UpstreamRepository::new(&config.source)?))
        };

        let mut cache = SnapshotCache::new(&config.cache);
        if let Some(upstream) = &upstream {
            cache = cache.with_primary(Arc::clone(upstream) as Arc<dyn EntitySource>);
        }
        if let Some(path) = config.fallback.path.clone() {
            cache = cache.with_fallback(Arc::new(FallbackRepository::new(path)));
        }

        Ok(Self::new(config, cache, upstream))
    }

    pub fn new(config: Config, cache: SnapshotCache, upstream: AppUpstream) -> Self {
        Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
            upstream,
        }
    }

    /// Resolves a dependency from this context.
    pub fn resolve<T: FromRef<Context>>(&self) -> T {
        T::from_ref(self)
    }
}

impl FromRef<Context> for Arc<Config> {
    fn from_ref(ctx: &Context) -> Self {
        Arc::clone(&ctx.config)
    }
}

impl FromRef<Context> for AppCache {
    fn from_ref(ctx: &Context) -> Self {
        Arc::clone(&ctx.cache)
    }
}

impl FromRef<Context> for AppUpstream {
    fn from_ref(ctx: &Context) -> Self {
        ctx.upstream.clone()
    }
}
