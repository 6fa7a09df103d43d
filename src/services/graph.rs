//! Graph service: graph requests, project lookups and cache control.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::context::{AppCache, AppUpstream, Context};
use crate::di::FromRef;
use crate::error::AppError;
use crate::graph::build_graph;
use crate::models::{DataOrigin, EntityId, Graph, GraphRequest, RawEntity};

/// A single project as shown in a detail panel.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    pub project: RawEntity,
    /// Where the record was read from.
    pub origin: DataOrigin,
    /// True when the project is only known through references.
    pub placeholder: bool,
}

/// Outcome of a forced refresh.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub origin: DataOrigin,
    pub entities: usize,
    pub placeholders: usize,
}

/// Serves graphs from the cached snapshot.
#[derive(Clone)]
pub struct GraphService {
    cache: AppCache,
    config: Arc<Config>,
    upstream: AppUpstream,
}

impl FromRef<Context> for GraphService {
    fn from_ref(ctx: &Context) -> Self {
        Self {
            cache: FromRef::from_ref(ctx),
            config: FromRef::from_ref(ctx),
            upstream: FromRef::from_ref(ctx),
        }
    }
}

impl GraphService {
    /// Builds the graph for a request. Never fails: source outages yield a
    /// fallback or empty graph.
    pub async fn graph(&self, request: &GraphRequest, force_refresh: bool) -> Graph {
        let dataset = self.cache.get(force_refresh).await;
        build_graph(&dataset, request, &self.config.graph)
    }

    /// Refreshes the snapshot, bypassing the TTL.
    pub async fn refresh(&self) -> RefreshSummary {
        let dataset = self.cache.get(true).await;
        RefreshSummary {
            origin: dataset.origin,
            entities: dataset.len(),
            placeholders: dataset.report.placeholders.len(),
        }
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate().await;
    }

    /// Looks a project up upstream, falling back to the cached snapshot.
    pub async fn project(&self, id: &str) -> Result<ProjectDetails, AppError> {
        let id = EntityId::parse(id).ok_or_else(|| AppError::EntityNotFound(id.to_string()))?;

        if let Some(upstream) = &self.upstream {
            match upstream.fetch_entity(&id).await {
                Ok(project) => {
                    return Ok(ProjectDetails {
                        project,
                        origin: DataOrigin::Live,
                        placeholder: false,
                    })
                }
                Err(e) => {
                    tracing::debug!(id = %id, error = %e, "Live project lookup failed, using snapshot");
                }
            }
        }

        let dataset = self.cache.get(false).await;
        let project = dataset
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::EntityNotFound(id.to_string()))?;
        Ok(ProjectDetails {
            placeholder: dataset.is_placeholder(&id),
            origin: dataset.origin,
            project,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GraphMode, RelationRecord};
    use crate::repositories::EntitySource;
    use crate::services::SnapshotCache;
    use async_trait::async_trait;

    struct Fixed(Vec<RawEntity>);

    #[async_trait]
    impl EntitySource for Fixed {
        fn describe(&self) -> String {
            "fixed".to_string()
        }

        async fn fetch_all(&self) -> Result<Vec<RawEntity>, AppError> {
            Ok(self.0.clone())
        }
    }

    fn context() -> Context {
        let mut a = RawEntity::placeholder("1".into(), "A".to_string());
        a.stack.push(RelationRecord {
            target: Some("2".into()),
            target_name: Some("B".to_string()),
            ..Default::default()
        });
        let config = Config::default();
        let cache = SnapshotCache::new(&config.cache).with_primary(Arc::new(Fixed(vec![a])));
        Context::new(config, cache, None)
    }

    #[tokio::test]
    async fn test_graph_from_snapshot() {
        let service = context().resolve::<GraphService>();
        let graph = service
            .graph(&GraphRequest::new(GraphMode::StackIntegration), false)
            .await;
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }

    #[tokio::test]
    async fn test_project_lookup_from_snapshot() {
        let service = context().resolve::<GraphService>();

        let details = service.project("2").await.unwrap();
        assert_eq!(details.project.name, "B");
        assert!(details.placeholder);
        assert_eq!(details.origin, DataOrigin::Live);

        let err = service.project("99").await.unwrap_err();
        assert!(matches!(err, AppError::EntityNotFound(id) if id == "99"));
        assert!(service.project("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_summary() {
        let service = context().resolve::<GraphService>();
        let summary = service.refresh().await;
        assert_eq!(summary.entities, 2);
        assert_eq!(summary.placeholders, 1);
        assert_eq!(summary.origin, DataOrigin::Live);
    }
}
