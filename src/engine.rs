//! Request entry points.
//!
//! [`GraphEngine`] ties the registry, the store and the configuration
//! together. Each call is one request: queries run in a read transaction,
//! mutations are parsed and validated first and then applied in a single
//! write transaction that is committed only when every operation succeeded.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, info_span, warn, Instrument};

use crate::config::EngineConfig;
use crate::database::{establish_connection, get_database_url, migrations::Migrator};
use crate::errors::{EngineError, EngineResult};
use crate::mutation::{MutationInfo, MutationParser, MutationPlanner};
use crate::query::{AggregateResult, AggregateSelection, Connection, QueryArgs, QueryExecutor};
use crate::schema::SchemaRegistry;
use crate::store::{GraphCounts, GraphStore, MemoryGraphStore, SeaOrmGraphStore};
use sea_orm_migration::MigratorTrait;

/// Outcome of a create or update request.
#[derive(Debug, Clone, Serialize)]
pub struct MutationResult {
    pub info: MutationInfo,
    pub entities: Vec<Value>,
}

#[derive(Clone)]
pub struct GraphEngine {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn GraphStore>,
    config: EngineConfig,
}

impl GraphEngine {
    pub fn new(registry: SchemaRegistry, store: Arc<dyn GraphStore>, config: EngineConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            config,
        }
    }

    /// An engine over a fresh in-memory store.
    pub fn in_memory(registry: SchemaRegistry) -> Self {
        Self::new(
            registry,
            Arc::new(MemoryGraphStore::new()),
            EngineConfig::in_memory(),
        )
    }

    /// Load the schema, open the configured store and bring its tables up
    /// to date.
    pub async fn from_config(config: EngineConfig) -> Result<Self> {
        let registry = config.load_registry()?;
        let store: Arc<dyn GraphStore> = if config.uses_memory_store() {
            Arc::new(MemoryGraphStore::new())
        } else {
            let url = get_database_url(Some(&config.database_url));
            let db = establish_connection(&url).await?;
            Migrator::up(&db, None).await?;
            Arc::new(SeaOrmGraphStore::new(db))
        };
        info!(
            "Graph engine ready: {} entity types on the {} store",
            registry.entity_types().count(),
            store.backend_name()
        );
        Ok(Self::new(registry, store, config))
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn counts(&self) -> EngineResult<GraphCounts> {
        Ok(self.store.counts().await?)
    }

    fn executor(&self) -> QueryExecutor<'_> {
        QueryExecutor::new(&self.registry, &self.config)
    }

    fn parser(&self) -> MutationParser<'_> {
        MutationParser::new(&self.registry, self.config.max_filter_depth)
    }

    /// Run a request under the configured timeout. Expiry drops the request
    /// future, and with it the uncommitted transaction.
    async fn guarded<T>(
        &self,
        operation: &str,
        request: impl Future<Output = EngineResult<T>>,
    ) -> EngineResult<T> {
        let Some(limit) = self.config.request_timeout() else {
            return request.await;
        };
        match tokio::time::timeout(limit, request).await {
            Ok(result) => result,
            Err(_) => {
                warn!("{} cancelled after {:?}, transaction rolled back", operation, limit);
                Err(EngineError::Cancelled(format!(
                    "{} exceeded the request timeout of {}ms",
                    operation,
                    limit.as_millis()
                )))
            }
        }
    }

    pub async fn find(&self, type_name: &str, args: &QueryArgs) -> EngineResult<Vec<Value>> {
        let span = info_span!("find", entity = type_name);
        self.guarded("find", async {
            let executor = self.executor();
            let query = executor.prepare(type_name, args)?;
            let tx = self.store.begin_read().await?;
            let rows = executor.find(tx.as_ref(), &query, args).await?;
            tx.rollback().await?;
            Ok(rows)
        }
        .instrument(span))
        .await
    }

    pub async fn connection(&self, type_name: &str, args: &QueryArgs) -> EngineResult<Connection> {
        let span = info_span!("connection", entity = type_name);
        self.guarded("connection", async {
            let executor = self.executor();
            let query = executor.prepare(type_name, args)?;
            let tx = self.store.begin_read().await?;
            let connection = executor.connection(tx.as_ref(), &query, args).await?;
            tx.rollback().await?;
            Ok(connection)
        }
        .instrument(span))
        .await
    }

    pub async fn aggregate(
        &self,
        type_name: &str,
        where_: Option<&Value>,
        selection: &AggregateSelection,
    ) -> EngineResult<AggregateResult> {
        let span = info_span!("aggregate", entity = type_name);
        self.guarded("aggregate", async {
            let executor = self.executor();
            let query = executor.prepare_aggregate(type_name, where_, selection)?;
            let tx = self.store.begin_read().await?;
            let result = executor.aggregate(tx.as_ref(), &query, selection).await?;
            tx.rollback().await?;
            Ok(result)
        }
        .instrument(span))
        .await
    }

    pub async fn relationship_connection(
        &self,
        type_name: &str,
        id: &str,
        relationship: &str,
        args: &QueryArgs,
    ) -> EngineResult<Connection> {
        let span = info_span!("relationship_connection", entity = type_name, relationship);
        self.guarded("relationship connection", async {
            let executor = self.executor();
            let query = executor.prepare_relationship(type_name, relationship, args)?;
            let tx = self.store.begin_read().await?;
            let connection = executor
                .relationship_connection(tx.as_ref(), &query, id, args)
                .await?;
            tx.rollback().await?;
            Ok(connection)
        }
        .instrument(span))
        .await
    }

    pub async fn relationship_aggregate(
        &self,
        type_name: &str,
        id: &str,
        relationship: &str,
        where_: Option<&Value>,
        selection: &AggregateSelection,
    ) -> EngineResult<AggregateResult> {
        let span = info_span!("relationship_aggregate", entity = type_name, relationship);
        self.guarded("relationship aggregate", async {
            let executor = self.executor();
            let query =
                executor.prepare_relationship_aggregate(type_name, relationship, where_, selection)?;
            let tx = self.store.begin_read().await?;
            let result = executor
                .relationship_aggregate(tx.as_ref(), &query, id, selection)
                .await?;
            tx.rollback().await?;
            Ok(result)
        }
        .instrument(span))
        .await
    }

    /// Create one node (object input) or several (list input), with their
    /// nested creates and connects.
    pub async fn create(&self, type_name: &str, input: &Value) -> EngineResult<MutationResult> {
        let span = info_span!("create", entity = type_name);
        self.guarded("create", async {
            let entity = self.registry.entity(type_name)?;
            let inputs = self.parser().parse_creates(entity, input)?;

            let mut planner = MutationPlanner::new(&self.registry, self.store.begin_write().await?);
            let result = planner.create(&inputs).await;
            let (nodes, info) = finish(planner, result).await?;

            info!(
                "Created {} nodes and {} relationships",
                info.nodes_created, info.relationships_created
            );
            Ok(MutationResult {
                info,
                entities: nodes.into_iter().map(crate::query::executor::node_value).collect(),
            })
        }
        .instrument(span))
        .await
    }

    pub async fn update(
        &self,
        type_name: &str,
        where_: Option<&Value>,
        update: Option<&Value>,
    ) -> EngineResult<MutationResult> {
        let span = info_span!("update", entity = type_name);
        self.guarded("update", async {
            let entity = self.registry.entity(type_name)?;
            let predicate = self.filter(entity, where_)?;
            let update = self.parser().parse_update(entity, update)?;

            let mut planner = MutationPlanner::new(&self.registry, self.store.begin_write().await?);
            let result = planner.update(entity, &predicate, &update).await;
            let (nodes, info) = finish(planner, result).await?;

            info!(
                "Updated {} nodes: {} created, {} deleted, {} relationships created, {} deleted",
                nodes.len(),
                info.nodes_created,
                info.nodes_deleted,
                info.relationships_created,
                info.relationships_deleted
            );
            Ok(MutationResult {
                info,
                entities: nodes.into_iter().map(crate::query::executor::node_value).collect(),
            })
        }
        .instrument(span))
        .await
    }

    pub async fn delete(
        &self,
        type_name: &str,
        where_: Option<&Value>,
        delete: Option<&Value>,
    ) -> EngineResult<MutationInfo> {
        let span = info_span!("delete", entity = type_name);
        self.guarded("delete", async {
            let entity = self.registry.entity(type_name)?;
            let predicate = self.filter(entity, where_)?;
            let cascade = self.parser().parse_delete(entity, delete)?;

            let mut planner = MutationPlanner::new(&self.registry, self.store.begin_write().await?);
            let result = planner.delete(entity, &predicate, &cascade).await;
            let ((), info) = finish(planner, result).await?;

            info!(
                "Deleted {} nodes and {} relationships",
                info.nodes_deleted, info.relationships_deleted
            );
            Ok(info)
        }
        .instrument(span))
        .await
    }

    fn filter(
        &self,
        entity: &crate::schema::EntityType,
        where_: Option<&Value>,
    ) -> EngineResult<crate::query::Predicate> {
        crate::query::FilterCompiler::new(&self.registry, self.config.max_filter_depth)
            .compile(entity, where_)
    }
}

/// Commit when the plan applied cleanly, roll back otherwise.
async fn finish<T>(
    planner: MutationPlanner<'_>,
    result: EngineResult<T>,
) -> EngineResult<(T, MutationInfo)> {
    match result {
        Ok(value) => {
            let sequence = planner.commit().await?;
            Ok((value, sequence.info()))
        }
        Err(err) => {
            warn!(
                "Mutation failed after {} operations, rolling back: {}",
                planner.sequence().len(),
                err
            );
            if let Err(rollback) = planner.rollback().await {
                warn!("Rollback failed: {}", rollback);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> GraphEngine {
        GraphEngine::in_memory(SchemaRegistry::enterprise_architecture().unwrap())
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let engine = engine();
        let result = engine
            .create("Application", &json!({"name": "CRM", "status": "ACTIVE"}))
            .await
            .unwrap();
        assert_eq!(result.info.nodes_created, 1);
        assert!(result.entities[0]["id"].is_string());

        let rows = engine
            .find(
                "Application",
                &QueryArgs::with_where(json!({"status": {"eq": "ACTIVE"}})),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_update_without_match_reports_zero() {
        let engine = engine();
        let result = engine
            .update(
                "Application",
                Some(&json!({"name": {"eq": "missing"}})),
                Some(&json!({"version": {"set": "2.0"}})),
            )
            .await
            .unwrap();
        assert!(result.entities.is_empty());
        assert_eq!(result.info, MutationInfo::default());
    }

    #[tokio::test]
    async fn test_update_sets_updated_at() {
        let engine = engine();
        engine
            .create("Application", &json!({"name": "CRM", "userCount": 10}))
            .await
            .unwrap();
        let result = engine
            .update(
                "Application",
                None,
                Some(&json!({"userCount": {"add": 5}})),
            )
            .await
            .unwrap();
        assert_eq!(result.entities[0]["userCount"], json!(15));
        assert!(result.entities[0]["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn test_validation_error_touches_nothing() {
        let engine = engine();
        let err = engine
            .create("Application", &json!({"name": "CRM", "colour": "blue"}))
            .await
            .unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(engine.counts().await.unwrap(), GraphCounts::default());
    }
}
