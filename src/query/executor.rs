//! Query execution over one read transaction.
//!
//! Queries run in two steps. `prepare*` compiles the filter, sort, cursor and
//! aggregate selection against the registry without a transaction, so a
//! malformed request fails before the store is opened. The prepared query
//! then runs against one read transaction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::aggregate::{summarize, AggregateResult, AggregateSelection};
use super::cursor::Cursor;
use super::filter::{ConnectionPredicate, FilterCompiler, Predicate};
use super::pagination::{paginate, PageInfo, PageLimits, PageRequest};
use super::predicate::PredicateEvaluator;
use super::sort::{ConnectionRow, SortSpec};
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::schema::{EdgeSchema, EntityType, RelationshipField, SchemaRegistry};
use crate::store::{GraphTransaction, NodeRecord};

/// Arguments shared by list and connection queries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryArgs {
    #[serde(rename = "where")]
    pub where_: Option<Value>,
    pub sort: Option<Value>,
    pub first: Option<usize>,
    pub after: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl QueryArgs {
    pub fn with_where(where_: Value) -> Self {
        Self {
            where_: Some(where_),
            ..Self::default()
        }
    }

    fn page_request(&self) -> PageRequest {
        PageRequest {
            first: self.first,
            after: self.after.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEdge {
    pub cursor: String,
    pub node: Value,
    /// Edge properties, set on rich relationship connections only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub edges: Vec<ConnectionEdge>,
    pub page_info: PageInfo,
    pub total_count: usize,
}

pub fn node_value(node: NodeRecord) -> Value {
    Value::Object(node.properties)
}

/// A node query checked against the schema, ready to run.
#[derive(Debug, Clone)]
pub struct NodeQuery<'a> {
    entity: &'a EntityType,
    predicate: Predicate,
    sort: SortSpec,
}

/// A query over one node's relationship, checked against the schema.
#[derive(Debug, Clone)]
pub struct RelationshipQuery<'a> {
    entity: &'a EntityType,
    target: &'a EntityType,
    rel: &'a RelationshipField,
    edge_schema: Option<&'a EdgeSchema>,
    predicate: ConnectionPredicate,
    sort: SortSpec,
}

pub struct QueryExecutor<'a> {
    registry: &'a SchemaRegistry,
    limits: PageLimits,
    max_filter_depth: usize,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &EngineConfig) -> Self {
        Self {
            registry,
            limits: PageLimits {
                default_page_size: config.default_page_size,
                max_page_size: config.max_page_size,
            },
            max_filter_depth: config.max_filter_depth,
        }
    }

    fn filters(&self) -> FilterCompiler<'a> {
        FilterCompiler::new(self.registry, self.max_filter_depth)
    }

    /// Compile the filter, sort and cursor of a node query.
    pub fn prepare(&self, type_name: &str, args: &QueryArgs) -> EngineResult<NodeQuery<'a>> {
        let entity = self.registry.entity(type_name)?;
        let predicate = self.filters().compile(entity, args.where_.as_ref())?;
        let sort = SortSpec::compile(entity, args.sort.as_ref())?;
        check_cursor(args, &sort)?;
        debug!("Compiled {} filter: {:?}", type_name, predicate);
        Ok(NodeQuery {
            entity,
            predicate,
            sort,
        })
    }

    /// Compile an aggregate query and check its field selection.
    pub fn prepare_aggregate(
        &self,
        type_name: &str,
        where_: Option<&Value>,
        selection: &AggregateSelection,
    ) -> EngineResult<NodeQuery<'a>> {
        let entity = self.registry.entity(type_name)?;
        let predicate = self.filters().compile(entity, where_)?;
        if selection.edge.is_some() {
            return Err(EngineError::entity_validation(
                &entity.name,
                format!("{} aggregates have no edge scope", entity.name),
            ));
        }
        let no_rows: &[NodeRecord] = &[];
        summarize(&entity.name, &entity.fields, selection.node.as_deref(), no_rows, |n, f| n.get(f))?;
        Ok(NodeQuery {
            entity,
            predicate,
            sort: SortSpec::default(),
        })
    }

    /// Compile the filter, sort and cursor of a relationship query.
    pub fn prepare_relationship(
        &self,
        type_name: &str,
        rel_name: &str,
        args: &QueryArgs,
    ) -> EngineResult<RelationshipQuery<'a>> {
        let mut query = self.relationship_query(type_name, rel_name, args.where_.as_ref())?;
        query.sort = SortSpec::compile_connection(self.registry, query.rel, args.sort.as_ref())?;
        check_cursor(args, &query.sort)?;
        Ok(query)
    }

    /// Compile a relationship aggregate and check its field selections.
    pub fn prepare_relationship_aggregate(
        &self,
        type_name: &str,
        rel_name: &str,
        where_: Option<&Value>,
        selection: &AggregateSelection,
    ) -> EngineResult<RelationshipQuery<'a>> {
        let query = self.relationship_query(type_name, rel_name, where_)?;
        let no_rows: &[ConnectionRow] = &[];
        summarize(
            &query.target.name,
            &query.target.fields,
            selection.node.as_deref(),
            no_rows,
            |row, f| row.node.get(f),
        )?;
        match query.edge_schema {
            Some(schema) => {
                summarize(&schema.name, &schema.fields, selection.edge.as_deref(), no_rows, |row, f| {
                    row.edge.get(f)
                })?;
            }
            None if selection.edge.is_some() => {
                return Err(EngineError::field_validation(
                    &query.entity.name,
                    &query.rel.name,
                    format!("relationship '{}' carries no edge properties", query.rel.name),
                ));
            }
            None => {}
        }
        Ok(query)
    }

    fn relationship_query(
        &self,
        type_name: &str,
        rel_name: &str,
        where_: Option<&Value>,
    ) -> EngineResult<RelationshipQuery<'a>> {
        let registry = self.registry;
        let entity = registry.entity(type_name)?;
        let rel = registry.relationship(entity, rel_name)?;
        let target = registry.entity(&rel.target)?;
        let predicate = self.filters().compile_connection(rel, where_)?;
        Ok(RelationshipQuery {
            entity,
            target,
            rel,
            edge_schema: registry.edge_schema_for(rel),
            predicate,
            sort: SortSpec::default(),
        })
    }

    /// Plain list query with `limit`/`offset`.
    pub async fn find(
        &self,
        tx: &dyn GraphTransaction,
        query: &NodeQuery<'_>,
        args: &QueryArgs,
    ) -> EngineResult<Vec<Value>> {
        let mut nodes = PredicateEvaluator::new(tx)
            .filter_nodes(&query.entity.name, &query.predicate)
            .await?;
        query.sort.sort(&mut nodes);

        Ok(nodes
            .into_iter()
            .skip(args.offset.unwrap_or(0))
            .take(args.limit.unwrap_or(usize::MAX))
            .map(node_value)
            .collect())
    }

    /// Relay connection over the nodes of a type.
    pub async fn connection(
        &self,
        tx: &dyn GraphTransaction,
        query: &NodeQuery<'_>,
        args: &QueryArgs,
    ) -> EngineResult<Connection> {
        let nodes = PredicateEvaluator::new(tx)
            .filter_nodes(&query.entity.name, &query.predicate)
            .await?;
        let page = paginate(nodes, &query.sort, &args.page_request(), self.limits)?;

        Ok(Connection {
            edges: page
                .edges
                .into_iter()
                .map(|edge| ConnectionEdge {
                    cursor: edge.cursor,
                    node: node_value(edge.row),
                    properties: None,
                })
                .collect(),
            page_info: page.page_info,
            total_count: page.total_count,
        })
    }

    /// `{count, node}` over the nodes of a type matching the query.
    pub async fn aggregate(
        &self,
        tx: &dyn GraphTransaction,
        query: &NodeQuery<'_>,
        selection: &AggregateSelection,
    ) -> EngineResult<AggregateResult> {
        let entity = query.entity;
        let nodes = PredicateEvaluator::new(tx)
            .filter_nodes(&entity.name, &query.predicate)
            .await?;
        let node = summarize(
            &entity.name,
            &entity.fields,
            selection.node.as_deref(),
            &nodes,
            |n, f| n.get(f),
        )?;
        Ok(AggregateResult {
            count: nodes.len(),
            node,
            edge: None,
        })
    }

    /// Connection over the edges of one node's relationship.
    pub async fn relationship_connection(
        &self,
        tx: &dyn GraphTransaction,
        query: &RelationshipQuery<'_>,
        id: &str,
        args: &QueryArgs,
    ) -> EngineResult<Connection> {
        let rows = self.connection_rows(tx, query, id).await?;
        let page = paginate(rows, &query.sort, &args.page_request(), self.limits)?;
        let rich = query.rel.is_rich();

        Ok(Connection {
            edges: page
                .edges
                .into_iter()
                .map(|edge| ConnectionEdge {
                    cursor: edge.cursor,
                    properties: rich.then(|| Value::Object(edge.row.edge.properties)),
                    node: node_value(edge.row.node),
                })
                .collect(),
            page_info: page.page_info,
            total_count: page.total_count,
        })
    }

    /// `{count, node, edge}` over the edges of one node's relationship.
    pub async fn relationship_aggregate(
        &self,
        tx: &dyn GraphTransaction,
        query: &RelationshipQuery<'_>,
        id: &str,
        selection: &AggregateSelection,
    ) -> EngineResult<AggregateResult> {
        let rows = self.connection_rows(tx, query, id).await?;
        let node = summarize(
            &query.target.name,
            &query.target.fields,
            selection.node.as_deref(),
            &rows,
            |row, f| row.node.get(f),
        )?;
        let edge = match query.edge_schema {
            Some(schema) => Some(summarize(
                &schema.name,
                &schema.fields,
                selection.edge.as_deref(),
                &rows,
                |row, f| row.edge.get(f),
            )?),
            None => None,
        };
        Ok(AggregateResult {
            count: rows.len(),
            node,
            edge,
        })
    }

    async fn connection_rows(
        &self,
        tx: &dyn GraphTransaction,
        query: &RelationshipQuery<'_>,
        id: &str,
    ) -> EngineResult<Vec<ConnectionRow>> {
        match tx.node(id).await? {
            Some(node) if node.label == query.entity.name => {}
            _ => {
                return Err(EngineError::not_found(format!(
                    "no {} with id '{}'",
                    query.entity.name, id
                )))
            }
        }
        let pairs = PredicateEvaluator::new(tx)
            .filter_connection(id, query.rel, &query.predicate)
            .await?;
        Ok(pairs
            .into_iter()
            .map(|(edge, node)| ConnectionRow { edge, node })
            .collect())
    }
}

/// A resume cursor must decode and match the active sort.
fn check_cursor(args: &QueryArgs, sort: &SortSpec) -> EngineResult<()> {
    if let Some(token) = &args.after {
        Cursor::decode(token)?.check_against(sort)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EdgeRecord, GraphStore, MemoryGraphStore};
    use crate::value::Properties;
    use serde_json::json;

    fn props(value: Value) -> Properties {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn seeded() -> MemoryGraphStore {
        let store = MemoryGraphStore::new();
        let mut tx = store.begin_write().await.unwrap();
        for (id, name, costs) in [("a1", "CRM", 120.0), ("a2", "ERP", 80.0), ("a3", "Billing", 45.5)] {
            tx.insert_node(NodeRecord::new(id, "Application", props(json!({"name": name, "costs": costs}))))
                .await
                .unwrap();
        }
        tx.insert_node(NodeRecord::new("d1", "DataObject", props(json!({"name": "Customer"}))))
            .await
            .unwrap();
        tx.insert_node(NodeRecord::new("d2", "DataObject", props(json!({"name": "Invoice"}))))
            .await
            .unwrap();
        tx.insert_edge(EdgeRecord {
            id: "e1".to_string(),
            rel_type: "RELATED_TO".to_string(),
            source: "d1".to_string(),
            target: "d2".to_string(),
            properties: props(json!({"name": "billed by"})),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_find_with_sort_limit_offset() {
        let store = seeded().await;
        let registry = SchemaRegistry::enterprise_architecture().unwrap();
        let config = EngineConfig::in_memory();
        let executor = QueryExecutor::new(&registry, &config);
        let tx = store.begin_read().await.unwrap();

        let args: QueryArgs = serde_json::from_value(json!({
            "sort": [{"costs": "ASC"}],
            "limit": 2,
            "offset": 1
        }))
        .unwrap();
        let query = executor.prepare("Application", &args).unwrap();
        let rows = executor.find(tx.as_ref(), &query, &args).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("ERP"), json!("CRM")]);
    }

    #[tokio::test]
    async fn test_aggregate_counts_matching_nodes() {
        let store = seeded().await;
        let registry = SchemaRegistry::enterprise_architecture().unwrap();
        let config = EngineConfig::in_memory();
        let executor = QueryExecutor::new(&registry, &config);
        let tx = store.begin_read().await.unwrap();

        let selection = AggregateSelection {
            node: Some(vec!["costs".to_string()]),
            edge: None,
        };
        let query = executor
            .prepare_aggregate("Application", Some(&json!({"costs": {"gt": 50}})), &selection)
            .unwrap();
        let result = executor.aggregate(tx.as_ref(), &query, &selection).await.unwrap();
        assert_eq!(result.count, 2);
        assert_eq!(result.node["costs"]["sum"], json!(200.0));
    }

    #[tokio::test]
    async fn test_relationship_connection_carries_edge_properties() {
        let store = seeded().await;
        let registry = SchemaRegistry::enterprise_architecture().unwrap();
        let config = EngineConfig::in_memory();
        let executor = QueryExecutor::new(&registry, &config);
        let tx = store.begin_read().await.unwrap();

        let args = QueryArgs::default();
        let query = executor
            .prepare_relationship("DataObject", "relatedDataObjects", &args)
            .unwrap();
        let connection = executor
            .relationship_connection(tx.as_ref(), &query, "d1", &args)
            .await
            .unwrap();
        assert_eq!(connection.total_count, 1);
        assert_eq!(connection.edges[0].node["name"], json!("Invoice"));
        assert_eq!(
            connection.edges[0].properties.as_ref().unwrap()["name"],
            json!("billed by")
        );

        let selection = AggregateSelection::default();
        let query = executor
            .prepare_relationship_aggregate("DataObject", "relatedFromDataObjects", None, &selection)
            .unwrap();
        let aggregate = executor
            .relationship_aggregate(tx.as_ref(), &query, "d2", &selection)
            .await
            .unwrap();
        assert_eq!(aggregate.count, 1);
        assert_eq!(aggregate.edge.unwrap()["name"]["longest"], json!("billed by"));
    }

    #[tokio::test]
    async fn test_relationship_connection_unknown_node() {
        let store = seeded().await;
        let registry = SchemaRegistry::enterprise_architecture().unwrap();
        let config = EngineConfig::in_memory();
        let executor = QueryExecutor::new(&registry, &config);
        let tx = store.begin_read().await.unwrap();

        let args = QueryArgs::default();
        let query = executor
            .prepare_relationship("Application", "usesAIComponents", &args)
            .unwrap();
        let err = executor
            .relationship_connection(tx.as_ref(), &query, "d1", &args)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_prepare_rejects_bad_requests_without_a_transaction() {
        let registry = SchemaRegistry::enterprise_architecture().unwrap();
        let config = EngineConfig::in_memory();
        let executor = QueryExecutor::new(&registry, &config);

        let bad_filter = QueryArgs::with_where(json!({"colour": {"eq": "blue"}}));
        let err = executor.prepare("Application", &bad_filter).unwrap_err();
        assert_eq!(
            err.validation_failure().and_then(|f| f.field.as_deref()),
            Some("colour")
        );

        let bad_cursor = QueryArgs {
            after: Some("not a cursor".to_string()),
            ..QueryArgs::default()
        };
        assert!(executor.prepare("Application", &bad_cursor).unwrap_err().is_validation_error());

        let edge_on_plain = AggregateSelection {
            node: None,
            edge: Some(vec!["name".to_string()]),
        };
        assert!(executor
            .prepare_relationship_aggregate("Application", "usesAIComponents", None, &edge_on_plain)
            .unwrap_err()
            .is_validation_error());
    }
}
