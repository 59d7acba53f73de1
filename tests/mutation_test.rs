//! Nested mutation tests
//!
//! Creates, updates and deletes across relationships, with the all-or-nothing
//! guarantee checked through before/after store counts

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use archgraph::errors::StoreResult;
use archgraph::query::QueryArgs;
use archgraph::schema::Direction;
use archgraph::store::{
    EdgeRecord, GraphCounts, GraphStore, GraphTransaction, MemoryGraphStore, NodeRecord,
};
use archgraph::{EngineConfig, EngineError, GraphEngine, SchemaRegistry};
use async_trait::async_trait;
use common::{memory_engine, names, seed_ai_landscape};
use serde_json::json;

async fn find_one(engine: &GraphEngine, type_name: &str, name: &str) -> Result<serde_json::Value> {
    let rows = engine
        .find(type_name, &QueryArgs::with_where(json!({"name": {"eq": name}})))
        .await?;
    rows.into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no {} named {}", type_name, name))
}

#[tokio::test]
async fn test_nested_create_reports_counts() -> Result<()> {
    let engine = memory_engine()?;

    let result = engine
        .create(
            "Application",
            &json!({
                "name": "CRM",
                "tags": ["sales", "core"],
                "interfaces": {"create": [
                    {"node": {"name": "REST", "dataObjects": {"create": [{"node": {"name": "Customer"}}]}}}
                ]},
                "owner": {"create": {"node": {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"}}}
            }),
        )
        .await?;

    assert_eq!(result.info.nodes_created, 4);
    assert_eq!(result.info.relationships_created, 3);
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0]["tags"], json!(["sales", "core"]));
    assert!(result.entities[0]["createdAt"].is_string());
    assert!(result.entities[0].get("updatedAt").is_none());

    let counts = engine.counts().await?;
    assert_eq!(counts, GraphCounts { nodes: 4, edges: 3 });
    Ok(())
}

#[tokio::test]
async fn test_missing_edge_property_fails_before_any_write() -> Result<()> {
    let engine = memory_engine()?;

    let err = engine
        .create(
            "DataObject",
            &json!({
                "name": "Customer",
                "relatedDataObjects": {"create": [{"node": {"name": "Order"}, "edge": {"description": "no name"}}]}
            }),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::SchemaValidation(_)));
    assert_eq!(engine.counts().await?, GraphCounts::default());
    Ok(())
}

#[tokio::test]
async fn test_failure_on_later_operation_rolls_back_everything() -> Result<()> {
    let engine = memory_engine()?;
    seed_ai_landscape(&engine).await?;
    let before = engine.counts().await?;

    // the first two applications and their nested creates apply, then the
    // connect of the third finds nothing
    let err = engine
        .create(
            "Application",
            &json!([
                {"name": "Delta", "usesAIComponents": {"create": [{"node": {"name": "Vision"}}]}},
                {"name": "Epsilon", "usesAIComponents": {"connect": [{"where": {"node": {"name": {"eq": "Recommender"}}}}]}},
                {"name": "Zeta", "usesAIComponents": {"connect": [{"where": {"node": {"name": {"eq": "ghost"}}}}]}}
            ]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(engine.counts().await?, before);
    let rows = engine.find("Application", &QueryArgs::default()).await?;
    assert_eq!(names(&rows), vec!["Alpha", "Beta", "Gamma"]);
    Ok(())
}

#[tokio::test]
async fn test_update_failure_rolls_back_scalar_changes() -> Result<()> {
    let engine = memory_engine()?;
    engine
        .create(
            "Application",
            &json!([{"name": "A", "userCount": 10}, {"name": "B", "userCount": 9223372036854775807i64}]),
        )
        .await?;

    // A is updated first in id order or second; either way B overflows
    let err = engine
        .update("Application", None, Some(&json!({"userCount": {"add": 1}})))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOperation(_)));

    let a = find_one(&engine, "Application", "A").await?;
    assert_eq!(a["userCount"], json!(10));
    assert!(a.get("updatedAt").is_none());
    Ok(())
}

#[tokio::test]
async fn test_second_owner_is_a_conflict() -> Result<()> {
    let engine = memory_engine()?;
    engine
        .create(
            "Person",
            &json!([
                {"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"},
                {"firstName": "Alan", "lastName": "Turing", "email": "alan@example.com"}
            ]),
        )
        .await?;
    engine
        .create(
            "Application",
            &json!({"name": "CRM", "owner": {"connect": {"where": {"node": {"email": {"eq": "ada@example.com"}}}}}}),
        )
        .await?;
    let before = engine.counts().await?;

    let err = engine
        .update(
            "Application",
            Some(&json!({"name": {"eq": "CRM"}})),
            Some(&json!({"owner": {"connect": {"where": {"node": {"email": {"eq": "alan@example.com"}}}}}})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(engine.counts().await?, before);

    // the inverse side of OWNED_BY is checked too
    let err = engine
        .update(
            "Person",
            Some(&json!({"email": {"eq": "alan@example.com"}})),
            Some(&json!({"ownedApplications": [{"connect": [{"where": {"node": {"name": {"eq": "CRM"}}}}]}]})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    Ok(())
}

#[tokio::test]
async fn test_list_for_one_relationship_is_rejected() -> Result<()> {
    let engine = memory_engine()?;

    let err = engine
        .create(
            "Application",
            &json!({
                "name": "CRM",
                "owner": {"create": [{"node": {"firstName": "A", "lastName": "B", "email": "a@b.c"}}]}
            }),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SchemaValidation(_)));
    assert_eq!(engine.counts().await?, GraphCounts::default());
    Ok(())
}

#[tokio::test]
async fn test_update_disconnect_then_connect() -> Result<()> {
    let engine = memory_engine()?;
    seed_ai_landscape(&engine).await?;

    let result = engine
        .update(
            "Application",
            Some(&json!({"name": {"eq": "Beta"}})),
            Some(&json!({
                "status": {"set": "OUT_OF_SERVICE"},
                "usesAIComponents": [{
                    "disconnect": [{"where": {"node": {"status": {"eq": "RETIRED"}}}}],
                    "connect": [{"where": {"node": {"name": {"eq": "Recommender"}}}}]
                }]
            })),
        )
        .await?;

    assert_eq!(result.info.relationships_deleted, 1);
    assert_eq!(result.info.relationships_created, 1);
    assert_eq!(result.info.nodes_created, 0);
    assert_eq!(result.entities[0]["status"], json!("OUT_OF_SERVICE"));
    assert!(result.entities[0]["updatedAt"].is_string());

    let deployed_users = engine
        .find(
            "Application",
            &QueryArgs::with_where(json!({"usesAIComponents": {"some": {"status": {"eq": "DEPLOYED"}}}})),
        )
        .await?;
    assert_eq!(names(&deployed_users), vec!["Alpha", "Beta"]);

    // the disconnected component survives
    let orphan = find_one(&engine, "AIComponent", "Old Classifier").await?;
    assert_eq!(orphan["status"], json!("RETIRED"));
    Ok(())
}

#[tokio::test]
async fn test_update_nested_node_and_list_ops() -> Result<()> {
    let engine = memory_engine()?;
    engine
        .create(
            "Application",
            &json!({
                "name": "CRM",
                "costs": 100.0,
                "tags": ["a", "b", "c"],
                "usesAIComponents": {"create": [{"node": {"name": "Scorer", "accuracy": 0.5}}]}
            }),
        )
        .await?;

    let result = engine
        .update(
            "Application",
            None,
            Some(&json!({
                "costs": {"multiply": 1.5},
                "tags": {"pop": 2},
                "usesAIComponents": [{
                    "where": {"node": {"name": {"eq": "Scorer"}}},
                    "update": {"node": {"accuracy": {"add": 0.25}, "status": {"set": "TESTING"}}}
                }]
            })),
        )
        .await?;
    assert_eq!(result.entities[0]["costs"], json!(150.0));
    assert_eq!(result.entities[0]["tags"], json!(["a"]));

    let scorer = find_one(&engine, "AIComponent", "Scorer").await?;
    assert_eq!(scorer["accuracy"], json!(0.75));
    assert_eq!(scorer["status"], json!("TESTING"));
    Ok(())
}

#[tokio::test]
async fn test_update_rich_edge_properties() -> Result<()> {
    let engine = memory_engine()?;
    engine
        .create(
            "DataObject",
            &json!({
                "name": "Customer",
                "relatedDataObjects": {"create": [{"node": {"name": "Order"}, "edge": {"name": "places"}}]}
            }),
        )
        .await?;

    engine
        .update(
            "DataObject",
            Some(&json!({"name": {"eq": "Customer"}})),
            Some(&json!({
                "relatedDataObjects": [{
                    "where": {"edge": {"name": {"eq": "places"}}},
                    "update": {"edge": {"description": {"set": "one customer, many orders"}}}
                }]
            })),
        )
        .await?;

    let customer = find_one(&engine, "DataObject", "Customer").await?;
    let id = customer["id"].as_str().unwrap_or_default().to_string();
    let connection = engine
        .relationship_connection("DataObject", &id, "relatedDataObjects", &QueryArgs::default())
        .await?;
    let properties = connection.edges[0].properties.clone().unwrap_or_default();
    assert_eq!(properties["name"], json!("places"));
    assert_eq!(properties["description"], json!("one customer, many orders"));
    Ok(())
}

#[tokio::test]
async fn test_update_on_empty_one_relationship_is_not_found() -> Result<()> {
    let engine = memory_engine()?;
    engine.create("Application", &json!({"name": "CRM"})).await?;

    let err = engine
        .update(
            "Application",
            None,
            Some(&json!({"owner": {"update": {"node": {"role": {"set": "owner"}}}}})),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn test_delete_cascades_through_nested_input() -> Result<()> {
    let engine = memory_engine()?;
    seed_ai_landscape(&engine).await?;

    let info = engine
        .delete(
            "Application",
            Some(&json!({"name": {"eq": "Alpha"}})),
            Some(&json!({"usesAIComponents": [{"where": {"node": {"status": {"eq": "RETIRED"}}}}]})),
        )
        .await?;

    assert_eq!(info.nodes_deleted, 2);
    assert_eq!(info.relationships_deleted, 2);

    // the deployed component loses its edge but stays
    let recommender = engine
        .find(
            "AIComponent",
            &QueryArgs::with_where(json!({"name": {"eq": "Recommender"}, "usedByApplications": {"none": {}}})),
        )
        .await?;
    assert_eq!(recommender.len(), 1);
    assert_eq!(engine.counts().await?, GraphCounts { nodes: 4, edges: 1 });
    Ok(())
}

#[tokio::test]
async fn test_delete_without_match_reports_zero() -> Result<()> {
    let engine = memory_engine()?;
    seed_ai_landscape(&engine).await?;
    let before = engine.counts().await?;

    let info = engine
        .delete("Application", Some(&json!({"name": {"eq": "nobody"}})), None)
        .await?;
    assert_eq!(info.nodes_deleted, 0);
    assert_eq!(info.relationships_deleted, 0);
    assert_eq!(engine.counts().await?, before);
    Ok(())
}

#[tokio::test]
async fn test_generated_fields_are_not_writable() -> Result<()> {
    let engine = memory_engine()?;

    let err = engine
        .create("Application", &json!({"name": "CRM", "id": "fixed"}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SchemaValidation(_)));

    engine.create("Application", &json!({"name": "CRM"})).await?;
    let err = engine
        .update("Application", None, Some(&json!({"createdAt": {"set": "2020-01-01T00:00:00Z"}})))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SchemaValidation(_)));
    Ok(())
}

/// Parent capability "P" (maturity 0) with one child "C" (maturity 1), built
/// four different ways so the two nodes land in different store orders
async fn seed_capability_pair(engine: &GraphEngine, variant: usize) -> Result<()> {
    let parent = json!({"name": "P", "maturityLevel": 0});
    let child = json!({"name": "C", "maturityLevel": 1});
    match variant % 4 {
        0 => {
            let mut input = parent;
            input["children"] = json!({"create": [{"node": child}]});
            engine.create("BusinessCapability", &input).await?;
        }
        1 => {
            let mut input = child;
            input["parentCapability"] = json!({"create": {"node": parent}});
            engine.create("BusinessCapability", &input).await?;
        }
        2 => {
            engine.create("BusinessCapability", &child).await?;
            let mut input = parent;
            input["children"] = json!({"connect": [{"where": {"node": {"name": {"eq": "C"}}}}]});
            engine.create("BusinessCapability", &input).await?;
        }
        _ => {
            engine.create("BusinessCapability", &parent).await?;
            let mut input = child;
            input["parentCapability"] = json!({"connect": {"where": {"node": {"name": {"eq": "P"}}}}});
            engine.create("BusinessCapability", &input).await?;
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_update_sees_nested_changes_to_other_matches() -> Result<()> {
    for variant in 0..12 {
        let engine = memory_engine()?;
        seed_capability_pair(&engine, variant).await?;

        let result = engine
            .update(
                "BusinessCapability",
                None,
                Some(&json!({
                    "maturityLevel": {"add": 1},
                    "children": [{"update": {"node": {"maturityLevel": {"add": 10}}}}]
                })),
            )
            .await?;
        assert_eq!(result.entities.len(), 2, "variant {}", variant);

        let parent = find_one(&engine, "BusinessCapability", "P").await?;
        let child = find_one(&engine, "BusinessCapability", "C").await?;
        assert_eq!(parent["maturityLevel"], json!(1), "variant {}", variant);
        assert_eq!(child["maturityLevel"], json!(12), "variant {}", variant);

        let returned = result
            .entities
            .iter()
            .find(|e| e["name"] == json!("C"))
            .cloned()
            .unwrap_or_default();
        assert_eq!(returned["maturityLevel"], json!(12), "variant {}", variant);
    }
    Ok(())
}

#[tokio::test]
async fn test_update_skips_matches_deleted_by_nested_delete() -> Result<()> {
    for variant in 0..12 {
        let engine = memory_engine()?;
        seed_capability_pair(&engine, variant).await?;

        let result = engine
            .update(
                "BusinessCapability",
                None,
                Some(&json!({
                    "description": {"set": "touched"},
                    "children": [{"delete": [{}]}]
                })),
            )
            .await?;

        assert_eq!(result.info.nodes_deleted, 1, "variant {}", variant);
        assert_eq!(result.info.relationships_deleted, 1, "variant {}", variant);
        assert_eq!(names(&result.entities), vec!["P"], "variant {}", variant);
        assert_eq!(result.entities[0]["description"], json!("touched"));
        assert_eq!(engine.counts().await?, GraphCounts { nodes: 1, edges: 0 });
    }
    Ok(())
}

/// Store wrapper whose writes stall, to drive request timeouts
struct SlowStore {
    inner: MemoryGraphStore,
    delay: Duration,
}

struct SlowTransaction {
    inner: Box<dyn GraphTransaction>,
    delay: Duration,
}

#[async_trait]
impl GraphStore for SlowStore {
    fn backend_name(&self) -> &'static str {
        "slow"
    }

    async fn begin_read(&self) -> StoreResult<Box<dyn GraphTransaction>> {
        self.inner.begin_read().await
    }

    async fn begin_write(&self) -> StoreResult<Box<dyn GraphTransaction>> {
        Ok(Box::new(SlowTransaction {
            inner: self.inner.begin_write().await?,
            delay: self.delay,
        }))
    }

    async fn counts(&self) -> StoreResult<GraphCounts> {
        self.inner.counts().await
    }
}

#[async_trait]
impl GraphTransaction for SlowTransaction {
    async fn node(&self, id: &str) -> StoreResult<Option<NodeRecord>> {
        self.inner.node(id).await
    }

    async fn nodes_by_label(&self, label: &str) -> StoreResult<Vec<NodeRecord>> {
        self.inner.nodes_by_label(label).await
    }

    async fn edges(
        &self,
        node_id: &str,
        rel_type: &str,
        direction: Direction,
    ) -> StoreResult<Vec<EdgeRecord>> {
        self.inner.edges(node_id, rel_type, direction).await
    }

    async fn edges_touching(&self, node_id: &str) -> StoreResult<Vec<EdgeRecord>> {
        self.inner.edges_touching(node_id).await
    }

    async fn insert_node(&mut self, node: NodeRecord) -> StoreResult<()> {
        self.inner.insert_node(node).await?;
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn update_node(&mut self, node: NodeRecord) -> StoreResult<()> {
        self.inner.update_node(node).await
    }

    async fn delete_node(&mut self, id: &str) -> StoreResult<()> {
        self.inner.delete_node(id).await
    }

    async fn insert_edge(&mut self, edge: EdgeRecord) -> StoreResult<()> {
        self.inner.insert_edge(edge).await
    }

    async fn update_edge(&mut self, edge: EdgeRecord) -> StoreResult<()> {
        self.inner.update_edge(edge).await
    }

    async fn delete_edge(&mut self, id: &str) -> StoreResult<()> {
        self.inner.delete_edge(id).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.rollback().await
    }
}

#[tokio::test]
async fn test_timeout_cancels_and_rolls_back() -> Result<()> {
    let config = EngineConfig {
        request_timeout_ms: Some(100),
        ..EngineConfig::in_memory()
    };
    let store = Arc::new(SlowStore {
        inner: MemoryGraphStore::new(),
        delay: Duration::from_millis(40),
    });
    let engine = GraphEngine::new(SchemaRegistry::enterprise_architecture()?, store, config);

    // one node fits in the budget
    engine.create("Application", &json!({"name": "Quick"})).await?;

    let err = engine
        .create(
            "Application",
            &json!([{"name": "One"}, {"name": "Two"}, {"name": "Three"}, {"name": "Four"}]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled(_)));
    assert_eq!(err.error_code(), "CANCELLED");

    // nothing of the cancelled request is visible, and the writer lock was released
    assert_eq!(engine.counts().await?, GraphCounts { nodes: 1, edges: 0 });
    engine.create("Application", &json!({"name": "After"})).await?;
    assert_eq!(engine.counts().await?.nodes, 2);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_creates_all_commit() -> Result<()> {
    let engine = memory_engine()?;

    let mut handles = Vec::new();
    for i in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .create(
                    "Application",
                    &json!({
                        "name": format!("App {}", i),
                        "hostedOn": {"create": [{"node": {"name": format!("Host {}", i)}}]}
                    }),
                )
                .await
        }));
    }
    for handle in handles {
        let result = handle.await??;
        assert_eq!(result.info.nodes_created, 2);
    }

    assert_eq!(engine.counts().await?, GraphCounts { nodes: 20, edges: 10 });
    Ok(())
}
