//! SQLite-backed store tests
//!
//! The same engine operations over sea-orm, against a temporary database file
//! migrated in setup

use std::sync::Arc;

use anyhow::Result;
use archgraph::database::{establish_connection, migrations::Migrator};
use archgraph::query::QueryArgs;
use archgraph::store::{GraphCounts, GraphStore, SeaOrmGraphStore};
use archgraph::{EngineConfig, EngineError, GraphEngine, SchemaRegistry};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use tempfile::NamedTempFile;

/// Engine over a migrated SQLite file
async fn setup_sqlite_engine() -> Result<(GraphEngine, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.path().display());

    let db = establish_connection(&db_url).await?;
    Migrator::up(&db, None).await?;

    let config = EngineConfig {
        database_url: db_url,
        ..EngineConfig::default()
    };
    let store: Arc<dyn GraphStore> = Arc::new(SeaOrmGraphStore::new(db));
    let engine = GraphEngine::new(SchemaRegistry::enterprise_architecture()?, store, config);
    Ok((engine, temp_file))
}

#[tokio::test]
async fn test_migrations_create_empty_graph() -> Result<()> {
    let (engine, _temp_file) = setup_sqlite_engine().await?;

    assert_eq!(engine.store().backend_name(), "sea-orm");
    assert_eq!(engine.counts().await?, GraphCounts::default());
    Ok(())
}

#[tokio::test]
async fn test_nested_create_and_filter_on_sqlite() -> Result<()> {
    let (engine, _temp_file) = setup_sqlite_engine().await?;

    let result = engine
        .create(
            "Application",
            &json!([
                {
                    "name": "Alpha",
                    "usesAIComponents": {"create": [
                        {"node": {"name": "Recommender", "status": "DEPLOYED"}},
                        {"node": {"name": "Legacy Scorer", "status": "RETIRED"}}
                    ]}
                },
                {
                    "name": "Beta",
                    "usesAIComponents": {"create": [{"node": {"name": "Old Classifier", "status": "RETIRED"}}]}
                }
            ]),
        )
        .await?;
    assert_eq!(result.info.nodes_created, 5);
    assert_eq!(result.info.relationships_created, 3);

    let rows = engine
        .find(
            "Application",
            &QueryArgs::with_where(json!({"usesAIComponents": {"some": {"status": {"eq": "DEPLOYED"}}}})),
        )
        .await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("Alpha"));

    assert_eq!(engine.counts().await?, GraphCounts { nodes: 5, edges: 3 });
    Ok(())
}

#[tokio::test]
async fn test_failed_mutation_leaves_sqlite_untouched() -> Result<()> {
    let (engine, _temp_file) = setup_sqlite_engine().await?;
    engine
        .create("Application", &json!({"name": "Alpha", "hostedOn": {"create": [{"node": {"name": "vm-1"}}]}}))
        .await?;
    let before = engine.counts().await?;

    let err = engine
        .create(
            "Application",
            &json!([
                {"name": "Beta", "hostedOn": {"connect": [{"where": {"node": {"name": {"eq": "vm-1"}}}}]}},
                {"name": "Gamma", "hostedOn": {"connect": [{"where": {"node": {"name": {"eq": "vm-404"}}}}]}}
            ]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert_eq!(engine.counts().await?, before);
    Ok(())
}

#[tokio::test]
async fn test_update_and_delete_on_sqlite() -> Result<()> {
    let (engine, _temp_file) = setup_sqlite_engine().await?;
    engine
        .create(
            "DataObject",
            &json!({
                "name": "Customer",
                "recordCount": 10,
                "relatedDataObjects": {"create": [{"node": {"name": "Order"}, "edge": {"name": "places"}}]}
            }),
        )
        .await?;

    let updated = engine
        .update(
            "DataObject",
            Some(&json!({"name": {"eq": "Customer"}})),
            Some(&json!({"recordCount": {"subtract": 4}})),
        )
        .await?;
    assert_eq!(updated.entities[0]["recordCount"], json!(6));

    let info = engine
        .delete(
            "DataObject",
            Some(&json!({"name": {"eq": "Customer"}})),
            Some(&json!({"relatedDataObjects": [{}]})),
        )
        .await?;
    assert_eq!(info.nodes_deleted, 2);
    assert_eq!(info.relationships_deleted, 1);
    assert_eq!(engine.counts().await?, GraphCounts::default());
    Ok(())
}

#[tokio::test]
async fn test_paging_on_sqlite() -> Result<()> {
    let (engine, _temp_file) = setup_sqlite_engine().await?;
    let people: Vec<serde_json::Value> = (0..7)
        .map(|i| json!({"firstName": format!("P{}", i), "lastName": "Doe", "email": format!("p{}@example.com", i)}))
        .collect();
    engine.create("Person", &serde_json::Value::Array(people)).await?;

    let mut args = QueryArgs {
        sort: Some(json!([{"email": "DESC"}])),
        first: Some(3),
        ..QueryArgs::default()
    };
    let mut emails = Vec::new();
    loop {
        let page = engine.connection("Person", &args).await?;
        emails.extend(page.edges.iter().map(|e| e.node["email"].clone()));
        if !page.page_info.has_next_page {
            break;
        }
        args.after = page.page_info.end_cursor;
    }

    let expected: Vec<serde_json::Value> = (0..7)
        .rev()
        .map(|i| json!(format!("p{}@example.com", i)))
        .collect();
    assert_eq!(emails, expected);
    Ok(())
}
