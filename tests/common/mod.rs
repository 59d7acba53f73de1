//! Shared setup for integration tests

#![allow(dead_code)]

use anyhow::Result;
use archgraph::{GraphEngine, SchemaRegistry};
use serde_json::{json, Value};

/// Engine over a fresh in-memory store with the embedded schema
pub fn memory_engine() -> Result<GraphEngine> {
    Ok(GraphEngine::in_memory(SchemaRegistry::enterprise_architecture()?))
}

/// Two applications linked to AI components:
/// - "Alpha" uses a DEPLOYED and a RETIRED component
/// - "Beta" uses a RETIRED component only
/// - "Gamma" uses none
pub async fn seed_ai_landscape(engine: &GraphEngine) -> Result<()> {
    engine
        .create(
            "Application",
            &json!([
                {
                    "name": "Alpha",
                    "status": "ACTIVE",
                    "costs": 120.5,
                    "usesAIComponents": {"create": [
                        {"node": {"name": "Recommender", "status": "DEPLOYED", "accuracy": 0.91}},
                        {"node": {"name": "Legacy Scorer", "status": "RETIRED", "accuracy": 0.62}}
                    ]}
                },
                {
                    "name": "Beta",
                    "status": "SUNSET",
                    "costs": 40.0,
                    "usesAIComponents": {"create": [
                        {"node": {"name": "Old Classifier", "status": "RETIRED"}}
                    ]}
                },
                {"name": "Gamma", "status": "IN_DEVELOPMENT"}
            ]),
        )
        .await?;
    Ok(())
}

/// Names of the given entity objects, sorted
pub fn names(rows: &[Value]) -> Vec<String> {
    let mut names: Vec<String> = rows
        .iter()
        .filter_map(|row| row["name"].as_str().map(str::to_string))
        .collect();
    names.sort();
    names
}
