//! Sort specifications.
//!
//! Root queries sort with `[{<field>: ASC|DESC}, ...]`; relationship
//! connections with `[{node: {...}, edge: {...}}, ...]`. Keys apply in list
//! order. Within one object the key order follows the parsed map and is not
//! guaranteed. Every ordering ends with the row id ascending, so results are
//! total and stable.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{EngineError, EngineResult};
use crate::schema::{EdgeSchema, EntityType, Field, RelationshipField, ScalarKind, SchemaRegistry};
use crate::store::{EdgeRecord, NodeRecord};
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortScope {
    Node,
    Edge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub scope: SortScope,
    pub field: String,
    pub kind: ScalarKind,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
}

/// A row that can be ordered and addressed by a cursor.
pub trait SortRow {
    /// Tie-break and cursor identity.
    fn row_id(&self) -> &str;

    fn sort_value(&self, key: &SortKey) -> Option<&Value>;
}

impl SortRow for NodeRecord {
    fn row_id(&self) -> &str {
        &self.id
    }

    fn sort_value(&self, key: &SortKey) -> Option<&Value> {
        match key.scope {
            SortScope::Node => self.get(&key.field),
            SortScope::Edge => None,
        }
    }
}

/// One edge of a relationship connection together with the related node.
#[derive(Debug, Clone)]
pub struct ConnectionRow {
    pub edge: EdgeRecord,
    pub node: NodeRecord,
}

impl SortRow for ConnectionRow {
    fn row_id(&self) -> &str {
        &self.edge.id
    }

    fn sort_value(&self, key: &SortKey) -> Option<&Value> {
        match key.scope {
            SortScope::Node => self.node.get(&key.field),
            SortScope::Edge => self.edge.get(&key.field),
        }
    }
}

impl SortSpec {
    pub fn compile(entity: &EntityType, sort: Option<&Value>) -> EngineResult<Self> {
        let mut keys = Vec::new();
        for object in sort_objects(sort)? {
            for (name, direction) in object {
                let field = entity.field(name).ok_or_else(|| {
                    EngineError::field_validation(&entity.name, name, format!(
                        "unknown sort field '{}' on {}",
                        name, entity.name
                    ))
                })?;
                keys.push(sort_key(SortScope::Node, &entity.name, field, direction)?);
            }
        }
        Ok(Self { keys })
    }

    pub fn compile_connection(
        registry: &SchemaRegistry,
        rel: &RelationshipField,
        sort: Option<&Value>,
    ) -> EngineResult<Self> {
        let target = registry.entity(&rel.target)?;
        let edge: Option<&EdgeSchema> = registry.edge_schema_for(rel);

        let mut keys = Vec::new();
        for object in sort_objects(sort)? {
            for (scope_name, fields) in object {
                let fields = fields.as_object().ok_or_else(|| {
                    EngineError::schema_validation(format!(
                        "connection sort '{}' must be an object",
                        scope_name
                    ))
                })?;
                for (name, direction) in fields {
                    let key = match scope_name.as_str() {
                        "node" => {
                            let field = target.field(name).ok_or_else(|| {
                                EngineError::schema_validation(format!(
                                    "unknown sort field '{}' on {}",
                                    name, target.name
                                ))
                            })?;
                            sort_key(SortScope::Node, &target.name, field, direction)?
                        }
                        "edge" => {
                            let edge = edge.ok_or_else(|| {
                                EngineError::schema_validation(format!(
                                    "relationship '{}' carries no edge properties",
                                    rel.name
                                ))
                            })?;
                            let field = edge.field(name).ok_or_else(|| {
                                EngineError::schema_validation(format!(
                                    "unknown sort field '{}' on {}",
                                    name, edge.name
                                ))
                            })?;
                            sort_key(SortScope::Edge, &edge.name, field, direction)?
                        }
                        other => {
                            return Err(EngineError::schema_validation(format!(
                                "connection sort expects 'node' or 'edge', got '{}'",
                                other
                            )))
                        }
                    };
                    keys.push(key);
                }
            }
        }
        Ok(Self { keys })
    }

    pub fn compare_rows<R: SortRow>(&self, a: &R, b: &R) -> Ordering {
        for key in &self.keys {
            let ordering = directed(
                key.direction,
                value::sort_order(&key.kind, a.sort_value(key), b.sort_value(key)),
            );
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.row_id().cmp(b.row_id())
    }

    /// Position of `row` relative to a cursor position given as sort-key
    /// values plus row id.
    pub fn compare_to_position<R: SortRow>(&self, row: &R, keys: &[Value], id: &str) -> Ordering {
        for (key, position) in self.keys.iter().zip(keys) {
            let ordering = directed(
                key.direction,
                value::sort_order(&key.kind, row.sort_value(key), Some(position)),
            );
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        row.row_id().cmp(id)
    }

    pub fn sort<R: SortRow>(&self, rows: &mut [R]) {
        rows.sort_by(|a, b| self.compare_rows(a, b));
    }

    /// The sort-key values of a row, `null` where absent.
    pub fn key_values<R: SortRow>(&self, row: &R) -> Vec<Value> {
        self.keys
            .iter()
            .map(|key| row.sort_value(key).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

fn directed(direction: SortDirection, ordering: Ordering) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn sort_objects(sort: Option<&Value>) -> EngineResult<Vec<&serde_json::Map<String, Value>>> {
    match sort {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_object().ok_or_else(|| {
                    EngineError::schema_validation("each sort entry must be an object")
                })
            })
            .collect(),
        Some(Value::Object(object)) => Ok(vec![object]),
        Some(_) => Err(EngineError::schema_validation(
            "sort must be a list of objects",
        )),
    }
}

fn sort_key(scope: SortScope, owner: &str, field: &Field, direction: &Value) -> EngineResult<SortKey> {
    if field.list {
        return Err(EngineError::schema_validation(format!(
            "list field {}.{} cannot be sorted",
            owner, field.name
        )));
    }
    let direction: SortDirection = serde_json::from_value(direction.clone()).map_err(|_| {
        EngineError::schema_validation(format!(
            "sort direction for {}.{} must be ASC or DESC, got {}",
            owner, field.name, direction
        ))
    })?;
    Ok(SortKey {
        scope,
        field: field.name.clone(),
        kind: field.kind.clone(),
        direction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Properties;
    use serde_json::json;

    fn app(id: &str, name: Option<&str>, costs: Option<f64>) -> NodeRecord {
        let mut props = Properties::new();
        if let Some(name) = name {
            props.insert("name".to_string(), json!(name));
        }
        if let Some(costs) = costs {
            props.insert("costs".to_string(), json!(costs));
        }
        NodeRecord::new(id, "Application", props)
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::enterprise_architecture().unwrap()
    }

    #[test]
    fn test_multi_key_sort_with_id_tiebreak() {
        let registry = registry();
        let entity = registry.entity("Application").unwrap();
        let spec = SortSpec::compile(entity, Some(&json!([{"costs": "DESC"}, {"name": "ASC"}]))).unwrap();

        let mut rows = vec![
            app("4", Some("b"), Some(10.0)),
            app("3", Some("a"), Some(10.0)),
            app("2", Some("z"), None),
            app("1", Some("a"), Some(10.0)),
        ];
        spec.sort(&mut rows);
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        // DESC puts nulls first; equal keys fall back to id
        assert_eq!(ids, vec!["2", "1", "3", "4"]);
    }

    #[test]
    fn test_unknown_sort_field() {
        let registry = registry();
        let entity = registry.entity("Application").unwrap();
        let err = SortSpec::compile(entity, Some(&json!([{"colour": "ASC"}]))).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_bad_direction() {
        let registry = registry();
        let entity = registry.entity("Application").unwrap();
        let err = SortSpec::compile(entity, Some(&json!([{"name": "UP"}]))).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_connection_sort_on_edge_requires_rich_relationship() {
        let registry = registry();
        let app = registry.entity("Application").unwrap();
        let uses = app.relationship("usesAIComponents").unwrap();
        let err = SortSpec::compile_connection(&registry, uses, Some(&json!([{"edge": {"name": "ASC"}}])))
            .unwrap_err();
        assert!(err.is_validation_error());

        let data_object = registry.entity("DataObject").unwrap();
        let related = data_object.relationship("relatedDataObjects").unwrap();
        let spec = SortSpec::compile_connection(
            &registry,
            related,
            Some(&json!([{"edge": {"name": "DESC"}}, {"node": {"name": "ASC"}}])),
        )
        .unwrap();
        assert_eq!(spec.keys.len(), 2);
        assert_eq!(spec.keys[0].scope, SortScope::Edge);
    }
}
