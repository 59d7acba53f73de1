//! Filter compiler.
//!
//! Turns a JSON `where` document into a [`Predicate`] tree, validating every
//! key against the schema registry. Nothing here touches the store, so a bad
//! filter fails before any transaction is opened.
//!
//! Shape of a `where` object on an entity type:
//!
//! ```json
//! {
//!   "AND": [...], "OR": [...], "NOT": {...},
//!   "name": { "startsWith": "Cu" },
//!   "usesAIComponents": { "some": { "status": { "eq": "DEPLOYED" } } },
//!   "owner": { "lastName": { "eq": "Doe" } },
//!   "relatedDataObjectsConnection": { "all": { "edge": { "name": { "eq": "feeds" } } } },
//!   "usesAIComponentsAggregate": { "count_GT": 1 }
//! }
//! ```
//!
//! An empty `AND` is true and an empty `OR` is false. `in: []` matches
//! nothing. `eq: null` matches a null or absent value.

use serde_json::{Map, Value};

use super::aggregate::AggregateFunction;
use crate::errors::{EngineError, EngineResult};
use crate::schema::{EdgeSchema, EntityType, Field, RelationshipField, ScalarKind, SchemaRegistry};
use crate::value;

/// How many related nodes must satisfy a nested filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    All,
    None,
    Single,
    Some,
}

impl Quantifier {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "all" => Some(Quantifier::All),
            "none" => Some(Quantifier::None),
            "single" => Some(Quantifier::Single),
            "some" => Some(Quantifier::Some),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "eq" | "EQ" => Some(CompareOp::Eq),
            "gt" | "GT" => Some(CompareOp::Gt),
            "gte" | "GTE" => Some(CompareOp::Gte),
            "lt" | "LT" => Some(CompareOp::Lt),
            "lte" | "LTE" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Gte => ordering != Less,
            CompareOp::Lt => ordering == Less,
            CompareOp::Lte => ordering != Greater,
        }
    }
}

/// A scalar field referenced by a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub name: String,
    pub kind: ScalarKind,
    pub list: bool,
}

impl From<&Field> for FieldRef {
    fn from(field: &Field) -> Self {
        Self {
            name: field.name.clone(),
            kind: field.kind.clone(),
            list: field.list,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(Value),
    In(Vec<Value>),
    Ordered(CompareOp, Value),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    /// List field holds an element equal to the value.
    Includes(Value),
}

#[derive(Debug, Clone)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Field {
        field: FieldRef,
        comparison: Comparison,
    },
    /// Quantified filter over the nodes of a "many" relationship.
    Relationship {
        rel: RelationshipField,
        quantifier: Quantifier,
        inner: Box<Predicate>,
    },
    /// Filter on the node of a "one" relationship; `None` requires that
    /// there is no related node.
    Related {
        rel: RelationshipField,
        inner: Option<Box<Predicate>>,
    },
    /// Quantified filter over edge/node pairs of a relationship.
    Connection {
        rel: RelationshipField,
        quantifier: Quantifier,
        inner: Box<ConnectionPredicate>,
    },
    /// Comparison against aggregates of a relationship's edge/node set.
    Aggregate {
        rel: RelationshipField,
        inner: Box<AggregatePredicate>,
    },
}

impl Predicate {
    pub fn always() -> Self {
        Predicate::And(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub enum ConnectionPredicate {
    And(Vec<ConnectionPredicate>),
    Or(Vec<ConnectionPredicate>),
    Not(Box<ConnectionPredicate>),
    Node(Predicate),
    Edge(Predicate),
}

impl ConnectionPredicate {
    pub fn always() -> Self {
        ConnectionPredicate::And(Vec::new())
    }
}

#[derive(Debug, Clone)]
pub enum AggregatePredicate {
    And(Vec<AggregatePredicate>),
    Or(Vec<AggregatePredicate>),
    Not(Box<AggregatePredicate>),
    Count(CompareOp, i64),
    Node(AggregateComparison),
    Edge(AggregateComparison),
}

#[derive(Debug, Clone)]
pub struct AggregateComparison {
    pub field: FieldRef,
    pub function: AggregateFunction,
    pub op: CompareOp,
    pub value: Value,
}

/// Fields a `where` object may reference: an entity type, or the property
/// list of a rich relationship.
#[derive(Clone, Copy)]
enum Scope<'a> {
    Entity(&'a EntityType),
    Edge(&'a EdgeSchema),
}

impl<'a> Scope<'a> {
    fn name(&self) -> &'a str {
        match self {
            Scope::Entity(entity) => &entity.name,
            Scope::Edge(edge) => &edge.name,
        }
    }

    fn field(&self, name: &str) -> Option<&'a Field> {
        match self {
            Scope::Entity(entity) => entity.field(name),
            Scope::Edge(edge) => edge.field(name),
        }
    }

    fn entity(&self) -> Option<&'a EntityType> {
        match self {
            Scope::Entity(entity) => Some(entity),
            Scope::Edge(_) => None,
        }
    }
}

pub struct FilterCompiler<'a> {
    registry: &'a SchemaRegistry,
    max_depth: usize,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(registry: &'a SchemaRegistry, max_depth: usize) -> Self {
        Self {
            registry,
            max_depth,
        }
    }

    /// Compile a `where` document for `entity`. `None` and `null` match
    /// every node.
    pub fn compile(&self, entity: &EntityType, filter: Option<&Value>) -> EngineResult<Predicate> {
        match filter {
            None | Some(Value::Null) => Ok(Predicate::always()),
            Some(value) => self.compile_where(Scope::Entity(entity), value, 0),
        }
    }

    /// Compile a connection `where` (`{node, edge, AND, OR, NOT}`) for the
    /// pairs reachable through `rel`.
    pub fn compile_connection(
        &self,
        rel: &RelationshipField,
        filter: Option<&Value>,
    ) -> EngineResult<ConnectionPredicate> {
        match filter {
            None | Some(Value::Null) => Ok(ConnectionPredicate::always()),
            Some(value) => self.compile_connection_where(rel, value, 0),
        }
    }

    /// Compile a filter over the properties of a rich relationship.
    pub fn compile_edge(&self, rel: &RelationshipField, filter: &Value) -> EngineResult<Predicate> {
        let edge = self.edge_schema(rel)?;
        self.compile_where(Scope::Edge(edge), filter, 0)
    }

    fn enter(&self, depth: usize) -> EngineResult<usize> {
        let next = depth + 1;
        if next > self.max_depth {
            return Err(EngineError::schema_validation(format!(
                "filter nesting exceeds the maximum depth of {}",
                self.max_depth
            )));
        }
        Ok(next)
    }

    fn edge_schema(&self, rel: &RelationshipField) -> EngineResult<&'a EdgeSchema> {
        self.registry.edge_schema_for(rel).ok_or_else(|| {
            EngineError::schema_validation(format!(
                "relationship '{}' carries no edge properties",
                rel.name
            ))
        })
    }

    fn target(&self, rel: &RelationshipField) -> EngineResult<&'a EntityType> {
        self.registry.entity(&rel.target)
    }

    fn compile_where(&self, scope: Scope<'_>, value: &Value, depth: usize) -> EngineResult<Predicate> {
        let depth = self.enter(depth)?;
        let object = as_object(value, || format!("where clause on {}", scope.name()))?;

        let mut parts = Vec::with_capacity(object.len());
        for (key, value) in object {
            parts.push(self.compile_key(scope, key, value, depth)?);
        }
        Ok(collapse(parts))
    }

    fn compile_key(
        &self,
        scope: Scope<'_>,
        key: &str,
        value: &Value,
        depth: usize,
    ) -> EngineResult<Predicate> {
        match key {
            "AND" => Ok(Predicate::And(self.compile_list(scope, key, value, depth)?)),
            "OR" => Ok(Predicate::Or(self.compile_list(scope, key, value, depth)?)),
            "NOT" => Ok(Predicate::Not(Box::new(
                self.compile_where(scope, value, depth)?,
            ))),
            _ => {
                if let Some(field) = scope.field(key) {
                    return self.compile_field(scope, field, value);
                }
                if let Some(entity) = scope.entity() {
                    if let Some(rel) = entity.relationship(key) {
                        return self.compile_relationship(rel, value, depth);
                    }
                    if let Some(rel) = entity.connection_field(key) {
                        return self.compile_connection_filter(rel, value, depth);
                    }
                    if let Some(rel) = entity.aggregate_field(key) {
                        let inner = self.compile_aggregate_where(rel, value, depth)?;
                        return Ok(Predicate::Aggregate {
                            rel: rel.clone(),
                            inner: Box::new(inner),
                        });
                    }
                }
                Err(EngineError::field_validation(scope.name(), key, format!(
                    "unknown filter field '{}' on {}",
                    key,
                    scope.name()
                )))
            }
        }
    }

    fn compile_list(
        &self,
        scope: Scope<'_>,
        key: &str,
        value: &Value,
        depth: usize,
    ) -> EngineResult<Vec<Predicate>> {
        let items = value.as_array().ok_or_else(|| {
            EngineError::schema_validation(format!("{} on {} expects a list", key, scope.name()))
        })?;
        items
            .iter()
            .map(|item| self.compile_where(scope, item, depth))
            .collect()
    }

    fn compile_field(&self, scope: Scope<'_>, field: &Field, value: &Value) -> EngineResult<Predicate> {
        let context = || format!("filter on {}.{}", scope.name(), field.name);
        let object = as_object(value, context)?;
        let field_ref = FieldRef::from(field);

        let mut parts = Vec::with_capacity(object.len());
        for (op, operand) in object {
            let comparison = self.compile_comparison(scope, field, op, operand)?;
            parts.push(Predicate::Field {
                field: field_ref.clone(),
                comparison,
            });
        }
        Ok(collapse(parts))
    }

    fn compile_comparison(
        &self,
        scope: Scope<'_>,
        field: &Field,
        op: &str,
        operand: &Value,
    ) -> EngineResult<Comparison> {
        let invalid = |message: String| {
            EngineError::field_validation(scope.name(), &field.name, format!(
                "{}.{}: {}",
                scope.name(),
                field.name,
                message
            ))
        };
        let scalar = |value: &Value| {
            value::coerce_scalar(self.registry, &field.kind, value).map_err(invalid)
        };

        if field.list {
            return match op {
                "eq" if operand.is_null() => Ok(Comparison::Eq(Value::Null)),
                "eq" => {
                    let items = operand
                        .as_array()
                        .ok_or_else(|| invalid("eq on a list field expects a list".to_string()))?;
                    let items = items.iter().map(scalar).collect::<EngineResult<Vec<_>>>()?;
                    Ok(Comparison::Eq(Value::Array(items)))
                }
                "includes" => Ok(Comparison::Includes(scalar(operand)?)),
                _ => Err(invalid(format!("operator '{}' is not supported on list fields", op))),
            };
        }

        match op {
            "eq" if operand.is_null() => Ok(Comparison::Eq(Value::Null)),
            "eq" => Ok(Comparison::Eq(scalar(operand)?)),
            "in" => {
                let items = operand
                    .as_array()
                    .ok_or_else(|| invalid("'in' expects a list".to_string()))?;
                let items = items
                    .iter()
                    .map(|item| {
                        if item.is_null() {
                            Ok(Value::Null)
                        } else {
                            scalar(item)
                        }
                    })
                    .collect::<EngineResult<Vec<_>>>()?;
                Ok(Comparison::In(items))
            }
            "gt" | "gte" | "lt" | "lte" => {
                if !field.kind.is_ordered() {
                    return Err(invalid(format!(
                        "'{}' is not supported on {} fields",
                        op,
                        field.kind.graphql_name()
                    )));
                }
                let compare = CompareOp::parse(op).ok_or_else(|| invalid(op.to_string()))?;
                Ok(Comparison::Ordered(compare, scalar(operand)?))
            }
            "contains" | "startsWith" | "endsWith" => {
                if !field.kind.is_textual() {
                    return Err(invalid(format!(
                        "'{}' is only supported on String and ID fields",
                        op
                    )));
                }
                let text = operand
                    .as_str()
                    .ok_or_else(|| invalid(format!("'{}' expects a string", op)))?
                    .to_string();
                Ok(match op {
                    "contains" => Comparison::Contains(text),
                    "startsWith" => Comparison::StartsWith(text),
                    _ => Comparison::EndsWith(text),
                })
            }
            "includes" => Err(invalid("'includes' is only supported on list fields".to_string())),
            _ => Err(invalid(format!("unknown operator '{}'", op))),
        }
    }

    fn compile_relationship(
        &self,
        rel: &RelationshipField,
        value: &Value,
        depth: usize,
    ) -> EngineResult<Predicate> {
        let target = self.target(rel)?;

        if !rel.is_many() {
            let inner = match value {
                Value::Null => None,
                other => Some(Box::new(self.compile_where(
                    Scope::Entity(target),
                    other,
                    depth,
                )?)),
            };
            return Ok(Predicate::Related {
                rel: rel.clone(),
                inner,
            });
        }

        let object = as_object(value, || format!("relationship filter '{}'", rel.name))?;
        let mut parts = Vec::with_capacity(object.len());
        for (key, nested) in object {
            let quantifier = Quantifier::parse(key).ok_or_else(|| {
                EngineError::schema_validation(format!(
                    "relationship filter '{}' expects all/none/single/some, got '{}'",
                    rel.name, key
                ))
            })?;
            let inner = self.compile_where(Scope::Entity(target), nested, depth)?;
            parts.push(Predicate::Relationship {
                rel: rel.clone(),
                quantifier,
                inner: Box::new(inner),
            });
        }
        Ok(collapse(parts))
    }

    fn compile_connection_filter(
        &self,
        rel: &RelationshipField,
        value: &Value,
        depth: usize,
    ) -> EngineResult<Predicate> {
        if !rel.is_many() {
            // A "one" connection filter is the connection where itself.
            return match value {
                Value::Null => Ok(Predicate::Related {
                    rel: rel.clone(),
                    inner: None,
                }),
                other => Ok(Predicate::Connection {
                    rel: rel.clone(),
                    quantifier: Quantifier::Some,
                    inner: Box::new(self.compile_connection_where(rel, other, depth)?),
                }),
            };
        }

        let object = as_object(value, || format!("connection filter '{}'", rel.connection_name()))?;
        let mut parts = Vec::with_capacity(object.len());
        for (key, nested) in object {
            let quantifier = Quantifier::parse(key).ok_or_else(|| {
                EngineError::schema_validation(format!(
                    "connection filter '{}' expects all/none/single/some, got '{}'",
                    rel.connection_name(),
                    key
                ))
            })?;
            parts.push(Predicate::Connection {
                rel: rel.clone(),
                quantifier,
                inner: Box::new(self.compile_connection_where(rel, nested, depth)?),
            });
        }
        Ok(collapse(parts))
    }

    fn compile_connection_where(
        &self,
        rel: &RelationshipField,
        value: &Value,
        depth: usize,
    ) -> EngineResult<ConnectionPredicate> {
        let depth = self.enter(depth)?;
        let object = as_object(value, || format!("connection where on '{}'", rel.name))?;

        let mut parts = Vec::with_capacity(object.len());
        for (key, nested) in object {
            let part = match key.as_str() {
                "AND" | "OR" => {
                    let items = nested.as_array().ok_or_else(|| {
                        EngineError::schema_validation(format!("{} expects a list", key))
                    })?;
                    let compiled = items
                        .iter()
                        .map(|item| self.compile_connection_where(rel, item, depth))
                        .collect::<EngineResult<Vec<_>>>()?;
                    if key == "AND" {
                        ConnectionPredicate::And(compiled)
                    } else {
                        ConnectionPredicate::Or(compiled)
                    }
                }
                "NOT" => ConnectionPredicate::Not(Box::new(
                    self.compile_connection_where(rel, nested, depth)?,
                )),
                "node" => {
                    let target = self.target(rel)?;
                    ConnectionPredicate::Node(self.compile_where(
                        Scope::Entity(target),
                        nested,
                        depth,
                    )?)
                }
                "edge" => {
                    let edge = self.edge_schema(rel)?;
                    ConnectionPredicate::Edge(self.compile_where(Scope::Edge(edge), nested, depth)?)
                }
                other => {
                    return Err(EngineError::schema_validation(format!(
                        "unknown connection filter key '{}' on '{}'",
                        other, rel.name
                    )))
                }
            };
            parts.push(part);
        }

        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            ConnectionPredicate::And(parts)
        })
    }

    fn compile_aggregate_where(
        &self,
        rel: &RelationshipField,
        value: &Value,
        depth: usize,
    ) -> EngineResult<AggregatePredicate> {
        let depth = self.enter(depth)?;
        let object = as_object(value, || format!("aggregate filter '{}'", rel.aggregate_name()))?;

        let mut parts = Vec::new();
        for (key, nested) in object {
            match key.as_str() {
                "AND" | "OR" => {
                    let items = nested.as_array().ok_or_else(|| {
                        EngineError::schema_validation(format!("{} expects a list", key))
                    })?;
                    let compiled = items
                        .iter()
                        .map(|item| self.compile_aggregate_where(rel, item, depth))
                        .collect::<EngineResult<Vec<_>>>()?;
                    parts.push(if key == "AND" {
                        AggregatePredicate::And(compiled)
                    } else {
                        AggregatePredicate::Or(compiled)
                    });
                }
                "NOT" => parts.push(AggregatePredicate::Not(Box::new(
                    self.compile_aggregate_where(rel, nested, depth)?,
                ))),
                "count" => {
                    let comparators = as_object(nested, || "count".to_string())?;
                    for (op, operand) in comparators {
                        parts.push(count_comparison(op, operand)?);
                    }
                }
                "node" => {
                    let target = self.target(rel)?;
                    for comparison in self.compile_field_aggregates(Scope::Entity(target), nested)? {
                        parts.push(AggregatePredicate::Node(comparison));
                    }
                }
                "edge" => {
                    let edge = self.edge_schema(rel)?;
                    for comparison in self.compile_field_aggregates(Scope::Edge(edge), nested)? {
                        parts.push(AggregatePredicate::Edge(comparison));
                    }
                }
                other => match other.strip_prefix("count_") {
                    Some(op) => parts.push(count_comparison(op, nested)?),
                    None => {
                        return Err(EngineError::schema_validation(format!(
                            "unknown aggregate filter key '{}' on '{}'",
                            other,
                            rel.aggregate_name()
                        )))
                    }
                },
            }
        }

        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            AggregatePredicate::And(parts)
        })
    }

    fn compile_field_aggregates(
        &self,
        scope: Scope<'_>,
        value: &Value,
    ) -> EngineResult<Vec<AggregateComparison>> {
        let object = as_object(value, || format!("aggregate filter on {}", scope.name()))?;
        let mut comparisons = Vec::new();
        for (name, functions) in object {
            let field = scope.field(name).ok_or_else(|| {
                EngineError::schema_validation(format!(
                    "unknown aggregate field '{}' on {}",
                    name,
                    scope.name()
                ))
            })?;
            if field.list {
                return Err(EngineError::schema_validation(format!(
                    "list field {}.{} cannot be aggregated",
                    scope.name(),
                    name
                )));
            }
            let functions = as_object(functions, || format!("aggregate filter on {}", name))?;
            for (function_name, comparators) in functions {
                let function = AggregateFunction::parse(function_name)
                    .filter(|f| f.applies_to(&field.kind))
                    .ok_or_else(|| {
                        EngineError::schema_validation(format!(
                            "aggregate '{}' is not available on {}.{} ({})",
                            function_name,
                            scope.name(),
                            name,
                            field.kind.graphql_name()
                        ))
                    })?;
                let comparators = as_object(comparators, || function_name.to_string())?;
                for (op, operand) in comparators {
                    let op_kind = CompareOp::parse(op).ok_or_else(|| {
                        EngineError::schema_validation(format!("unknown comparator '{}'", op))
                    })?;
                    let checked = if function.preserves_kind() {
                        value::coerce_scalar(self.registry, &field.kind, operand)
                    } else if operand.is_number() {
                        Ok(operand.clone())
                    } else {
                        Err(format!("expected a number but got {}", operand))
                    };
                    let value = checked.map_err(|e| {
                        EngineError::schema_validation(format!(
                            "{}.{} {}: {}",
                            scope.name(),
                            name,
                            function_name,
                            e
                        ))
                    })?;
                    comparisons.push(AggregateComparison {
                        field: FieldRef::from(field),
                        function,
                        op: op_kind,
                        value,
                    });
                }
            }
        }
        Ok(comparisons)
    }
}

fn count_comparison(op: &str, operand: &Value) -> EngineResult<AggregatePredicate> {
    let compare = CompareOp::parse(op)
        .ok_or_else(|| EngineError::schema_validation(format!("unknown count comparator '{}'", op)))?;
    let count = operand.as_i64().ok_or_else(|| {
        EngineError::schema_validation(format!("count comparator expects an Int, got {}", operand))
    })?;
    Ok(AggregatePredicate::Count(compare, count))
}

fn as_object<'v>(value: &'v Value, context: impl FnOnce() -> String) -> EngineResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| EngineError::schema_validation(format!("{} must be an object", context())))
}

fn collapse(mut parts: Vec<Predicate>) -> Predicate {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        Predicate::And(parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::enterprise_architecture().unwrap()
    }

    fn compile(registry: &SchemaRegistry, entity: &str, filter: Value) -> EngineResult<Predicate> {
        let compiler = FilterCompiler::new(registry, 32);
        compiler.compile(registry.entity(entity).unwrap(), Some(&filter))
    }

    #[test]
    fn test_some_quantifier_compiles() {
        let registry = registry();
        let predicate = compile(
            &registry,
            "Application",
            json!({"usesAIComponents": {"some": {"status": {"eq": "DEPLOYED"}}}}),
        )
        .unwrap();
        match predicate {
            Predicate::Relationship {
                rel, quantifier, ..
            } => {
                assert_eq!(rel.name, "usesAIComponents");
                assert_eq!(quantifier, Quantifier::Some);
            }
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let registry = registry();
        let err = compile(&registry, "Application", json!({"colour": {"eq": "red"}})).unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("colour"));
    }

    #[test]
    fn test_enum_value_is_validated() {
        let registry = registry();
        let err = compile(
            &registry,
            "AIComponent",
            json!({"status": {"eq": "SHIPPED"}}),
        )
        .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_string_operators_only_on_text() {
        let registry = registry();
        let err = compile(
            &registry,
            "Application",
            json!({"costs": {"contains": "1"}}),
        )
        .unwrap_err();
        assert!(err.is_validation_error());

        assert!(compile(
            &registry,
            "Application",
            json!({"name": {"startsWith": "Cu", "endsWith": "er"}})
        )
        .is_ok());
    }

    #[test]
    fn test_ordering_rejected_on_enum() {
        let registry = registry();
        let err = compile(
            &registry,
            "Application",
            json!({"status": {"gt": "ACTIVE"}}),
        )
        .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_edge_filter_requires_rich_relationship() {
        let registry = registry();
        let err = compile(
            &registry,
            "Application",
            json!({"usesAIComponentsConnection": {"some": {"edge": {"name": {"eq": "x"}}}}}),
        )
        .unwrap_err();
        assert!(err.is_validation_error());

        assert!(compile(
            &registry,
            "DataObject",
            json!({"relatedDataObjectsConnection": {"some": {"edge": {"name": {"eq": "feeds"}}}}})
        )
        .is_ok());
    }

    #[test]
    fn test_aggregate_filter_compiles() {
        let registry = registry();
        let predicate = compile(
            &registry,
            "Application",
            json!({"usesAIComponentsAggregate": {
                "count_GTE": 2,
                "node": {"accuracy": {"average": {"gt": 0.5}}, "name": {"longestLength": {"lt": 20}}}
            }}),
        )
        .unwrap();
        match predicate {
            Predicate::Aggregate { inner, .. } => match *inner {
                AggregatePredicate::And(parts) => assert_eq!(parts.len(), 3),
                other => panic!("unexpected aggregate predicate {:?}", other),
            },
            other => panic!("unexpected predicate {:?}", other),
        }
    }

    #[test]
    fn test_aggregate_function_must_fit_kind() {
        let registry = registry();
        let err = compile(
            &registry,
            "Application",
            json!({"usesAIComponentsAggregate": {"node": {"name": {"sum": {"gt": 1}}}}}),
        )
        .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_depth_limit() {
        let registry = registry();
        let compiler = FilterCompiler::new(&registry, 3);
        let entity = registry.entity("BusinessCapability").unwrap();
        let deep = json!({"children": {"some": {"children": {"some": {"children": {"some": {}}}}}}});
        let err = compiler.compile(entity, Some(&deep)).unwrap_err();
        assert!(err.is_validation_error());

        let shallow = json!({"children": {"some": {"name": {"eq": "Sales"}}}});
        assert!(compiler.compile(entity, Some(&shallow)).is_ok());
    }

    #[test]
    fn test_one_relationship_null_means_absent() {
        let registry = registry();
        let predicate = compile(&registry, "Application", json!({"owner": null})).unwrap();
        assert!(matches!(predicate, Predicate::Related { inner: None, .. }));
    }
}
