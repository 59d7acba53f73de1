//! Parsing of nested mutation inputs.
//!
//! A JSON create/update/delete document is checked against the registry and
//! turned into a typed tree before any transaction is opened. Every
//! validation failure surfaces here as `SchemaValidation`, so a malformed
//! request never reaches the store.

use serde_json::{Map, Value};

use crate::errors::{EngineError, EngineResult};
use crate::query::filter::{ConnectionPredicate, FilterCompiler, Predicate};
use crate::schema::{EntityType, Field, RelationshipField, SchemaRegistry};
use crate::value::{self, Properties};

/// A scalar mutation on an existing node or edge property.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarOp {
    Set(Value),
    Add(Value),
    Subtract(Value),
    Multiply(Value),
    Divide(Value),
    /// Append to a list field.
    Push(Vec<Value>),
    /// Remove this many trailing list items.
    Pop(usize),
}

impl ScalarOp {
    /// Apply to the current value of `field`.
    pub fn apply(&self, field: &Field, current: Option<&Value>) -> EngineResult<Value> {
        match self {
            ScalarOp::Set(value) => Ok(value.clone()),
            ScalarOp::Add(operand) => arithmetic(field, current, operand, "add"),
            ScalarOp::Subtract(operand) => arithmetic(field, current, operand, "subtract"),
            ScalarOp::Multiply(operand) => arithmetic(field, current, operand, "multiply"),
            ScalarOp::Divide(operand) => arithmetic(field, current, operand, "divide"),
            ScalarOp::Push(items) => {
                let mut list = current_list(field, current)?;
                list.extend(items.iter().cloned());
                Ok(Value::Array(list))
            }
            ScalarOp::Pop(count) => {
                let mut list = current_list(field, current)?;
                let keep = list.len().saturating_sub(*count);
                list.truncate(keep);
                Ok(Value::Array(list))
            }
        }
    }
}

fn current_list(field: &Field, current: Option<&Value>) -> EngineResult<Vec<Value>> {
    match current {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(EngineError::invalid_operation(format!(
            "field '{}' holds {} instead of a list",
            field.name, other
        ))),
    }
}

fn arithmetic(field: &Field, current: Option<&Value>, operand: &Value, op: &str) -> EngineResult<Value> {
    let current = current.filter(|v| !v.is_null()).ok_or_else(|| {
        EngineError::invalid_operation(format!("cannot {} on null field '{}'", op, field.name))
    })?;

    if let (Some(a), Some(b)) = (current.as_i64(), operand.as_i64()) {
        if field.kind == crate::schema::ScalarKind::Int {
            let result = match op {
                "add" => a.checked_add(b),
                "subtract" => a.checked_sub(b),
                "multiply" => a.checked_mul(b),
                _ => a.checked_div(b),
            };
            return result.map(Value::from).ok_or_else(|| {
                EngineError::invalid_operation(format!(
                    "integer overflow applying {} to '{}'",
                    op, field.name
                ))
            });
        }
    }

    let (Some(a), Some(b)) = (current.as_f64(), operand.as_f64()) else {
        return Err(EngineError::invalid_operation(format!(
            "field '{}' does not hold a number",
            field.name
        )));
    };
    let result = match op {
        "add" => a + b,
        "subtract" => a - b,
        "multiply" => a * b,
        _ => a / b,
    };
    serde_json::Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| {
            EngineError::invalid_operation(format!(
                "{} on '{}' produced a non-finite value",
                op, field.name
            ))
        })
}

/// A node to create, with the relationship operations nested under it.
#[derive(Debug, Clone)]
pub struct CreateNode {
    pub entity: String,
    pub properties: Properties,
    pub relationships: Vec<RelationshipCreate>,
}

#[derive(Debug, Clone)]
pub struct RelationshipCreate {
    pub rel: RelationshipField,
    pub create: Vec<NestedCreate>,
    pub connect: Vec<ConnectInput>,
}

/// A related node created together with the edge to its parent.
#[derive(Debug, Clone)]
pub struct NestedCreate {
    pub node: CreateNode,
    pub edge: Properties,
}

/// Attach existing nodes matching `where_`.
#[derive(Debug, Clone)]
pub struct ConnectInput {
    pub where_: Predicate,
    pub edge: Properties,
    /// Further connects made from each connected node.
    pub connect: Vec<RelationshipConnect>,
    /// Update the properties of an existing edge between the same pair
    /// instead of adding a parallel one.
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct RelationshipConnect {
    pub rel: RelationshipField,
    pub connect: Vec<ConnectInput>,
}

#[derive(Debug, Clone)]
pub struct FieldUpdate {
    pub field: Field,
    pub op: ScalarOp,
}

#[derive(Debug, Clone)]
pub struct UpdateNode {
    pub entity: String,
    pub scalars: Vec<FieldUpdate>,
    pub relationships: Vec<RelationshipUpdate>,
}

#[derive(Debug, Clone)]
pub struct RelationshipUpdate {
    pub rel: RelationshipField,
    pub elements: Vec<RelationshipUpdateElement>,
}

/// One element of a relationship update list. Its parts run in the order
/// disconnect, delete, update, connect, create.
#[derive(Debug, Clone)]
pub struct RelationshipUpdateElement {
    /// Selects the related pairs that `update` applies to.
    pub where_: Option<ConnectionPredicate>,
    pub update_node: Option<UpdateNode>,
    pub update_edge: Vec<FieldUpdate>,
    pub connect: Vec<ConnectInput>,
    pub disconnect: Vec<DisconnectInput>,
    pub create: Vec<NestedCreate>,
    pub delete: Vec<DeleteInput>,
}

impl RelationshipUpdateElement {
    pub fn has_update(&self) -> bool {
        self.update_node.is_some() || !self.update_edge.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DisconnectInput {
    pub where_: Option<ConnectionPredicate>,
    /// Further disconnects made from each disconnected node.
    pub disconnect: Vec<RelationshipDisconnect>,
}

#[derive(Debug, Clone)]
pub struct RelationshipDisconnect {
    pub rel: RelationshipField,
    pub items: Vec<DisconnectInput>,
}

#[derive(Debug, Clone)]
pub struct DeleteInput {
    pub where_: Option<ConnectionPredicate>,
    pub delete: DeleteNode,
}

/// Cascade to apply when a node is deleted.
#[derive(Debug, Clone, Default)]
pub struct DeleteNode {
    pub relationships: Vec<RelationshipDelete>,
}

#[derive(Debug, Clone)]
pub struct RelationshipDelete {
    pub rel: RelationshipField,
    pub items: Vec<DeleteInput>,
}

pub struct MutationParser<'a> {
    registry: &'a SchemaRegistry,
    filters: FilterCompiler<'a>,
}

impl<'a> MutationParser<'a> {
    pub fn new(registry: &'a SchemaRegistry, max_filter_depth: usize) -> Self {
        Self {
            registry,
            filters: FilterCompiler::new(registry, max_filter_depth),
        }
    }

    /// A single create input or a list of them.
    pub fn parse_creates(&self, entity: &EntityType, input: &Value) -> EngineResult<Vec<CreateNode>> {
        match input {
            Value::Array(items) => items.iter().map(|item| self.parse_create(entity, item)).collect(),
            other => Ok(vec![self.parse_create(entity, other)?]),
        }
    }

    pub fn parse_create(&self, entity: &EntityType, input: &Value) -> EngineResult<CreateNode> {
        let object = as_object(input, || format!("{} create input", entity.name))?;

        let mut properties = Properties::new();
        let mut relationships = Vec::new();
        for (key, value) in object {
            if let Some(field) = entity.field(key) {
                reject_generated(&entity.name, field)?;
                let coerced = self.coerce(&entity.name, field, value)?;
                if !coerced.is_null() {
                    properties.insert(key.clone(), coerced);
                }
            } else if let Some(rel) = entity.relationship(key) {
                relationships.push(self.parse_relationship_create(rel, value)?);
            } else {
                return Err(unknown_field(key, &entity.name));
            }
        }

        for field in entity.required_fields() {
            if !properties.contains_key(&field.name) {
                return Err(EngineError::field_validation(&entity.name, &field.name, format!(
                    "missing required field '{}' on {}",
                    field.name, entity.name
                )));
            }
        }

        Ok(CreateNode {
            entity: entity.name.clone(),
            properties,
            relationships,
        })
    }

    fn parse_relationship_create(
        &self,
        rel: &RelationshipField,
        input: &Value,
    ) -> EngineResult<RelationshipCreate> {
        let object = as_object(input, || format!("relationship input '{}'", rel.name))?;
        let target = self.registry.entity(&rel.target)?;

        let mut create = Vec::new();
        let mut connect = Vec::new();
        for (key, value) in object {
            match key.as_str() {
                "create" => {
                    for item in items(rel, value, key)? {
                        create.push(self.parse_nested_create(rel, target, item)?);
                    }
                }
                "connect" => {
                    for item in items(rel, value, key)? {
                        connect.push(self.parse_connect(rel, item)?);
                    }
                }
                other => return Err(unknown_operation(other, rel)),
            }
        }

        if !rel.is_many() && create.len() + connect.len() > 1 {
            return Err(EngineError::schema_validation(format!(
                "relationship '{}' holds a single node; use either create or connect",
                rel.name
            )));
        }

        Ok(RelationshipCreate {
            rel: rel.clone(),
            create,
            connect,
        })
    }

    fn parse_nested_create(
        &self,
        rel: &RelationshipField,
        target: &EntityType,
        input: &Value,
    ) -> EngineResult<NestedCreate> {
        let object = as_object(input, || format!("create on '{}'", rel.name))?;
        check_keys(object, &["node", "edge"], || format!("create on '{}'", rel.name))?;
        let node = object.get("node").ok_or_else(|| {
            EngineError::schema_validation(format!("create on '{}' requires 'node'", rel.name))
        })?;
        Ok(NestedCreate {
            node: self.parse_create(target, node)?,
            edge: self.parse_edge_properties(rel, object.get("edge"))?,
        })
    }

    fn parse_connect(&self, rel: &RelationshipField, input: &Value) -> EngineResult<ConnectInput> {
        let object = as_object(input, || format!("connect on '{}'", rel.name))?;
        check_keys(object, &["where", "edge", "connect", "overwrite"], || {
            format!("connect on '{}'", rel.name)
        })?;
        let target = self.registry.entity(&rel.target)?;

        let where_ = match object.get("where") {
            None | Some(Value::Null) => Predicate::always(),
            Some(value) => {
                let where_object = as_object(value, || format!("connect where on '{}'", rel.name))?;
                check_keys(where_object, &["node"], || format!("connect where on '{}'", rel.name))?;
                self.filters.compile(target, where_object.get("node"))?
            }
        };

        let overwrite = match object.get("overwrite") {
            None | Some(Value::Null) => true,
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(EngineError::schema_validation(format!(
                    "overwrite on '{}' must be a Boolean, got {}",
                    rel.name, other
                )))
            }
        };

        let mut connect = Vec::new();
        if let Some(nested) = object.get("connect").filter(|v| !v.is_null()) {
            let nested = as_object(nested, || format!("nested connect on '{}'", rel.name))?;
            for (key, value) in nested {
                let nested_rel = self.registry.relationship(target, key)?;
                let inputs = items(nested_rel, value, "connect")?
                    .into_iter()
                    .map(|item| self.parse_connect(nested_rel, item))
                    .collect::<EngineResult<Vec<_>>>()?;
                connect.push(RelationshipConnect {
                    rel: nested_rel.clone(),
                    connect: inputs,
                });
            }
        }

        Ok(ConnectInput {
            where_,
            edge: self.parse_edge_properties(rel, object.get("edge"))?,
            connect,
            overwrite,
        })
    }

    /// Edge properties supplied on create/connect. Required edge fields must
    /// be present.
    fn parse_edge_properties(
        &self,
        rel: &RelationshipField,
        input: Option<&Value>,
    ) -> EngineResult<Properties> {
        let input = input.filter(|v| !v.is_null());
        let Some(schema) = self.registry.edge_schema_for(rel) else {
            if input.is_some() {
                return Err(EngineError::schema_validation(format!(
                    "relationship '{}' carries no edge properties",
                    rel.name
                )));
            }
            return Ok(Properties::new());
        };

        let mut properties = Properties::new();
        if let Some(input) = input {
            let object = as_object(input, || format!("edge of '{}'", rel.name))?;
            for (key, value) in object {
                let field = schema.field(key).ok_or_else(|| unknown_field(key, &schema.name))?;
                let coerced = self.coerce(&schema.name, field, value)?;
                if !coerced.is_null() {
                    properties.insert(key.clone(), coerced);
                }
            }
        }

        for field in schema.required_fields() {
            if !properties.contains_key(&field.name) {
                return Err(EngineError::field_validation(&schema.name, &field.name, format!(
                    "edge property '{}' of {} is required on '{}'",
                    field.name, schema.name, rel.name
                )));
            }
        }
        Ok(properties)
    }

    /// An update document; `None` updates nothing.
    pub fn parse_update(&self, entity: &EntityType, input: Option<&Value>) -> EngineResult<UpdateNode> {
        let mut update = UpdateNode {
            entity: entity.name.clone(),
            scalars: Vec::new(),
            relationships: Vec::new(),
        };
        let Some(input) = input.filter(|v| !v.is_null()) else {
            return Ok(update);
        };

        let object = as_object(input, || format!("{} update input", entity.name))?;
        for (key, value) in object {
            if let Some(field) = entity.field(key) {
                reject_generated(&entity.name, field)?;
                update.scalars.push(FieldUpdate {
                    field: field.clone(),
                    op: self.parse_scalar_op(&entity.name, field, value)?,
                });
            } else if let Some(rel) = entity.relationship(key) {
                let elements = items(rel, value, "update")?
                    .into_iter()
                    .map(|item| self.parse_update_element(rel, item))
                    .collect::<EngineResult<Vec<_>>>()?;
                update.relationships.push(RelationshipUpdate {
                    rel: rel.clone(),
                    elements,
                });
            } else {
                return Err(unknown_field(key, &entity.name));
            }
        }
        Ok(update)
    }

    fn parse_scalar_op(&self, owner: &str, field: &Field, input: &Value) -> EngineResult<ScalarOp> {
        let object = as_object(input, || format!("update of {}.{}", owner, field.name))?;
        let mut entries = object.iter();
        let (Some((op, operand)), None) = (entries.next(), entries.next()) else {
            return Err(EngineError::field_validation(owner, &field.name, format!(
                "update of {}.{} takes exactly one operation",
                owner, field.name
            )));
        };

        let invalid = |message: String| {
            EngineError::field_validation(owner, &field.name, format!("{}.{}: {}", owner, field.name, message))
        };
        match op.as_str() {
            "set" => Ok(ScalarOp::Set(self.coerce(owner, field, operand)?)),
            "add" | "subtract" | "multiply" | "divide" => {
                if field.list || !field.kind.is_numeric() {
                    return Err(invalid(format!("'{}' needs a numeric field", op)));
                }
                let operand = value::coerce_scalar(self.registry, &field.kind, operand).map_err(invalid)?;
                Ok(match op.as_str() {
                    "add" => ScalarOp::Add(operand),
                    "subtract" => ScalarOp::Subtract(operand),
                    "multiply" => ScalarOp::Multiply(operand),
                    _ => {
                        if operand.as_f64() == Some(0.0) {
                            return Err(invalid("division by zero".to_string()));
                        }
                        ScalarOp::Divide(operand)
                    }
                })
            }
            "push" => {
                if !field.list {
                    return Err(invalid("'push' needs a list field".to_string()));
                }
                let elements = match operand {
                    Value::Array(items) => items.iter().collect::<Vec<_>>(),
                    single => vec![single],
                };
                let coerced = elements
                    .into_iter()
                    .map(|item| value::coerce_scalar(self.registry, &field.kind, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(invalid)?;
                Ok(ScalarOp::Push(coerced))
            }
            "pop" => {
                if !field.list {
                    return Err(invalid("'pop' needs a list field".to_string()));
                }
                let count = operand
                    .as_u64()
                    .ok_or_else(|| invalid(format!("'pop' takes a non-negative Int, got {}", operand)))?;
                Ok(ScalarOp::Pop(count as usize))
            }
            other => Err(invalid(format!("unknown update operation '{}'", other))),
        }
    }

    fn parse_update_element(
        &self,
        rel: &RelationshipField,
        input: &Value,
    ) -> EngineResult<RelationshipUpdateElement> {
        let object = as_object(input, || format!("update of '{}'", rel.name))?;
        let target = self.registry.entity(&rel.target)?;

        let mut element = RelationshipUpdateElement {
            where_: None,
            update_node: None,
            update_edge: Vec::new(),
            connect: Vec::new(),
            disconnect: Vec::new(),
            create: Vec::new(),
            delete: Vec::new(),
        };

        for (key, value) in object {
            match key.as_str() {
                "where" => element.where_ = self.connection_where(rel, value)?,
                "update" => {
                    let update = as_object(value, || format!("update on '{}'", rel.name))?;
                    check_keys(update, &["node", "edge"], || format!("update on '{}'", rel.name))?;
                    if let Some(node) = update.get("node").filter(|v| !v.is_null()) {
                        element.update_node = Some(self.parse_update(target, Some(node))?);
                    }
                    if let Some(edge) = update.get("edge").filter(|v| !v.is_null()) {
                        element.update_edge = self.parse_edge_update(rel, edge)?;
                    }
                }
                "connect" => {
                    for item in items(rel, value, key)? {
                        element.connect.push(self.parse_connect(rel, item)?);
                    }
                }
                "disconnect" => {
                    for item in items(rel, value, key)? {
                        element.disconnect.push(self.parse_disconnect(rel, item)?);
                    }
                }
                "create" => {
                    for item in items(rel, value, key)? {
                        element.create.push(self.parse_nested_create(rel, target, item)?);
                    }
                }
                "delete" => {
                    for item in items(rel, value, key)? {
                        element.delete.push(self.parse_delete_item(rel, item)?);
                    }
                }
                other => return Err(unknown_operation(other, rel)),
            }
        }
        Ok(element)
    }

    fn parse_edge_update(&self, rel: &RelationshipField, input: &Value) -> EngineResult<Vec<FieldUpdate>> {
        let schema = self.registry.edge_schema_for(rel).ok_or_else(|| {
            EngineError::schema_validation(format!(
                "relationship '{}' carries no edge properties",
                rel.name
            ))
        })?;
        let object = as_object(input, || format!("edge update on '{}'", rel.name))?;
        object
            .iter()
            .map(|(key, value)| {
                let field = schema.field(key).ok_or_else(|| unknown_field(key, &schema.name))?;
                Ok(FieldUpdate {
                    field: field.clone(),
                    op: self.parse_scalar_op(&schema.name, field, value)?,
                })
            })
            .collect()
    }

    fn parse_disconnect(&self, rel: &RelationshipField, input: &Value) -> EngineResult<DisconnectInput> {
        let object = as_object(input, || format!("disconnect on '{}'", rel.name))?;
        check_keys(object, &["where", "disconnect"], || format!("disconnect on '{}'", rel.name))?;
        let target = self.registry.entity(&rel.target)?;

        let where_ = match object.get("where") {
            Some(value) => self.connection_where(rel, value)?,
            None => None,
        };

        let mut disconnect = Vec::new();
        if let Some(nested) = object.get("disconnect").filter(|v| !v.is_null()) {
            let nested = as_object(nested, || format!("nested disconnect on '{}'", rel.name))?;
            for (key, value) in nested {
                let nested_rel = self.registry.relationship(target, key)?;
                let items = items(nested_rel, value, "disconnect")?
                    .into_iter()
                    .map(|item| self.parse_disconnect(nested_rel, item))
                    .collect::<EngineResult<Vec<_>>>()?;
                disconnect.push(RelationshipDisconnect {
                    rel: nested_rel.clone(),
                    items,
                });
            }
        }
        Ok(DisconnectInput { where_, disconnect })
    }

    /// A delete cascade document; `None` deletes only the matched nodes.
    pub fn parse_delete(&self, entity: &EntityType, input: Option<&Value>) -> EngineResult<DeleteNode> {
        let mut delete = DeleteNode::default();
        let Some(input) = input.filter(|v| !v.is_null()) else {
            return Ok(delete);
        };
        let object = as_object(input, || format!("{} delete input", entity.name))?;
        for (key, value) in object {
            let rel = self.registry.relationship(entity, key)?;
            let items = items(rel, value, "delete")?
                .into_iter()
                .map(|item| self.parse_delete_item(rel, item))
                .collect::<EngineResult<Vec<_>>>()?;
            delete.relationships.push(RelationshipDelete {
                rel: rel.clone(),
                items,
            });
        }
        Ok(delete)
    }

    fn parse_delete_item(&self, rel: &RelationshipField, input: &Value) -> EngineResult<DeleteInput> {
        let object = as_object(input, || format!("delete on '{}'", rel.name))?;
        check_keys(object, &["where", "delete"], || format!("delete on '{}'", rel.name))?;
        let target = self.registry.entity(&rel.target)?;
        let where_ = match object.get("where") {
            Some(value) => self.connection_where(rel, value)?,
            None => None,
        };
        Ok(DeleteInput {
            where_,
            delete: self.parse_delete(target, object.get("delete"))?,
        })
    }

    fn connection_where(
        &self,
        rel: &RelationshipField,
        value: &Value,
    ) -> EngineResult<Option<ConnectionPredicate>> {
        if value.is_null() {
            return Ok(None);
        }
        self.filters.compile_connection(rel, Some(value)).map(Some)
    }

    fn coerce(&self, owner: &str, field: &Field, value: &Value) -> EngineResult<Value> {
        value::coerce(self.registry, field, value)
            .map_err(|e| EngineError::field_validation(owner, &field.name, format!("{}: {}", owner, e)))
    }
}

fn as_object<'v>(
    value: &'v Value,
    what: impl FnOnce() -> String,
) -> EngineResult<&'v Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| EngineError::schema_validation(format!("{} must be an object", what())))
}

fn check_keys(
    object: &Map<String, Value>,
    allowed: &[&str],
    what: impl FnOnce() -> String,
) -> EngineResult<()> {
    if let Some(key) = object.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(EngineError::schema_validation(format!(
            "unexpected key '{}' in {} (expected {})",
            key,
            what(),
            allowed.join(", ")
        )));
    }
    Ok(())
}

/// Inputs under a relationship key. "many" relationships take a list or a
/// single object; "one" relationships take a single object only.
fn items<'v>(rel: &RelationshipField, value: &'v Value, operation: &str) -> EngineResult<Vec<&'v Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(list) if rel.is_many() => Ok(list.iter().collect()),
        Value::Array(_) => Err(EngineError::schema_validation(format!(
            "'{}' on '{}' takes a single object, not a list",
            operation, rel.name
        ))),
        other => Ok(vec![other]),
    }
}

fn reject_generated(owner: &str, field: &Field) -> EngineResult<()> {
    if field.generated.is_some() {
        return Err(EngineError::field_validation(owner, &field.name, format!(
            "{}.{} is assigned by the engine and cannot be written",
            owner, field.name
        )));
    }
    Ok(())
}

fn unknown_field(key: &str, owner: &str) -> EngineError {
    EngineError::field_validation(owner, key, format!("unknown field '{}' on {}", key, owner))
}

fn unknown_operation(key: &str, rel: &RelationshipField) -> EngineError {
    EngineError::schema_validation(format!(
        "unknown operation '{}' on relationship '{}'",
        key, rel.name
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::enterprise_architecture().unwrap()
    }

    #[test]
    fn test_create_requires_required_fields() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let person = registry.entity("Person").unwrap();
        let err = parser
            .parse_create(person, &json!({"firstName": "Ada", "lastName": "Lovelace"}))
            .unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn test_generated_fields_are_not_writable() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let app = registry.entity("Application").unwrap();
        let err = parser
            .parse_create(app, &json!({"name": "CRM", "id": "fixed"}))
            .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_missing_required_edge_property() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let data_object = registry.entity("DataObject").unwrap();
        let input = json!({
            "name": "Customer",
            "relatedDataObjects": {
                "create": [{"node": {"name": "Invoice"}, "edge": {"description": "no name"}}]
            }
        });
        let err = parser.parse_create(data_object, &input).unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("DataObjectRelationship"));
    }

    #[test]
    fn test_one_relationship_rejects_list() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let app = registry.entity("Application").unwrap();
        let input = json!({
            "name": "CRM",
            "owner": {"connect": [{"where": {"node": {"email": {"eq": "a@b.c"}}}}]}
        });
        assert!(parser.parse_create(app, &input).unwrap_err().is_validation_error());

        let input = json!({
            "name": "CRM",
            "owner": {"connect": {"where": {"node": {"email": {"eq": "a@b.c"}}}}}
        });
        let parsed = parser.parse_create(app, &input).unwrap();
        assert_eq!(parsed.relationships[0].connect.len(), 1);
        assert!(parsed.relationships[0].connect[0].overwrite);
    }

    #[test]
    fn test_enum_values_are_checked() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let component = registry.entity("AIComponent").unwrap();
        let err = parser
            .parse_create(component, &json!({"name": "Scorer", "status": "ON_FIRE"}))
            .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_scalar_update_operations() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let app = registry.entity("Application").unwrap();

        let update = parser
            .parse_update(
                app,
                Some(&json!({"userCount": {"add": 5}, "tags": {"push": "core"}})),
            )
            .unwrap();
        assert_eq!(update.scalars.len(), 2);

        let err = parser
            .parse_update(app, Some(&json!({"costs": {"divide": 0}})))
            .unwrap_err();
        assert!(err.is_validation_error());

        let err = parser
            .parse_update(app, Some(&json!({"name": {"add": 1}})))
            .unwrap_err();
        assert!(err.is_validation_error());

        let err = parser
            .parse_update(app, Some(&json!({"name": {"set": "a", "add": 1}})))
            .unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_scalar_op_apply() {
        let registry = registry();
        let app = registry.entity("Application").unwrap();
        let user_count = app.field("userCount").unwrap();
        let tags = app.field("tags").unwrap();

        assert_eq!(
            ScalarOp::Add(json!(5)).apply(user_count, Some(&json!(10))).unwrap(),
            json!(15)
        );
        assert_eq!(
            ScalarOp::Divide(json!(4)).apply(user_count, Some(&json!(10))).unwrap(),
            json!(2)
        );
        let err = ScalarOp::Multiply(json!(2))
            .apply(user_count, Some(&json!(i64::MAX)))
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidOperation(_)));
        assert!(ScalarOp::Add(json!(1)).apply(user_count, None).is_err());

        assert_eq!(
            ScalarOp::Pop(2).apply(tags, Some(&json!(["a", "b", "c"]))).unwrap(),
            json!(["a"])
        );
        assert_eq!(
            ScalarOp::Push(vec![json!("x")]).apply(tags, None).unwrap(),
            json!(["x"])
        );
    }

    #[test]
    fn test_update_element_parts() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let app = registry.entity("Application").unwrap();
        let input = json!({
            "usesAIComponents": [{
                "where": {"node": {"name": {"eq": "Scorer"}}},
                "update": {"node": {"accuracy": {"set": 0.91}}},
                "disconnect": [{"where": {"node": {"status": {"eq": "RETIRED"}}}}],
                "delete": [{"where": {"node": {"name": {"eq": "Old"}}}}],
                "create": [{"node": {"name": "New"}}]
            }]
        });
        let update = parser.parse_update(app, Some(&input)).unwrap();
        let element = &update.relationships[0].elements[0];
        assert!(element.where_.is_some());
        assert!(element.has_update());
        assert_eq!(element.disconnect.len(), 1);
        assert_eq!(element.delete.len(), 1);
        assert_eq!(element.create.len(), 1);
    }

    #[test]
    fn test_delete_cascade_must_name_relationships() {
        let registry = registry();
        let parser = MutationParser::new(&registry, 32);
        let app = registry.entity("Application").unwrap();
        let err = parser
            .parse_delete(app, Some(&json!({"name": [{}]})))
            .unwrap_err();
        assert!(err.is_validation_error());

        let delete = parser
            .parse_delete(app, Some(&json!({"interfaces": [{"where": {"node": {"name": {"eq": "SOAP"}}}}]})))
            .unwrap();
        assert_eq!(delete.relationships.len(), 1);
    }
}
