//! Predicate evaluation against a graph transaction.
//!
//! Scalar comparisons are pure. Relationship, connection and aggregate
//! predicates first materialise the related edge/node set through the
//! transaction, then quantify or aggregate over it.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use super::aggregate::AggregateFunction;
use super::filter::{
    AggregateComparison, AggregatePredicate, Comparison, ConnectionPredicate, FieldRef, Predicate,
    Quantifier,
};
use crate::errors::EngineResult;
use crate::schema::ScalarKind;
use crate::store::{neighbours, EdgeRecord, GraphTransaction, NodeRecord};
use crate::value::{self, Properties};

pub struct PredicateEvaluator<'a> {
    tx: &'a dyn GraphTransaction,
}

impl<'a> PredicateEvaluator<'a> {
    pub fn new(tx: &'a dyn GraphTransaction) -> Self {
        Self { tx }
    }

    /// All nodes of `label` matching `predicate`, in id order.
    pub async fn filter_nodes(&self, label: &str, predicate: &Predicate) -> EngineResult<Vec<NodeRecord>> {
        let candidates = self.tx.nodes_by_label(label).await?;
        let mut matched = Vec::new();
        for node in candidates {
            if self.matches(&node, predicate).await? {
                matched.push(node);
            }
        }
        Ok(matched)
    }

    /// Edge/node pairs of `rel` from `node_id` matching a connection predicate.
    pub async fn filter_connection(
        &self,
        node_id: &str,
        rel: &crate::schema::RelationshipField,
        predicate: &ConnectionPredicate,
    ) -> EngineResult<Vec<(EdgeRecord, NodeRecord)>> {
        let pairs = neighbours(self.tx, node_id, rel).await?;
        let mut matched = Vec::new();
        for (edge, node) in pairs {
            if self.matches_connection(&edge, &node, predicate).await? {
                matched.push((edge, node));
            }
        }
        Ok(matched)
    }

    pub fn matches<'b>(
        &'b self,
        node: &'b NodeRecord,
        predicate: &'b Predicate,
    ) -> BoxFuture<'b, EngineResult<bool>> {
        async move {
            match predicate {
                Predicate::And(parts) => {
                    for part in parts {
                        if !self.matches(node, part).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                Predicate::Or(parts) => {
                    for part in parts {
                        if self.matches(node, part).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Predicate::Not(inner) => Ok(!self.matches(node, inner).await?),
                Predicate::Field { field, comparison } => {
                    Ok(compare_field(&node.properties, field, comparison))
                }
                Predicate::Relationship {
                    rel,
                    quantifier,
                    inner,
                } => {
                    let pairs = neighbours(self.tx, &node.id, rel).await?;
                    let mut outcomes = Vec::with_capacity(pairs.len());
                    for (_, related) in &pairs {
                        outcomes.push(self.matches(related, inner).await?);
                    }
                    Ok(quantify(*quantifier, &outcomes))
                }
                Predicate::Related { rel, inner } => {
                    let pairs = neighbours(self.tx, &node.id, rel).await?;
                    match inner {
                        None => Ok(pairs.is_empty()),
                        Some(inner) => {
                            for (_, related) in &pairs {
                                if self.matches(related, inner).await? {
                                    return Ok(true);
                                }
                            }
                            Ok(false)
                        }
                    }
                }
                Predicate::Connection {
                    rel,
                    quantifier,
                    inner,
                } => {
                    let pairs = neighbours(self.tx, &node.id, rel).await?;
                    let mut outcomes = Vec::with_capacity(pairs.len());
                    for (edge, related) in &pairs {
                        outcomes.push(self.matches_connection(edge, related, inner).await?);
                    }
                    Ok(quantify(*quantifier, &outcomes))
                }
                Predicate::Aggregate { rel, inner } => {
                    let pairs = neighbours(self.tx, &node.id, rel).await?;
                    Ok(evaluate_aggregate(&pairs, inner))
                }
            }
        }
        .boxed()
    }

    pub fn matches_connection<'b>(
        &'b self,
        edge: &'b EdgeRecord,
        node: &'b NodeRecord,
        predicate: &'b ConnectionPredicate,
    ) -> BoxFuture<'b, EngineResult<bool>> {
        async move {
            match predicate {
                ConnectionPredicate::And(parts) => {
                    for part in parts {
                        if !self.matches_connection(edge, node, part).await? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                ConnectionPredicate::Or(parts) => {
                    for part in parts {
                        if self.matches_connection(edge, node, part).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                ConnectionPredicate::Not(inner) => {
                    Ok(!self.matches_connection(edge, node, inner).await?)
                }
                ConnectionPredicate::Node(inner) => self.matches(node, inner).await,
                ConnectionPredicate::Edge(inner) => Ok(matches_properties(&edge.properties, inner)),
            }
        }
        .boxed()
    }
}

/// Evaluate a predicate made of scalar comparisons over a property map.
/// Relationship predicates never match here; edge scopes cannot hold them.
pub fn matches_properties(properties: &Properties, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::And(parts) => parts.iter().all(|p| matches_properties(properties, p)),
        Predicate::Or(parts) => parts.iter().any(|p| matches_properties(properties, p)),
        Predicate::Not(inner) => !matches_properties(properties, inner),
        Predicate::Field { field, comparison } => compare_field(properties, field, comparison),
        _ => false,
    }
}

fn quantify(quantifier: Quantifier, outcomes: &[bool]) -> bool {
    let matched = outcomes.iter().filter(|m| **m).count();
    match quantifier {
        Quantifier::All => matched == outcomes.len(),
        Quantifier::None => matched == 0,
        Quantifier::Single => matched == 1,
        Quantifier::Some => matched > 0,
    }
}

fn compare_field(properties: &Properties, field: &FieldRef, comparison: &Comparison) -> bool {
    let actual = properties.get(&field.name).filter(|v| !v.is_null());

    match comparison {
        Comparison::Eq(Value::Null) => actual.is_none(),
        Comparison::Eq(expected) => actual.is_some_and(|v| equal(field, v, expected)),
        Comparison::In(options) => options.iter().any(|option| match actual {
            None => option.is_null(),
            Some(v) => !option.is_null() && equal(field, v, option),
        }),
        Comparison::Ordered(op, expected) => actual
            .and_then(|v| value::compare(&field.kind, v, expected))
            .is_some_and(|ordering| op.accepts(ordering)),
        Comparison::Contains(text) => text_of(actual).is_some_and(|s| s.contains(text.as_str())),
        Comparison::StartsWith(text) => text_of(actual).is_some_and(|s| s.starts_with(text.as_str())),
        Comparison::EndsWith(text) => text_of(actual).is_some_and(|s| s.ends_with(text.as_str())),
        Comparison::Includes(expected) => actual
            .and_then(|v| v.as_array())
            .is_some_and(|items| items.iter().any(|item| value::values_equal(&field.kind, item, expected))),
    }
}

fn equal(field: &FieldRef, actual: &Value, expected: &Value) -> bool {
    if field.list {
        match (actual.as_array(), expected.as_array()) {
            (Some(a), Some(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|(x, y)| value::values_equal(&field.kind, x, y))
            }
            _ => false,
        }
    } else {
        value::values_equal(&field.kind, actual, expected)
    }
}

fn text_of(value: Option<&Value>) -> Option<&str> {
    value.and_then(|v| v.as_str())
}

fn evaluate_aggregate(pairs: &[(EdgeRecord, NodeRecord)], predicate: &AggregatePredicate) -> bool {
    match predicate {
        AggregatePredicate::And(parts) => parts.iter().all(|p| evaluate_aggregate(pairs, p)),
        AggregatePredicate::Or(parts) => parts.iter().any(|p| evaluate_aggregate(pairs, p)),
        AggregatePredicate::Not(inner) => !evaluate_aggregate(pairs, inner),
        AggregatePredicate::Count(op, expected) => {
            op.accepts((pairs.len() as i64).cmp(expected))
        }
        AggregatePredicate::Node(comparison) => {
            let values: Vec<&Value> = pairs
                .iter()
                .filter_map(|(_, node)| node.get(&comparison.field.name))
                .filter(|v| !v.is_null())
                .collect();
            aggregate_matches(comparison, &values)
        }
        AggregatePredicate::Edge(comparison) => {
            let values: Vec<&Value> = pairs
                .iter()
                .filter_map(|(edge, _)| edge.get(&comparison.field.name))
                .filter(|v| !v.is_null())
                .collect();
            aggregate_matches(comparison, &values)
        }
    }
}

fn aggregate_matches(comparison: &AggregateComparison, values: &[&Value]) -> bool {
    let result = comparison.function.apply(&comparison.field.kind, values);
    if result.is_null() {
        return false;
    }
    let kind = if comparison.function.preserves_kind() {
        comparison.field.kind.clone()
    } else {
        ScalarKind::Float
    };
    let ordering = match comparison.function {
        AggregateFunction::Min | AggregateFunction::Max => {
            value::compare(&kind, &result, &comparison.value)
        }
        _ => value::compare_numbers(&result, &comparison.value),
    };
    ordering.is_some_and(|o| comparison.op.accepts(o))
}
