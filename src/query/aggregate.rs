//! Aggregation engine.
//!
//! Aggregates are computed over the non-null values of one field across a
//! row set. Rows arrive in id order, which makes string tie-breaks
//! deterministic: among equally long strings the first one wins.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::errors::{EngineError, EngineResult};
use crate::schema::{Field, ScalarKind};
use crate::value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Min,
    Max,
    Sum,
    Average,
    LongestLength,
    ShortestLength,
    AverageLength,
}

impl AggregateFunction {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "min" => Some(AggregateFunction::Min),
            "max" => Some(AggregateFunction::Max),
            "sum" => Some(AggregateFunction::Sum),
            "average" => Some(AggregateFunction::Average),
            "longestLength" => Some(AggregateFunction::LongestLength),
            "shortestLength" => Some(AggregateFunction::ShortestLength),
            "averageLength" => Some(AggregateFunction::AverageLength),
            _ => None,
        }
    }

    pub fn applies_to(&self, kind: &ScalarKind) -> bool {
        match self {
            AggregateFunction::Min | AggregateFunction::Max => {
                kind.is_numeric() || kind.is_temporal()
            }
            AggregateFunction::Sum | AggregateFunction::Average => kind.is_numeric(),
            AggregateFunction::LongestLength
            | AggregateFunction::ShortestLength
            | AggregateFunction::AverageLength => kind.is_textual(),
        }
    }

    /// Whether the result has the field's own kind (min/max) rather than
    /// being a plain number.
    pub fn preserves_kind(&self) -> bool {
        matches!(self, AggregateFunction::Min | AggregateFunction::Max)
    }

    /// Apply to the non-null values of a field. Empty input yields `null`.
    pub fn apply(&self, kind: &ScalarKind, values: &[&Value]) -> Value {
        match self {
            AggregateFunction::Min => extreme(kind, values, std::cmp::Ordering::Less),
            AggregateFunction::Max => extreme(kind, values, std::cmp::Ordering::Greater),
            AggregateFunction::Sum => sum(kind, values),
            AggregateFunction::Average => average(values),
            AggregateFunction::LongestLength => lengths(values).max().map_or(Value::Null, Value::from),
            AggregateFunction::ShortestLength => lengths(values).min().map_or(Value::Null, Value::from),
            AggregateFunction::AverageLength => {
                let lengths: Vec<usize> = lengths(values).collect();
                if lengths.is_empty() {
                    Value::Null
                } else {
                    json!(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64)
                }
            }
        }
    }
}

fn extreme(kind: &ScalarKind, values: &[&Value], wanted: std::cmp::Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for candidate in values {
        best = match best {
            Some(current) if value::compare(kind, candidate, current) != Some(wanted) => Some(current),
            _ => Some(*candidate),
        };
    }
    best.cloned().unwrap_or(Value::Null)
}

fn sum(kind: &ScalarKind, values: &[&Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    if *kind == ScalarKind::Int {
        let total: Option<i64> = values
            .iter()
            .try_fold(0i64, |acc, v| v.as_i64().and_then(|n| acc.checked_add(n)));
        if let Some(total) = total {
            return Value::from(total);
        }
    }
    json!(values.iter().filter_map(|v| v.as_f64()).sum::<f64>())
}

fn average(values: &[&Value]) -> Value {
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    if numbers.is_empty() {
        return Value::Null;
    }
    json!(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

fn lengths<'v>(values: &'v [&'v Value]) -> impl Iterator<Item = usize> + 'v {
    values.iter().filter_map(|v| value::text_length(v))
}

/// Longest or shortest string; ties keep the first value seen.
fn pick_by_length(values: &[&Value], longest: bool) -> Value {
    let mut best: Option<(&Value, usize)> = None;
    for candidate in values {
        let Some(len) = value::text_length(candidate) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((_, best_len)) if longest => len > best_len,
            Some((_, best_len)) => len < best_len,
        };
        if better {
            best = Some((*candidate, len));
        }
    }
    best.map_or(Value::Null, |(v, _)| v.clone())
}

/// Everything the aggregate output reports for one field, or `None` when
/// the field kind has no aggregates.
///
/// - numeric: `{min, max, sum, average}`
/// - String/ID: `{longest, shortest}`
/// - Date/DateTime: `{min, max}`
pub fn field_summary(kind: &ScalarKind, values: &[&Value]) -> Option<Value> {
    if kind.is_numeric() {
        Some(json!({
            "min": AggregateFunction::Min.apply(kind, values),
            "max": AggregateFunction::Max.apply(kind, values),
            "sum": AggregateFunction::Sum.apply(kind, values),
            "average": AggregateFunction::Average.apply(kind, values),
        }))
    } else if kind.is_textual() {
        Some(json!({
            "longest": pick_by_length(values, true),
            "shortest": pick_by_length(values, false),
        }))
    } else if kind.is_temporal() {
        Some(json!({
            "min": AggregateFunction::Min.apply(kind, values),
            "max": AggregateFunction::Max.apply(kind, values),
        }))
    } else {
        None
    }
}

pub fn is_aggregatable(field: &Field) -> bool {
    !field.list && (field.kind.is_numeric() || field.kind.is_textual() || field.kind.is_temporal())
}

/// Summaries for the selected fields (or every aggregatable field when no
/// selection is given) over a row set.
pub fn summarize<'r, F>(
    owner: &str,
    fields: &[Field],
    selection: Option<&[String]>,
    rows: &'r [F],
    get: impl Fn(&'r F, &str) -> Option<&'r Value>,
) -> EngineResult<Map<String, Value>> {
    let selected: Vec<&Field> = match selection {
        None => fields.iter().filter(|f| is_aggregatable(f)).collect(),
        Some(names) => names
            .iter()
            .map(|name| {
                let field = fields.iter().find(|f| &f.name == name).ok_or_else(|| {
                    EngineError::schema_validation(format!(
                        "unknown aggregate field '{}' on {}",
                        name, owner
                    ))
                })?;
                if is_aggregatable(field) {
                    Ok(field)
                } else {
                    Err(EngineError::schema_validation(format!(
                        "{}.{} cannot be aggregated",
                        owner, name
                    )))
                }
            })
            .collect::<EngineResult<_>>()?,
    };

    let mut summary = Map::new();
    for field in selected {
        let values: Vec<&Value> = rows
            .iter()
            .filter_map(|row| get(row, &field.name))
            .filter(|v| !v.is_null())
            .collect();
        if let Some(result) = field_summary(&field.kind, &values) {
            summary.insert(field.name.clone(), result);
        }
    }
    Ok(summary)
}

/// `{count, node, edge?}` as returned by aggregate queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub count: usize,
    pub node: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<Map<String, Value>>,
}

/// Which fields to aggregate. `None` selects every aggregatable field.
#[derive(Debug, Clone, Default)]
pub struct AggregateSelection {
    pub node: Option<Vec<String>>,
    pub edge: Option<Vec<String>>,
}
