//! Scalar values as they flow through the engine.
//!
//! Properties are plain `serde_json` maps. Every value written to the store
//! passes through [`coerce`], which checks it against the field's kind and
//! normalises temporal values so stored strings compare consistently.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

use crate::schema::{Field, ScalarKind, SchemaRegistry};

pub type Properties = serde_json::Map<String, Value>;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current time in the canonical DateTime representation.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Check a field value against the schema and return its canonical form.
///
/// `null` is accepted only for nullable fields. List fields take arrays whose
/// elements are checked individually.
pub fn coerce(registry: &SchemaRegistry, field: &Field, value: &Value) -> Result<Value, String> {
    if value.is_null() {
        return if field.nullable {
            Ok(Value::Null)
        } else {
            Err(format!("field '{}' cannot be null", field.name))
        };
    }

    if field.list {
        let items = value
            .as_array()
            .ok_or_else(|| format!("field '{}' expects a list", field.name))?;
        return items
            .iter()
            .map(|item| coerce_scalar(registry, &field.kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
            .map_err(|e| format!("field '{}': {}", field.name, e));
    }

    coerce_scalar(registry, &field.kind, value).map_err(|e| format!("field '{}': {}", field.name, e))
}

/// Check a single (non-list) value against a kind.
pub fn coerce_scalar(
    registry: &SchemaRegistry,
    kind: &ScalarKind,
    value: &Value,
) -> Result<Value, String> {
    match kind {
        ScalarKind::Id | ScalarKind::String => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(format!("expected {} but got {}", kind.graphql_name(), value)),
        },
        ScalarKind::Int => value
            .as_i64()
            .map(Value::from)
            .ok_or_else(|| format!("expected Int but got {}", value)),
        ScalarKind::Float => match value.as_f64() {
            Some(f) if f.is_finite() => Ok(value.clone()),
            _ => Err(format!("expected Float but got {}", value)),
        },
        ScalarKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(format!("expected Boolean but got {}", value)),
        },
        ScalarKind::Date => {
            let raw = value
                .as_str()
                .ok_or_else(|| format!("expected Date but got {}", value))?;
            let date = NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| format!("'{}' is not a Date (YYYY-MM-DD)", raw))?;
            Ok(Value::String(date.format(DATE_FORMAT).to_string()))
        }
        ScalarKind::DateTime => {
            let raw = value
                .as_str()
                .ok_or_else(|| format!("expected DateTime but got {}", value))?;
            let parsed = DateTime::parse_from_rfc3339(raw)
                .map_err(|_| format!("'{}' is not an RFC 3339 DateTime", raw))?;
            Ok(Value::String(
                parsed
                    .with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ))
        }
        ScalarKind::Enum(name) => {
            let raw = value
                .as_str()
                .ok_or_else(|| format!("expected {} value but got {}", name, value))?;
            let enum_type = registry
                .enum_type(name)
                .ok_or_else(|| format!("unknown enum '{}'", name))?;
            if enum_type.contains(raw) {
                Ok(value.clone())
            } else {
                Err(format!(
                    "'{}' is not a value of {} (expected one of {})",
                    raw,
                    name,
                    enum_type.values.join(", ")
                ))
            }
        }
    }
}

/// Compare two non-null values of the same kind.
///
/// Returns `None` when either side is null or the values are not comparable.
pub fn compare(kind: &ScalarKind, a: &Value, b: &Value) -> Option<Ordering> {
    match kind {
        ScalarKind::Int | ScalarKind::Float => compare_numbers(a, b),
        ScalarKind::Boolean => Some(a.as_bool()?.cmp(&b.as_bool()?)),
        ScalarKind::Date => {
            let a = NaiveDate::parse_from_str(a.as_str()?, DATE_FORMAT).ok()?;
            let b = NaiveDate::parse_from_str(b.as_str()?, DATE_FORMAT).ok()?;
            Some(a.cmp(&b))
        }
        ScalarKind::DateTime => {
            let a = DateTime::parse_from_rfc3339(a.as_str()?).ok()?;
            let b = DateTime::parse_from_rfc3339(b.as_str()?).ok()?;
            Some(a.cmp(&b))
        }
        ScalarKind::Id | ScalarKind::String | ScalarKind::Enum(_) => {
            Some(a.as_str()?.cmp(b.as_str()?))
        }
    }
}

pub fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => Some(a.cmp(&b)),
        _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
    }
}

/// Total order used for sorting: nulls and absent values sort after
/// everything else.
pub fn sort_order(kind: &ScalarKind, a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare(kind, a, b).unwrap_or(Ordering::Equal),
    }
}

/// Equality under the kind's comparison, so `2` equals `2.0` on Float fields
/// and DateTimes in different offsets compare by instant.
pub fn values_equal(kind: &ScalarKind, a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    compare(kind, a, b) == Some(Ordering::Equal)
}

/// Length in characters, used by string aggregates.
pub fn text_length(value: &Value) -> Option<usize> {
    value.as_str().map(|s| s.chars().count())
}
