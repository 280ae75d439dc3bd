//! Table-driven field validation.
//!
//! Each operation declares a table of [`FieldSpec`]s. Validation walks the
//! table over a raw JSON record: absent fields (missing, `null`, or a
//! blank string) take their default or report `missing value for <field>`;
//! present fields are coerced by their declared kind. All field errors for
//! one record are accumulated and returned together; unknown input fields
//! pass through into the normalized record unchanged.

use chrono::Utc;
use serde_json::{Map, Value};

use crate::errors::FieldError;
use crate::store::models::Status;

/// Raw and normalized record representation.
pub type RawRecord = Map<String, Value>;

/// Default page size for scroll queries.
pub const DEFAULT_COUNT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    AddSensorType,
    AddSensor,
    AddSensorData,
    FindSensorTypes,
    FindSensors,
    FindSensorData,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Str,
    Number,
    Integer,
    Range,
    Statuses,
}

#[derive(Debug, Clone, Copy)]
enum DefaultRule {
    /// No default: the field is required.
    Required,
    /// Explicit `null` marker (field is optional, callers check for it).
    Null,
    /// First index of a scroll query.
    Zero,
    /// [`DEFAULT_COUNT`].
    Count,
    /// Effectively-infinite timestamp ceiling: now + a large offset.
    FutureTimestamp,
    /// The `{ok}` status set.
    OkStatuses,
}

struct FieldSpec {
    name: &'static str,
    kind: Kind,
    default: DefaultRule,
}

const fn required(name: &'static str, kind: Kind) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        default: DefaultRule::Required,
    }
}

const fn optional(name: &'static str, kind: Kind, default: DefaultRule) -> FieldSpec {
    FieldSpec {
        name,
        kind,
        default,
    }
}

const ADD_SENSOR_TYPE: &[FieldSpec] = &[
    required("id", Kind::Str),
    required("manufacturer", Kind::Str),
    required("modelNumber", Kind::Str),
    required("quantity", Kind::Str),
    required("unit", Kind::Str),
    required("limits", Kind::Range),
];

const ADD_SENSOR: &[FieldSpec] = &[
    required("id", Kind::Str),
    required("model", Kind::Str),
    required("period", Kind::Integer),
    required("expected", Kind::Range),
];

const ADD_SENSOR_DATA: &[FieldSpec] = &[
    required("sensorId", Kind::Str),
    required("timestamp", Kind::Integer),
    required("value", Kind::Number),
];

const FIND_SENSOR_TYPES: &[FieldSpec] = &[
    optional("id", Kind::Str, DefaultRule::Null),
    optional("index", Kind::Integer, DefaultRule::Zero),
    optional("count", Kind::Integer, DefaultRule::Count),
];

const FIND_SENSORS: &[FieldSpec] = &[
    optional("id", Kind::Str, DefaultRule::Null),
    optional("index", Kind::Integer, DefaultRule::Zero),
    optional("count", Kind::Integer, DefaultRule::Count),
    optional("doDetail", Kind::Str, DefaultRule::Null),
];

const FIND_SENSOR_DATA: &[FieldSpec] = &[
    required("sensorId", Kind::Str),
    optional("timestamp", Kind::Integer, DefaultRule::FutureTimestamp),
    optional("count", Kind::Integer, DefaultRule::Count),
    optional("statuses", Kind::Statuses, DefaultRule::OkStatuses),
    optional("doDetail", Kind::Str, DefaultRule::Null),
];

/// Sub-schema for `range`-kind fields.
const RANGE: &[FieldSpec] = &[
    required("min", Kind::Number),
    required("max", Kind::Number),
];

impl Op {
    fn fields(self) -> &'static [FieldSpec] {
        match self {
            Op::AddSensorType => ADD_SENSOR_TYPE,
            Op::AddSensor => ADD_SENSOR,
            Op::AddSensorData => ADD_SENSOR_DATA,
            Op::FindSensorTypes => FIND_SENSOR_TYPES,
            Op::FindSensors => FIND_SENSORS,
            Op::FindSensorData => FIND_SENSOR_DATA,
        }
    }
}

/// Validate `info` against the field table for `op`.
///
/// On success returns the normalized record: declared fields coerced and
/// defaulted, unknown fields untouched. On failure returns every field
/// error at once; the record is all-or-nothing.
pub fn validate(op: Op, info: &RawRecord) -> Result<RawRecord, Vec<FieldError>> {
    let mut errors = Vec::new();
    let values = validate_fields(op.fields(), info, "", &mut errors);
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

fn validate_fields(
    specs: &[FieldSpec],
    info: &RawRecord,
    prefix: &str,
    errors: &mut Vec<FieldError>,
) -> RawRecord {
    let mut values = info.clone();
    for spec in specs {
        let qualified = if prefix.is_empty() {
            spec.name.to_owned()
        } else {
            format!("{prefix}.{}", spec.name)
        };
        match info.get(spec.name).filter(|v| !is_absent(v)) {
            None => match default_value(spec.default) {
                Some(v) => {
                    values.insert(spec.name.to_owned(), v);
                }
                None => {
                    errors.push(FieldError::new(
                        &qualified,
                        format!("missing value for {qualified}"),
                    ));
                    values.remove(spec.name);
                }
            },
            Some(value) => match coerce(spec.kind, &qualified, value, errors) {
                Some(v) => {
                    values.insert(spec.name.to_owned(), v);
                }
                None => {
                    values.remove(spec.name);
                }
            },
        }
    }
    values
}

/// A field is absent when missing from the record, JSON `null`, or a
/// blank/whitespace-only string.
fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn default_value(rule: DefaultRule) -> Option<Value> {
    match rule {
        DefaultRule::Required => None,
        DefaultRule::Null => Some(Value::Null),
        DefaultRule::Zero => Some(Value::from(0)),
        DefaultRule::Count => Some(Value::from(DEFAULT_COUNT)),
        DefaultRule::FutureTimestamp => {
            Some(Value::from(Utc::now().timestamp_millis() + 999_999_999))
        }
        DefaultRule::OkStatuses => Some(Value::from(vec![Status::Ok.to_string()])),
    }
}

/// Coerce a present value per its declared kind; `None` means the value
/// was rejected and errors were recorded.
fn coerce(kind: Kind, name: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<Value> {
    match kind {
        Kind::Str => coerce_string(name, value, errors),
        Kind::Number => coerce_number(name, value, errors),
        Kind::Integer => coerce_integer(name, value, errors),
        Kind::Range => coerce_range(name, value, errors),
        Kind::Statuses => coerce_statuses(name, value, errors),
    }
}

fn coerce_string(name: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        other => {
            errors.push(FieldError::new(
                name,
                format!("require type String for {name} value {other}"),
            ));
            None
        }
    }
}

fn coerce_number(name: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            if is_number_literal(s) {
                if let Ok(n) = s.parse::<f64>() {
                    return Some(Value::from(n));
                }
            }
            errors.push(FieldError::new(
                name,
                format!("value {s} for {name} is not a number"),
            ));
            None
        }
        other => {
            errors.push(FieldError::new(
                name,
                format!("require type Number or String for {name} value {other}"),
            ));
            None
        }
    }
}

fn coerce_integer(name: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<Value> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::from(i))
            } else if let Some(f) = n.as_f64().filter(|f| f.fract() == 0.0) {
                Some(Value::from(f as i64))
            } else {
                errors.push(FieldError::new(
                    name,
                    format!("value {n} for {name} is not an integer"),
                ));
                None
            }
        }
        Value::String(s) => {
            if is_integer_literal(s) {
                if let Ok(i) = s.parse::<i64>() {
                    return Some(Value::from(i));
                }
            }
            errors.push(FieldError::new(
                name,
                format!("value {s} for {name} is not an integer"),
            ));
            None
        }
        other => {
            errors.push(FieldError::new(
                name,
                format!("require type Number or String for {name} value {other}"),
            ));
            None
        }
    }
}

fn coerce_range(name: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<Value> {
    match value {
        Value::Object(map) => {
            let before = errors.len();
            let nested = validate_fields(RANGE, map, name, errors);
            if errors.len() == before {
                Some(Value::Object(nested))
            } else {
                None
            }
        }
        other => {
            errors.push(FieldError::new(
                name,
                format!("require type Object for {name} value {other}"),
            ));
            None
        }
    }
}

fn coerce_statuses(name: &str, value: &Value, errors: &mut Vec<FieldError>) -> Option<Value> {
    let Value::String(s) = value else {
        errors.push(FieldError::new(
            name,
            format!("require type String for {name} value {value}"),
        ));
        return None;
    };
    if s == "all" {
        let all: Vec<String> = Status::ALL.iter().map(|s| s.to_string()).collect();
        return Some(Value::from(all));
    }
    let tokens: Vec<&str> = s.split('|').collect();
    let bad: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| t.parse::<Status>().is_err())
        .collect();
    if !bad.is_empty() {
        errors.push(FieldError::new(
            name,
            format!("invalid status {} in status {s}", bad.join(",")),
        ));
        return None;
    }
    let mut statuses: Vec<String> = Vec::new();
    for token in tokens {
        if !statuses.iter().any(|t| t == token) {
            statuses.push(token.to_owned());
        }
    }
    Some(Value::from(statuses))
}

/// Strict integer literal: optional sign, then digits.
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Strict numeric literal: optional sign, digits, optional `.digits`
/// fraction, optional `[eE][+-]?digits` exponent. Rejects `inf`, `nan`,
/// and bare fractions like `.5`.
fn is_number_literal(s: &str) -> bool {
    let s = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match s.split_once(['e', 'E']) {
        Some((m, e)) => (m, Some(e)),
        None => (s, None),
    };
    let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => is_digits(int) && is_digits(frac),
        None => is_digits(mantissa),
    };
    let exponent_ok = exponent.is_none_or(|e| is_digits(e.strip_prefix(['+', '-']).unwrap_or(e)));
    mantissa_ok && exponent_ok
}
