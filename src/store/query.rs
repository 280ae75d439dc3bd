//! Filter / sort / paginate over a collection snapshot.
//!
//! Every query is a pure function of its inputs; the resume cursor
//! (`nextIndex`) is computed per call, never held on the store.

use serde::Serialize;
use serde_json::Value;

use crate::store::models::Keyed;
use crate::validate::RawRecord;

/// Meta parameters of a scroll query; never treated as content filters.
const META_FIELDS: &[&str] = &["id", "index", "count", "doDetail"];

/// One page of a scroll query. `next_index` is where the next call should
/// resume; callers detect exhaustion by an empty or short page.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    #[serde(rename = "nextIndex")]
    pub next_index: i64,
    #[serde(rename = "previousIndex", skip_serializing_if = "Option::is_none")]
    pub previous_index: Option<i64>,
}

impl<T> Page<T> {
    /// Envelope for the single-record fast path: no scrolling.
    pub fn single(item: T) -> Self {
        Page {
            data: vec![item],
            next_index: -1,
            previous_index: None,
        }
    }
}

/// Equality filters from a normalized search spec: every supplied
/// non-meta, non-null field.
pub fn content_filters(spec: &RawRecord) -> RawRecord {
    spec.iter()
        .filter(|(k, v)| !META_FIELDS.contains(&k.as_str()) && !v.is_null())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Offset/count of a normalized scroll spec, clamped to usable values.
pub fn page_params(spec: &RawRecord) -> (usize, usize) {
    let index = spec.get("index").and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    let count = spec.get("count").and_then(Value::as_i64).unwrap_or(0).max(0) as usize;
    (index, count)
}

/// Filter `items` by `filters`, sort ascending by case-insensitive id,
/// and return the slice `[index, index + count)`.
pub fn find_page<'a, T, I>(items: I, filters: &RawRecord, index: usize, count: usize) -> Page<T>
where
    T: Keyed + Serialize + Clone + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut matched: Vec<&T> = items.filter(|item| matches(item, filters)).collect();
    matched.sort_by(|a, b| {
        a.id()
            .to_uppercase()
            .cmp(&b.id().to_uppercase())
            .then_with(|| a.id().cmp(b.id()))
    });
    let data: Vec<T> = matched.into_iter().skip(index).take(count).cloned().collect();
    Page {
        next_index: (index + data.len()) as i64,
        previous_index: (index > 0).then(|| index.saturating_sub(count) as i64),
        data,
    }
}

fn matches<T: Serialize>(item: &T, filters: &RawRecord) -> bool {
    if filters.is_empty() {
        return true;
    }
    let entity = serde_json::to_value(item).unwrap_or_default();
    let Some(fields) = entity.as_object() else {
        return false;
    };
    filters
        .iter()
        .all(|(name, wanted)| fields.get(name).is_some_and(|found| value_eq(found, wanted)))
}

/// Loose equality: exact JSON equality, or numeric equality when one side
/// is a string (query parameters always arrive as strings).
fn value_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
