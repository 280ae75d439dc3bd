//! Response envelopes: query results decorated with `self`/`next`/`prev`
//! hyperlinks. Links are path-relative, derived from the request URI.

use axum::http::Uri;
use serde::Serialize;
use serde_json::Value;

use crate::store::models::Keyed;
use crate::store::query::Page;
use crate::store::ReadingsPage;

/// A scroll-query result with pagination links.
#[derive(Debug, Serialize)]
pub struct ScrollEnvelope {
    pub data: Vec<Value>,
    #[serde(rename = "nextIndex")]
    pub next_index: i64,
    #[serde(rename = "previousIndex", skip_serializing_if = "Option::is_none")]
    pub previous_index: Option<i64>,
    #[serde(rename = "self")]
    pub self_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

impl ScrollEnvelope {
    /// Envelope for a collection route: each item links to `<path>/<id>`.
    pub fn for_list<T: Serialize + Keyed>(
        uri: &Uri,
        page: Page<T>,
    ) -> Result<Self, serde_json::Error> {
        Self::build(uri, page, true)
    }

    /// Envelope for a single-record route: the item's link is the
    /// request path itself.
    pub fn for_item<T: Serialize + Keyed>(
        uri: &Uri,
        page: Page<T>,
    ) -> Result<Self, serde_json::Error> {
        Self::build(uri, page, false)
    }

    fn build<T: Serialize + Keyed>(
        uri: &Uri,
        page: Page<T>,
        append_id: bool,
    ) -> Result<Self, serde_json::Error> {
        let next = (page.next_index >= 0 && !page.data.is_empty())
            .then(|| with_index(uri, page.next_index));
        let prev = page.previous_index.map(|i| with_index(uri, i));
        let data = page
            .data
            .into_iter()
            .map(|item| {
                let link = if append_id {
                    format!("{}/{}", uri.path().trim_end_matches('/'), item.id())
                } else {
                    uri.path().to_owned()
                };
                linked(&item, link)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            data,
            next_index: page.next_index,
            previous_index: page.previous_index,
            self_url: request_url(uri),
            next,
            prev,
        })
    }
}

/// A readings result; items link to `<path>/<timestamp>` on the scroll
/// route.
#[derive(Debug, Serialize)]
pub struct ReadingsEnvelope {
    pub data: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor: Option<Value>,
    #[serde(rename = "sensorType", skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<Value>,
    #[serde(rename = "self")]
    pub self_url: String,
}

impl ReadingsEnvelope {
    pub fn new(
        uri: &Uri,
        page: ReadingsPage,
        append_timestamp: bool,
    ) -> Result<Self, serde_json::Error> {
        let data = page
            .data
            .into_iter()
            .map(|reading| {
                let link = if append_timestamp {
                    format!("{}/{}", uri.path().trim_end_matches('/'), reading.timestamp)
                } else {
                    uri.path().to_owned()
                };
                linked(&reading, link)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            data,
            sensor: page.sensor.map(serde_json::to_value).transpose()?,
            sensor_type: page.sensor_type.map(serde_json::to_value).transpose()?,
            self_url: request_url(uri),
        })
    }
}

/// Serialize `item` and attach its `self` link.
fn linked<T: Serialize>(item: &T, link: String) -> Result<Value, serde_json::Error> {
    let mut value = serde_json::to_value(item)?;
    if let Some(fields) = value.as_object_mut() {
        fields.insert("self".to_owned(), Value::String(link));
    }
    Ok(value)
}

/// Path plus query of the incoming request.
fn request_url(uri: &Uri) -> String {
    match uri.query() {
        Some(q) => format!("{}?{q}", uri.path()),
        None => uri.path().to_owned(),
    }
}

/// The request URL with its `index` parameter replaced.
fn with_index(uri: &Uri, index: i64) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("index="))
        .map(str::to_owned)
        .collect();
    pairs.push(format!("index={index}"));
    format!("{}?{}", uri.path(), pairs.join("&"))
}
