pub mod models;
pub mod query;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::errors::{CatalogError, EntityKind, Result};
use crate::validate::{validate, Op, RawRecord};
use models::{Keyed, Reading, Sensor, SensorType, Status};
use query::{content_filters, find_page, page_params, Page};

/// A sensor in a query result, optionally carrying a copy of its
/// sensor-type when the caller asked for detail.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorItem {
    #[serde(flatten)]
    pub sensor: Sensor,
    #[serde(rename = "sensorType", skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<SensorType>,
}

impl Keyed for SensorItem {
    fn id(&self) -> &str {
        &self.sensor.id
    }
}

/// Result envelope for a readings query. `sensor` and `sensor_type` are
/// copies attached only on detail queries, and only when known.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadingsPage {
    pub data: Vec<Reading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor: Option<Sensor>,
    #[serde(rename = "sensorType", skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<SensorType>,
}

#[derive(Default)]
struct Collections {
    sensor_types: HashMap<String, SensorType>,
    sensors: HashMap<String, Sensor>,
    /// Reading sequences keyed by sensor id, in insertion order.
    readings: HashMap<String, Vec<Reading>>,
}

/// In-memory sensor catalog.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock`: writes replace whole entities under the
/// write lock, so readers see either the pre- or post-write record, never
/// a torn one.
#[derive(Clone, Default)]
pub struct SensorStore {
    inner: Arc<RwLock<Collections>>,
}

impl SensorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored entity.
    pub async fn clear(&self) {
        let mut cols = self.inner.write().await;
        cols.sensor_types.clear();
        cols.sensors.clear();
        cols.readings.clear();
    }

    /// Add or wholly replace the sensor-type described by `info`.
    pub async fn add_sensor_type(&self, info: &RawRecord) -> Result<()> {
        let normalized = validate(Op::AddSensorType, info).map_err(CatalogError::Validation)?;
        let sensor_type: SensorType = serde_json::from_value(Value::Object(normalized))?;
        debug!(id = %sensor_type.id, "upsert sensor-type");
        self.inner
            .write()
            .await
            .sensor_types
            .insert(sensor_type.id.clone(), sensor_type);
        Ok(())
    }

    /// Add or wholly replace the sensor described by `info`. `model` is
    /// not required to name a known sensor-type.
    pub async fn add_sensor(&self, info: &RawRecord) -> Result<()> {
        let normalized = validate(Op::AddSensor, info).map_err(CatalogError::Validation)?;
        let sensor: Sensor = serde_json::from_value(Value::Object(normalized))?;
        debug!(id = %sensor.id, model = %sensor.model, "upsert sensor");
        self.inner
            .write()
            .await
            .sensors
            .insert(sensor.id.clone(), sensor);
        Ok(())
    }

    /// Add a reading for `info.sensorId`, replacing any earlier reading
    /// with the same timestamp. The status is classified at write time
    /// when the sensor and its type are both known; otherwise the reading
    /// is stored without one.
    pub async fn add_sensor_data(&self, info: &RawRecord) -> Result<()> {
        let mut normalized = validate(Op::AddSensorData, info).map_err(CatalogError::Validation)?;
        let Some(Value::String(sensor_id)) = normalized.remove("sensorId") else {
            return Err(CatalogError::Data(serde::de::Error::custom(
                "sensorId missing after validation",
            )));
        };
        let mut reading: Reading = serde_json::from_value(Value::Object(normalized))?;

        let mut cols = self.inner.write().await;
        match cols.sensors.get(&sensor_id) {
            Some(sensor) => match cols.sensor_types.get(&sensor.model) {
                Some(sensor_type) => {
                    reading.status =
                        Some(Status::classify(reading.value, &sensor.expected, &sensor_type.limits));
                }
                None => warn!(
                    sensor_id = %sensor_id, model = %sensor.model,
                    "sensor references unknown sensor-type; storing reading without status"
                ),
            },
            None => warn!(
                sensor_id = %sensor_id,
                "reading for unknown sensor; storing without status"
            ),
        }

        let series = cols.readings.entry(sensor_id).or_default();
        match series.iter_mut().find(|r| r.timestamp == reading.timestamp) {
            Some(existing) => *existing = reading,
            None => series.push(reading),
        }
        Ok(())
    }

    /// Search sensor-types. With `id` set this is a single-record lookup
    /// (`NotFound` on miss); otherwise an equality-filtered scroll query
    /// ordered by case-insensitive id.
    pub async fn find_sensor_types(&self, info: &RawRecord) -> Result<Page<SensorType>> {
        let spec = validate(Op::FindSensorTypes, info).map_err(CatalogError::Validation)?;
        let cols = self.inner.read().await;
        if let Some(id) = spec.get("id").and_then(Value::as_str) {
            let found = cols
                .sensor_types
                .get(id)
                .cloned()
                .ok_or_else(|| CatalogError::not_found(EntityKind::SensorType, id))?;
            return Ok(Page::single(found));
        }
        let (index, count) = page_params(&spec);
        let filters = content_filters(&spec);
        Ok(find_page(cols.sensor_types.values(), &filters, index, count))
    }

    /// Search sensors, like [`find_sensor_types`](Self::find_sensor_types).
    /// A truthy `doDetail` embeds a copy of each sensor's type on the
    /// result item (omitted when the type is unknown).
    pub async fn find_sensors(&self, info: &RawRecord) -> Result<Page<SensorItem>> {
        let spec = validate(Op::FindSensors, info).map_err(CatalogError::Validation)?;
        let cols = self.inner.read().await;
        if let Some(id) = spec.get("id").and_then(Value::as_str) {
            let found = cols
                .sensors
                .get(id)
                .cloned()
                .ok_or_else(|| CatalogError::not_found(EntityKind::Sensor, id))?;
            return Ok(Page::single(SensorItem {
                sensor: found,
                sensor_type: None,
            }));
        }
        let (index, count) = page_params(&spec);
        let filters = content_filters(&spec);
        let page = find_page(cols.sensors.values(), &filters, index, count);
        let do_detail = is_truthy(spec.get("doDetail"));
        let data = page
            .data
            .into_iter()
            .map(|sensor| {
                let sensor_type = do_detail
                    .then(|| cols.sensor_types.get(&sensor.model).cloned())
                    .flatten();
                SensorItem {
                    sensor,
                    sensor_type,
                }
            })
            .collect();
        Ok(Page {
            data,
            next_index: page.next_index,
            previous_index: page.previous_index,
        })
    }

    /// Readings for `info.sensorId`, newest first, filtered to the
    /// requested status set (default `{ok}`) and to timestamps at or
    /// below the `timestamp` ceiling, at most `count` entries.
    ///
    /// `NotFound` when no readings were ever stored for the sensor.
    /// Readings stored without a status never match any status filter.
    pub async fn find_sensor_data(&self, info: &RawRecord) -> Result<ReadingsPage> {
        let spec = validate(Op::FindSensorData, info).map_err(CatalogError::Validation)?;
        let cols = self.inner.read().await;
        let sensor_id = spec.get("sensorId").and_then(Value::as_str).unwrap_or("");
        let series = cols
            .readings
            .get(sensor_id)
            .ok_or_else(|| CatalogError::not_found(EntityKind::SensorData, sensor_id))?;

        let statuses: Vec<Status> = match spec.get("statuses") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => vec![Status::Ok],
        };
        let ceiling = spec.get("timestamp").and_then(Value::as_i64).unwrap_or(i64::MAX);
        let count = spec.get("count").and_then(Value::as_i64).unwrap_or(0).max(0) as usize;

        let mut data: Vec<Reading> = series
            .iter()
            .filter(|r| r.status.is_some_and(|s| statuses.contains(&s)))
            .filter(|r| r.timestamp <= ceiling)
            .cloned()
            .collect();
        data.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        data.truncate(count);

        let (sensor, sensor_type) = if is_truthy(spec.get("doDetail")) {
            let sensor = cols.sensors.get(sensor_id).cloned();
            let sensor_type = sensor
                .as_ref()
                .and_then(|s| cols.sensor_types.get(&s.model))
                .cloned();
            (sensor, sensor_type)
        } else {
            (None, None)
        };

        Ok(ReadingsPage {
            data,
            sensor,
            sensor_type,
        })
    }
}

/// Truthiness of an optional request field, for `doDetail`-style flags
/// that arrive as query strings.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty() && s != "false",
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        _ => false,
    }
}
