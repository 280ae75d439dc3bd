use std::collections::HashMap;

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use utoipa::OpenApi;

use super::dto::{ReadingsEnvelope, ScrollEnvelope};
use super::errors::ApiError;
use crate::errors::{CatalogError, FieldError};
use crate::store::models::{Range, Reading, Sensor, SensorType, Status};
use crate::store::SensorStore;
use crate::validate::RawRecord;

// ---------------------------------------------------------------------------
// Request assembly
// ---------------------------------------------------------------------------

/// Query/path parameters arrive as strings; the validator coerces them.
fn string_record(params: HashMap<String, String>) -> RawRecord {
    params
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect()
}

fn body_record(body: Value) -> Result<RawRecord, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::Catalog(CatalogError::Validation(vec![
            FieldError::new("body", "request body must be a JSON object"),
        ]))),
    }
}

/// Raw request value rendered for a `Location` path segment.
fn raw_segment(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Sensor types
// ---------------------------------------------------------------------------

/// Scroll through sensor-types, filtered by any primitive field.
#[utoipa::path(
    get,
    path = "/sensor-types",
    params(
        ("index" = Option<i64>, Query, description = "Index to resume scrolling from"),
        ("count" = Option<i64>, Query, description = "Maximum number of results"),
    ),
    responses(
        (status = 200, description = "One page of sensor-types with scroll links"),
        (status = 400, description = "Invalid search parameters"),
    ),
    tag = "sensor-types"
)]
pub async fn list_sensor_types(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ScrollEnvelope>, ApiError> {
    let info = string_record(params);
    let page = store.find_sensor_types(&info).await?;
    let envelope = ScrollEnvelope::for_list(&uri, page).map_err(CatalogError::from)?;
    Ok(Json(envelope))
}

/// Fetch a single sensor-type by id.
#[utoipa::path(
    get,
    path = "/sensor-types/{id}",
    params(("id" = String, Path, description = "Sensor-type id")),
    responses(
        (status = 200, description = "The sensor-type"),
        (status = 404, description = "Unknown sensor-type id"),
    ),
    tag = "sensor-types"
)]
pub async fn get_sensor_type(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ScrollEnvelope>, ApiError> {
    let mut info = string_record(params);
    info.insert("id".to_owned(), Value::String(id));
    let page = store.find_sensor_types(&info).await?;
    let envelope = ScrollEnvelope::for_item(&uri, page).map_err(CatalogError::from)?;
    Ok(Json(envelope))
}

/// Add or replace a sensor-type.
#[utoipa::path(
    post,
    path = "/sensor-types",
    responses(
        (status = 201, description = "Created; Location names the new record"),
        (status = 400, description = "Validation errors"),
    ),
    tag = "sensor-types"
)]
pub async fn add_sensor_type(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let mut info = string_record(params);
    info.extend(body_record(body)?);
    store.add_sensor_type(&info).await?;
    let location = format!("{}/{}", uri.path(), raw_segment(info.get("id")));
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]))
}

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Scroll through sensors; `doDetail` embeds each sensor's type.
#[utoipa::path(
    get,
    path = "/sensors",
    params(
        ("index" = Option<i64>, Query, description = "Index to resume scrolling from"),
        ("count" = Option<i64>, Query, description = "Maximum number of results"),
        ("doDetail" = Option<String>, Query, description = "Truthy to embed each sensor's type"),
    ),
    responses(
        (status = 200, description = "One page of sensors with scroll links"),
        (status = 400, description = "Invalid search parameters"),
    ),
    tag = "sensors"
)]
pub async fn list_sensors(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ScrollEnvelope>, ApiError> {
    let info = string_record(params);
    let page = store.find_sensors(&info).await?;
    let envelope = ScrollEnvelope::for_list(&uri, page).map_err(CatalogError::from)?;
    Ok(Json(envelope))
}

/// Fetch a single sensor by id.
#[utoipa::path(
    get,
    path = "/sensors/{id}",
    params(("id" = String, Path, description = "Sensor id")),
    responses(
        (status = 200, description = "The sensor"),
        (status = 404, description = "Unknown sensor id"),
    ),
    tag = "sensors"
)]
pub async fn get_sensor(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ScrollEnvelope>, ApiError> {
    let mut info = string_record(params);
    info.insert("id".to_owned(), Value::String(id));
    let page = store.find_sensors(&info).await?;
    let envelope = ScrollEnvelope::for_item(&uri, page).map_err(CatalogError::from)?;
    Ok(Json(envelope))
}

/// Add or replace a sensor.
#[utoipa::path(
    post,
    path = "/sensors",
    responses(
        (status = 201, description = "Created; Location names the new record"),
        (status = 400, description = "Validation errors"),
    ),
    tag = "sensors"
)]
pub async fn add_sensor(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let mut info = string_record(params);
    info.extend(body_record(body)?);
    store.add_sensor(&info).await?;
    let location = format!("{}/{}", uri.path(), raw_segment(info.get("id")));
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]))
}

// ---------------------------------------------------------------------------
// Sensor data
// ---------------------------------------------------------------------------

/// Scroll through a sensor's readings, newest first. `timestamp` is an
/// inclusive ceiling used as the scroll cursor; `statuses` filters by
/// classification (default `ok`).
#[utoipa::path(
    get,
    path = "/sensor-data/{sensor_id}",
    params(
        ("sensor_id" = String, Path, description = "Sensor id"),
        ("timestamp" = Option<i64>, Query, description = "Inclusive timestamp ceiling"),
        ("count" = Option<i64>, Query, description = "Maximum number of results"),
        ("statuses" = Option<String>, Query, description = "`all` or `|`-joined statuses"),
        ("doDetail" = Option<String>, Query, description = "Truthy to attach the sensor and its type"),
    ),
    responses(
        (status = 200, description = "Readings, newest first"),
        (status = 404, description = "Unknown sensor id"),
        (status = 400, description = "Invalid search parameters"),
    ),
    tag = "sensor-data"
)]
pub async fn list_sensor_data(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Path(sensor_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ReadingsEnvelope>, ApiError> {
    let mut info = string_record(params);
    info.insert("sensorId".to_owned(), Value::String(sensor_id));
    let page = store.find_sensor_data(&info).await?;
    let envelope = ReadingsEnvelope::new(&uri, page, true).map_err(CatalogError::from)?;
    Ok(Json(envelope))
}

/// Fetch the reading at exactly `timestamp`. Unlike the scroll route,
/// the status filter defaults to `all` here.
#[utoipa::path(
    get,
    path = "/sensor-data/{sensor_id}/{timestamp}",
    params(
        ("sensor_id" = String, Path, description = "Sensor id"),
        ("timestamp" = i64, Path, description = "Exact reading timestamp"),
    ),
    responses(
        (status = 200, description = "The reading at that timestamp"),
        (status = 404, description = "Unknown sensor id or no reading at that timestamp"),
    ),
    tag = "sensor-data"
)]
pub async fn get_sensor_datum(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Path((sensor_id, timestamp)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ReadingsEnvelope>, ApiError> {
    let mut info = string_record(params);
    info.entry("statuses".to_owned())
        .or_insert_with(|| Value::String("all".to_owned()));
    info.insert("sensorId".to_owned(), Value::String(sensor_id));
    info.insert("timestamp".to_owned(), Value::String(timestamp.clone()));

    let mut page = store.find_sensor_data(&info).await?;
    let exact = timestamp.parse::<i64>().ok();
    if page.data.first().map(|r| Some(r.timestamp)) != Some(exact) {
        return Err(ApiError::NotFound(format!(
            "no data for timestamp '{timestamp}'"
        )));
    }
    page.data.truncate(1);
    let envelope = ReadingsEnvelope::new(&uri, page, false).map_err(CatalogError::from)?;
    Ok(Json(envelope))
}

/// Add a reading for a sensor, replacing any reading at the same
/// timestamp.
#[utoipa::path(
    post,
    path = "/sensor-data/{sensor_id}",
    params(("sensor_id" = String, Path, description = "Sensor id")),
    responses(
        (status = 201, description = "Created; Location names the reading"),
        (status = 400, description = "Validation errors"),
    ),
    tag = "sensor-data"
)]
pub async fn add_sensor_data(
    State(store): State<SensorStore>,
    OriginalUri(uri): OriginalUri,
    Path(sensor_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let mut info = string_record(params);
    info.extend(body_record(body)?);
    info.insert("sensorId".to_owned(), Value::String(sensor_id));
    store.add_sensor_data(&info).await?;
    let location = format!("{}/{}", uri.path(), raw_segment(info.get("timestamp")));
    Ok((StatusCode::CREATED, [(header::LOCATION, location)]))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        list_sensor_types,
        get_sensor_type,
        add_sensor_type,
        list_sensors,
        get_sensor,
        add_sensor,
        list_sensor_data,
        get_sensor_datum,
        add_sensor_data,
        health,
    ),
    components(schemas(SensorType, Sensor, Reading, Range, Status)),
    tags(
        (name = "sensor-types", description = "Device models with hard operating limits"),
        (name = "sensors", description = "Sensor instances with expected operating bands"),
        (name = "sensor-data", description = "Timestamped readings with derived status"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Sensor Catalog API",
        version = "0.1.0",
        description = "REST API for the sensor-data catalog"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum_test::TestServer;
    use serde_json::{json, Value};

    use crate::api::router;
    use crate::store::SensorStore;

    fn test_server() -> TestServer {
        TestServer::new(router(SensorStore::new())).unwrap()
    }

    async fn post_type(server: &TestServer, id: &str) {
        let resp = server
            .post("/sensor-types")
            .json(&json!({
                "id": id,
                "manufacturer": "acme",
                "modelNumber": "m-100",
                "quantity": "temperature",
                "unit": "C",
                "limits": { "min": 0, "max": 100 },
            }))
            .await;
        resp.assert_status(axum::http::StatusCode::CREATED);
    }

    async fn post_sensor(server: &TestServer, id: &str, model: &str) {
        let resp = server
            .post("/sensors")
            .json(&json!({
                "id": id,
                "model": model,
                "period": 2,
                "expected": { "min": 20, "max": 80 },
            }))
            .await;
        resp.assert_status(axum::http::StatusCode::CREATED);
    }

    async fn post_reading(server: &TestServer, sensor_id: &str, timestamp: i64, value: f64) {
        let resp = server
            .post(&format!("/sensor-data/{sensor_id}"))
            .json(&json!({ "timestamp": timestamp, "value": value }))
            .await;
        resp.assert_status(axum::http::StatusCode::CREATED);
    }

    // -----------------------------------------------------------------------
    // POST routes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn post_sensor_type_sets_location() {
        let server = test_server();
        let resp = server
            .post("/sensor-types")
            .json(&json!({
                "id": "t1",
                "manufacturer": "acme",
                "modelNumber": "m-100",
                "quantity": "temperature",
                "unit": "C",
                "limits": { "min": 0, "max": 100 },
            }))
            .await;
        resp.assert_status(axum::http::StatusCode::CREATED);
        assert_eq!(resp.header("location").to_str().unwrap(), "/sensor-types/t1");
    }

    #[tokio::test]
    async fn post_invalid_sensor_reports_every_field() {
        let server = test_server();
        let resp = server
            .post("/sensors")
            .json(&json!({
                "model": "t1",
                "period": "abc",
                "expected": { "min": 1, "max": 2 },
            }))
            .await;
        resp.assert_status_bad_request();
        let body: Value = resp.json();
        let errors = body["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e["code"] == "BAD_VALUE"));
        let widgets: Vec<&str> = errors.iter().map(|e| e["widget"].as_str().unwrap()).collect();
        assert!(widgets.contains(&"id"));
        assert!(widgets.contains(&"period"));
    }

    #[tokio::test]
    async fn post_reading_location_uses_timestamp() {
        let server = test_server();
        let resp = server
            .post("/sensor-data/s1")
            .json(&json!({ "timestamp": 42, "value": 1.5 }))
            .await;
        resp.assert_status(axum::http::StatusCode::CREATED);
        assert_eq!(
            resp.header("location").to_str().unwrap(),
            "/sensor-data/s1/42"
        );
    }

    // -----------------------------------------------------------------------
    // GET /sensor-types
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_sensor_types_pages_with_next_link() {
        let server = test_server();
        for id in ["a", "b", "c", "d"] {
            post_type(&server, id).await;
        }

        let resp = server
            .get("/sensor-types")
            .add_query_param("count", "3")
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
        assert_eq!(body["nextIndex"], 3);
        assert_eq!(body["data"][0]["id"], "a");
        assert_eq!(body["data"][0]["self"], "/sensor-types/a");
        let next = body["next"].as_str().unwrap();

        let resp = server.get(next).await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["id"], "d");
        assert!(body.get("prev").is_some());
    }

    #[tokio::test]
    async fn get_sensor_type_by_id() {
        let server = test_server();
        post_type(&server, "t1").await;

        let resp = server.get("/sensor-types/t1").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["data"][0]["id"], "t1");
        assert_eq!(body["data"][0]["self"], "/sensor-types/t1");
        assert_eq!(body["nextIndex"], -1);
    }

    #[tokio::test]
    async fn get_unknown_sensor_type_is_404() {
        let server = test_server();
        let resp = server.get("/sensor-types/nosuch").await;
        resp.assert_status_not_found();
        let body: Value = resp.json();
        assert_eq!(body["errors"][0]["code"], "NOT_FOUND");
    }

    // -----------------------------------------------------------------------
    // GET /sensors
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_sensors_with_detail_embeds_type() {
        let server = test_server();
        post_type(&server, "t1").await;
        post_sensor(&server, "s1", "t1").await;

        let resp = server
            .get("/sensors")
            .add_query_param("doDetail", "true")
            .await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["data"][0]["id"], "s1");
        assert_eq!(body["data"][0]["sensorType"]["id"], "t1");

        let plain: Value = server.get("/sensors").await.json();
        assert!(plain["data"][0].get("sensorType").is_none());
    }

    #[tokio::test]
    async fn list_sensors_filters_by_model() {
        let server = test_server();
        post_sensor(&server, "s1", "t1").await;
        post_sensor(&server, "s2", "t2").await;

        let resp = server.get("/sensors").add_query_param("model", "t2").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["id"], "s2");
    }

    // -----------------------------------------------------------------------
    // GET /sensor-data
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn readings_scroll_newest_first() {
        let server = test_server();
        post_type(&server, "t1").await;
        post_sensor(&server, "s1", "t1").await;
        for ts in [5, 1, 3] {
            post_reading(&server, "s1", ts, 50.0).await;
        }

        let resp = server.get("/sensor-data/s1").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        let timestamps: Vec<i64> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["timestamp"].as_i64().unwrap())
            .collect();
        assert_eq!(timestamps, vec![5, 3, 1]);
        assert_eq!(body["data"][0]["self"], "/sensor-data/s1/5");
    }

    #[tokio::test]
    async fn readings_detail_attaches_sensor_and_type() {
        let server = test_server();
        post_type(&server, "t1").await;
        post_sensor(&server, "s1", "t1").await;
        post_reading(&server, "s1", 1, 50.0).await;

        let resp = server
            .get("/sensor-data/s1")
            .add_query_param("doDetail", "true")
            .await;
        let body: Value = resp.json();
        assert_eq!(body["sensor"]["id"], "s1");
        assert_eq!(body["sensorType"]["id"], "t1");
    }

    #[tokio::test]
    async fn single_timestamp_route_requires_exact_match() {
        let server = test_server();
        post_type(&server, "t1").await;
        post_sensor(&server, "s1", "t1").await;
        post_reading(&server, "s1", 10, 50.0).await;
        post_reading(&server, "s1", 20, 0.0).await; // status: error

        // exact hit; statuses default to all on this route
        let resp = server.get("/sensor-data/s1/20").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["timestamp"], 20);
        assert_eq!(body["data"][0]["status"], "error");

        // nearest-below is not exact: 404
        let resp = server.get("/sensor-data/s1/15").await;
        resp.assert_status_not_found();
        let body: Value = resp.json();
        assert_eq!(
            body["errors"][0]["message"],
            "no data for timestamp '15'"
        );
    }

    #[tokio::test]
    async fn readings_for_unknown_sensor_is_404() {
        let server = test_server();
        let resp = server.get("/sensor-data/nosuch").await;
        resp.assert_status_not_found();
    }

    #[tokio::test]
    async fn bad_statuses_parameter_is_400() {
        let server = test_server();
        post_type(&server, "t1").await;
        post_sensor(&server, "s1", "t1").await;
        post_reading(&server, "s1", 1, 50.0).await;

        let resp = server
            .get("/sensor-data/s1")
            .add_query_param("statuses", "ok|broken")
            .await;
        resp.assert_status_bad_request();
        let body: Value = resp.json();
        assert_eq!(body["errors"][0]["widget"], "statuses");
    }

    // -----------------------------------------------------------------------
    // System routes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn health_returns_ok() {
        let server = test_server();
        let resp = server.get("/health").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn openapi_spec_is_served() {
        let server = test_server();
        let resp = server.get("/api-docs/openapi.json").await;
        resp.assert_status_ok();
        let body: Value = resp.json();
        assert_eq!(body["info"]["title"], "Sensor Catalog API");
    }
}
