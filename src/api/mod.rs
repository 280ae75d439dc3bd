pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{routing::get, Router};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::store::SensorStore;
use handlers::ApiDoc;

pub fn router(store: SensorStore) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/sensor-types",
            get(handlers::list_sensor_types).post(handlers::add_sensor_type),
        )
        .route("/sensor-types/{id}", get(handlers::get_sensor_type))
        .route(
            "/sensors",
            get(handlers::list_sensors).post(handlers::add_sensor),
        )
        .route("/sensors/{id}", get(handlers::get_sensor))
        .route(
            "/sensor-data/{sensor_id}",
            get(handlers::list_sensor_data).post(handlers::add_sensor_data),
        )
        .route(
            "/sensor-data/{sensor_id}/{timestamp}",
            get(handlers::get_sensor_datum),
        )
        .with_state(store)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
