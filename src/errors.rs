use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// One field-level validation failure. `field` is the dotted name of the
/// offending field (`limits.min`), carried through to the HTTP error body
/// as `widget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Which collection a lookup missed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    SensorType,
    Sensor,
    SensorData,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityKind::SensorType => "sensor-type",
            EntityKind::Sensor => "sensor",
            EntityKind::SensorData => "sensor",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// All field errors for one operation, accumulated before any mutation.
    #[error("{} validation error(s)", .0.len())]
    Validation(Vec<FieldError>),

    /// A single-entity lookup by id found nothing.
    #[error("unknown {kind} id {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A record failed to round-trip through serde after validation.
    #[error("bad record: {0}")]
    Data(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
