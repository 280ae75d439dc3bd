use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Classification of a reading against its sensor's expected band and its
/// type's hard limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Ok,
    Error,
    OutOfRange,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Ok, Status::Error, Status::OutOfRange];

    /// Classify `value`: touching or exceeding the hard limits is an
    /// `error`; inside the expected band is `ok`; anything between is
    /// `outOfRange`.
    pub fn classify(value: f64, expected: &Range, limits: &Range) -> Status {
        if value <= limits.min || value >= limits.max {
            Status::Error
        } else if value >= expected.min && value <= expected.max {
            Status::Ok
        } else {
            Status::OutOfRange
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "ok",
            Status::Error => "error",
            Status::OutOfRange => "outOfRange",
        };
        f.write_str(s)
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(Status::Ok),
            "error" => Ok(Status::Error),
            "outOfRange" => Ok(Status::OutOfRange),
            _ => Err(()),
        }
    }
}

/// A numeric `{min, max}` band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// Anything stored under a string id; lets the query engine sort and link
/// without knowing the entity.
pub trait Keyed {
    fn id(&self) -> &str;
}

/// A device model with hard operating limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SensorType {
    pub id: String,
    pub manufacturer: String,
    pub model_number: String,
    pub quantity: String,
    pub unit: String,
    pub limits: Range,
    /// Undeclared input fields, retained verbatim.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl Keyed for SensorType {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An instance of a [`SensorType`] with a narrower expected band.
/// `model` is a soft reference: it may name a type that was never added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    pub id: String,
    pub model: String,
    pub period: i64,
    pub expected: Range,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl Keyed for Sensor {
    fn id(&self) -> &str {
        &self.id
    }
}

/// One timestamped measurement, keyed under its sensor's id in the store.
/// `status` is absent when the owning sensor or its type was unknown at
/// write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub timestamp: i64,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMITS: Range = Range {
        min: 0.0,
        max: 100.0,
    };
    const EXPECTED: Range = Range {
        min: 20.0,
        max: 80.0,
    };

    #[test]
    fn classify_inside_expected_band_is_ok() {
        assert_eq!(Status::classify(50.0, &EXPECTED, &LIMITS), Status::Ok);
        assert_eq!(Status::classify(20.0, &EXPECTED, &LIMITS), Status::Ok);
        assert_eq!(Status::classify(80.0, &EXPECTED, &LIMITS), Status::Ok);
    }

    #[test]
    fn classify_between_expected_and_limits_is_out_of_range() {
        assert_eq!(Status::classify(10.0, &EXPECTED, &LIMITS), Status::OutOfRange);
        assert_eq!(Status::classify(90.0, &EXPECTED, &LIMITS), Status::OutOfRange);
    }

    #[test]
    fn classify_on_or_past_limits_is_error() {
        assert_eq!(Status::classify(0.0, &EXPECTED, &LIMITS), Status::Error);
        assert_eq!(Status::classify(100.0, &EXPECTED, &LIMITS), Status::Error);
        assert_eq!(Status::classify(-5.0, &EXPECTED, &LIMITS), Status::Error);
        assert_eq!(Status::classify(250.0, &EXPECTED, &LIMITS), Status::Error);
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(serde_json::to_value(Status::OutOfRange).unwrap(), "outOfRange");
        assert_eq!("outOfRange".parse::<Status>().unwrap(), Status::OutOfRange);
        assert!("OK".parse::<Status>().is_err());
    }
}
