//! Data models for stored readings.

use serde::Serialize;
use time::OffsetDateTime;

use crate::timestamp::now_whole_seconds;

/// A reading stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    /// Database row ID, assigned on insert.
    pub id: i64,
    /// Identifier of the reporting device.
    pub device_id: String,
    /// Light intensity in lux.
    pub lux: f64,
    /// When the reading was accepted, at whole-second precision.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// A reading that has not been stored yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub device_id: String,
    pub lux: f64,
    pub recorded_at: OffsetDateTime,
}

impl NewReading {
    /// Create a reading with an explicit timestamp.
    pub fn new(device_id: impl Into<String>, lux: f64, recorded_at: OffsetDateTime) -> Self {
        Self {
            device_id: device_id.into(),
            lux,
            recorded_at,
        }
    }

    /// Create a reading stamped with the current time, truncated to seconds.
    pub fn now(device_id: impl Into<String>, lux: f64) -> Self {
        Self::new(device_id, lux, now_whole_seconds())
    }
}
