use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::DetailMap;

/// Unique attack identifier.
pub type AttackId = Uuid;

/// Endpoint of an attack: a point on the map plus the country it falls in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
}

/// A single recorded attack. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttackEvent {
    pub id: AttackId,
    pub attack_type: String,
    /// 1 (informational) through 10 (critical).
    pub severity: i32,
    #[serde(rename = "source_location")]
    pub source: GeoLocation,
    #[serde(rename = "destination_location")]
    pub destination: GeoLocation,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "additional_details", default)]
    pub extra: DetailMap,
}

impl AttackEvent {
    pub fn source_country(&self) -> &str {
        &self.source.country
    }

    pub fn dest_country(&self) -> &str {
        &self.destination.country
    }

    /// Whether either endpoint of the attack lies in `country`.
    pub fn involves_country(&self, country: &str) -> bool {
        self.source.country == country || self.destination.country == country
    }
}
