use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// A roster entry: the stable identity of a driver the locator may propose.
/// Reference data handed to the locator at construction, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: u32,
    pub name: String,
    pub vehicle_number: String,
}

/// An ephemeral matching proposal: a roster driver with a synthesized
/// position near the pickup point. Produced fresh per request, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverCandidate {
    pub id: u32,
    pub name: String,
    pub vehicle_number: String,
    pub location: GeoPoint,
    pub distance_from_pickup: f64,
}

/// Availability registry record, keyed by driver email. Upserted by
/// `POST /driver/status`; drivers never seen read as offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverAvailability {
    pub online: bool,
    pub location: Option<GeoPoint>,
    pub updated_at: DateTime<Utc>,
}

pub fn default_roster() -> Vec<DriverProfile> {
    [
        (1, "Ravi", "KA05AB1234"),
        (2, "Anita", "KA03CD5678"),
        (3, "Sunil", "KA02EF9012"),
        (4, "Priya", "KA01GH3456"),
        (5, "Vikram", "KA04IJ7890"),
    ]
    .into_iter()
    .map(|(id, name, vehicle_number)| DriverProfile {
        id,
        name: name.to_string(),
        vehicle_number: vehicle_number.to_string(),
    })
    .collect()
}
