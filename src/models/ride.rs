use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Booked,
    Ongoing,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelParty {
    Rider,
    Driver,
}

/// A ride record. Created by booking, mutated only through the guarded
/// lifecycle transitions, never deleted (completed and cancelled rides are
/// retained for reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub rider_email: String,
    /// None exactly while the ride is still waiting for a driver.
    pub driver_email: Option<String>,
    pub pickup: String,
    pub drop: String,
    pub pickup_coords: GeoPoint,
    pub drop_coords: GeoPoint,
    pub distance_km: f64,
    pub fare: f64,
    pub status: RideStatus,
    /// 1..=5, settable only once the ride is completed.
    pub rating: Option<u8>,
    pub cancelled_by: Option<CancelParty>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Ride {
    pub fn new(
        rider_email: String,
        pickup: String,
        drop: String,
        pickup_coords: GeoPoint,
        drop_coords: GeoPoint,
        distance_km: f64,
        fare: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            rider_email,
            driver_email: None,
            pickup,
            drop,
            pickup_coords,
            drop_coords,
            distance_km,
            fare,
            status: RideStatus::Booked,
            rating: None,
            cancelled_by: None,
            created_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ride_is_booked_and_unassigned() {
        let ride = Ride::new(
            "rider@example.com".to_string(),
            "MG Road".to_string(),
            "Airport".to_string(),
            GeoPoint {
                lat: 12.9716,
                lng: 77.5946,
            },
            GeoPoint {
                lat: 13.1986,
                lng: 77.7066,
            },
            28.42,
            334.2,
        );

        assert_eq!(ride.status, RideStatus::Booked);
        assert!(ride.driver_email.is_none());
        assert!(ride.rating.is_none());
        assert!(ride.completed_at.is_none());
        assert!(ride.cancelled_at.is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&RideStatus::Booked).unwrap();
        assert_eq!(json, "\"booked\"");
        let json = serde_json::to_string(&RideStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }

    #[test]
    fn terminal_states() {
        assert!(!RideStatus::Booked.is_terminal());
        assert!(!RideStatus::Ongoing.is_terminal());
        assert!(RideStatus::Completed.is_terminal());
        assert!(RideStatus::Cancelled.is_terminal());
    }
}
