//! Read-only views derived from the ride store and availability registry.
//! Everything is recomputed per request; ride volume is small enough that
//! a cache would only add staleness.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::fare::{round1, round2};
use crate::models::ride::{Ride, RideStatus};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AdminStats {
    pub total_users: usize,
    pub total_rides: usize,
    pub booked: usize,
    pub ongoing: usize,
    pub completed: usize,
    pub cancelled: usize,
}

#[derive(Debug, Serialize)]
pub struct CustomerSummary {
    pub email: String,
    pub total_rides: usize,
    pub completed_rides: usize,
    pub total_spend: f64,
}

#[derive(Debug, Serialize)]
pub struct DriverSummary {
    pub email: String,
    pub online: bool,
    pub completed_rides: usize,
    pub earnings: f64,
    pub rating: f64,
}

fn completed_rides_for_driver(state: &AppState, driver_email: &str) -> Vec<Ride> {
    state
        .rides
        .iter()
        .filter(|entry| {
            let ride = entry.value();
            ride.status == RideStatus::Completed
                && ride.driver_email.as_deref() == Some(driver_email)
        })
        .map(|entry| entry.value().clone())
        .collect()
}

/// Sum of fares over completed rides for one driver, 2 decimal places.
pub fn driver_earnings(state: &AppState, driver_email: &str) -> f64 {
    let total = completed_rides_for_driver(state, driver_email)
        .iter()
        .map(|ride| ride.fare)
        .sum();
    round2(total)
}

/// Mean of the ratings left on a driver's completed rides, 1 decimal place.
/// 0.0 when nothing has been rated yet (or the driver has no rides).
pub fn driver_rating(state: &AppState, driver_email: &str) -> f64 {
    let rides = completed_rides_for_driver(state, driver_email);
    let ratings: Vec<u8> = rides.iter().filter_map(|ride| ride.rating).collect();

    if ratings.is_empty() {
        return 0.0;
    }

    let sum: u32 = ratings.iter().map(|&r| u32::from(r)).sum();
    round1(f64::from(sum) / ratings.len() as f64)
}

/// Sum of fares over completed rides booked by one rider.
pub fn customer_spend(state: &AppState, rider_email: &str) -> f64 {
    let total = state
        .rides
        .iter()
        .filter(|entry| {
            let ride = entry.value();
            ride.status == RideStatus::Completed && ride.rider_email == rider_email
        })
        .map(|entry| entry.value().fare)
        .sum();
    round2(total)
}

/// Live counters for the admin dashboard.
pub fn admin_stats(state: &AppState) -> AdminStats {
    let mut stats = AdminStats {
        total_users: state.credentials.count(),
        total_rides: 0,
        booked: 0,
        ongoing: 0,
        completed: 0,
        cancelled: 0,
    };

    for entry in state.rides.iter() {
        stats.total_rides += 1;
        match entry.value().status {
            RideStatus::Booked => stats.booked += 1,
            RideStatus::Ongoing => stats.ongoing += 1,
            RideStatus::Completed => stats.completed += 1,
            RideStatus::Cancelled => stats.cancelled += 1,
        }
    }

    stats
}

/// One row per rider that has ever booked, ordered by email.
pub fn customers(state: &AppState) -> Vec<CustomerSummary> {
    let mut by_email: BTreeMap<String, CustomerSummary> = BTreeMap::new();

    for entry in state.rides.iter() {
        let ride = entry.value();
        let summary = by_email
            .entry(ride.rider_email.clone())
            .or_insert_with(|| CustomerSummary {
                email: ride.rider_email.clone(),
                total_rides: 0,
                completed_rides: 0,
                total_spend: 0.0,
            });

        summary.total_rides += 1;
        if ride.status == RideStatus::Completed {
            summary.completed_rides += 1;
            summary.total_spend += ride.fare;
        }
    }

    by_email
        .into_values()
        .map(|mut summary| {
            summary.total_spend = round2(summary.total_spend);
            summary
        })
        .collect()
}

/// One row per driver seen in the availability registry or on a ride,
/// ordered by email.
pub fn drivers(state: &AppState) -> Vec<DriverSummary> {
    let mut emails: Vec<String> = state
        .availability
        .iter()
        .map(|entry| entry.key().clone())
        .chain(
            state
                .rides
                .iter()
                .filter_map(|entry| entry.value().driver_email.clone()),
        )
        .collect();
    emails.sort();
    emails.dedup();

    emails
        .into_iter()
        .map(|email| {
            let completed = completed_rides_for_driver(state, &email);
            DriverSummary {
                online: state.is_available(&email),
                completed_rides: completed.len(),
                earnings: driver_earnings(state, &email),
                rating: driver_rating(state, &email),
                email,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::lifecycle::{self, BookingRequest};
    use crate::geo::GeoPoint;

    fn state() -> AppState {
        AppState::new(Config::default())
    }

    async fn completed_ride_with_fare(state: &AppState, driver: &str, rider: &str, fare: f64) {
        let ride = lifecycle::book(
            state,
            BookingRequest {
                rider_email: rider.to_string(),
                pickup: "A".to_string(),
                drop: "B".to_string(),
                pickup_coords: GeoPoint {
                    lat: 12.9716,
                    lng: 77.5946,
                },
                drop_coords: GeoPoint {
                    lat: 12.98,
                    lng: 77.6,
                },
            },
        )
        .await
        .unwrap();

        state.set_availability(driver, true, None);
        lifecycle::accept(state, ride.id, driver).await.unwrap();
        lifecycle::complete(state, ride.id, driver).await.unwrap();

        // Pin the fare so aggregation sums are exact.
        state.rides.get_mut(&ride.id).unwrap().fare = fare;
    }

    #[tokio::test]
    async fn earnings_sum_completed_fares() {
        let state = state();
        completed_ride_with_fare(&state, "d@example.com", "r1@example.com", 100.00).await;
        completed_ride_with_fare(&state, "d@example.com", "r2@example.com", 50.50).await;
        completed_ride_with_fare(&state, "d@example.com", "r1@example.com", 25.25).await;

        assert_eq!(driver_earnings(&state, "d@example.com"), 175.75);
    }

    #[tokio::test]
    async fn earnings_without_completed_rides_is_zero() {
        let state = state();
        assert_eq!(driver_earnings(&state, "nobody@example.com"), 0.0);

        // A booked-but-not-completed ride earns nothing.
        lifecycle::book(
            &state,
            BookingRequest {
                rider_email: "r@example.com".to_string(),
                pickup: "A".to_string(),
                drop: "B".to_string(),
                pickup_coords: GeoPoint {
                    lat: 12.9716,
                    lng: 77.5946,
                },
                drop_coords: GeoPoint {
                    lat: 12.98,
                    lng: 77.6,
                },
            },
        )
        .await
        .unwrap();
        assert_eq!(driver_earnings(&state, "d@example.com"), 0.0);
    }

    #[tokio::test]
    async fn rating_is_mean_of_rated_completed_rides() {
        let state = state();
        completed_ride_with_fare(&state, "d@example.com", "r@example.com", 60.0).await;
        completed_ride_with_fare(&state, "d@example.com", "r@example.com", 60.0).await;
        completed_ride_with_fare(&state, "d@example.com", "r@example.com", 60.0).await;

        let ride_ids: Vec<_> = state.rides.iter().map(|entry| *entry.key()).collect();
        lifecycle::rate(&state, ride_ids[0], 5).await.unwrap();
        lifecycle::rate(&state, ride_ids[1], 4).await.unwrap();
        // Third ride stays unrated and must not drag the mean down.

        assert_eq!(driver_rating(&state, "d@example.com"), 4.5);
    }

    #[tokio::test]
    async fn rating_defaults_to_zero() {
        let state = state();
        assert_eq!(driver_rating(&state, "d@example.com"), 0.0);

        completed_ride_with_fare(&state, "d@example.com", "r@example.com", 60.0).await;
        assert_eq!(driver_rating(&state, "d@example.com"), 0.0);
    }

    #[tokio::test]
    async fn customer_spend_counts_only_completed() {
        let state = state();
        completed_ride_with_fare(&state, "d@example.com", "r@example.com", 80.0).await;
        completed_ride_with_fare(&state, "d@example.com", "r@example.com", 20.5).await;
        completed_ride_with_fare(&state, "d@example.com", "other@example.com", 999.0).await;

        assert_eq!(customer_spend(&state, "r@example.com"), 100.5);
    }

    #[tokio::test]
    async fn admin_stats_partition_by_status() {
        let state = state();
        completed_ride_with_fare(&state, "d@example.com", "r@example.com", 60.0).await;

        let booked = lifecycle::book(
            &state,
            BookingRequest {
                rider_email: "r@example.com".to_string(),
                pickup: "A".to_string(),
                drop: "B".to_string(),
                pickup_coords: GeoPoint {
                    lat: 12.9716,
                    lng: 77.5946,
                },
                drop_coords: GeoPoint {
                    lat: 12.98,
                    lng: 77.6,
                },
            },
        )
        .await
        .unwrap();
        lifecycle::cancel_by_rider(&state, booked.id).await.unwrap();

        let stats = admin_stats(&state);
        assert_eq!(stats.total_rides, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.booked, 0);
        assert_eq!(stats.ongoing, 0);
    }

    #[tokio::test]
    async fn driver_listing_merges_registry_and_rides() {
        let state = state();
        state.set_availability("idle@example.com", true, None);
        completed_ride_with_fare(&state, "busy@example.com", "r@example.com", 75.0).await;
        state.set_availability("busy@example.com", false, None);

        let listing = drivers(&state);
        assert_eq!(listing.len(), 2);

        let busy = listing.iter().find(|d| d.email == "busy@example.com").unwrap();
        assert_eq!(busy.completed_rides, 1);
        assert_eq!(busy.earnings, 75.0);
        assert!(!busy.online);

        let idle = listing.iter().find(|d| d.email == "idle@example.com").unwrap();
        assert_eq!(idle.completed_rides, 0);
        assert!(idle.online);
    }
}
