//! Guarded ride lifecycle transitions. Every mutation of a ride happens
//! while holding its map entry, so a guard check and the write it protects
//! are a single atomic step per ride. Entry contention is retried a bounded
//! number of times, then surfaced as a Conflict.

use chrono::Utc;
use dashmap::try_result::TryResult;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::fare::round2;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::ride::{CancelParty, Ride, RideStatus};
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub rider_email: String,
    pub pickup: String,
    pub drop: String,
    pub pickup_coords: GeoPoint,
    pub drop_coords: GeoPoint,
}

pub async fn book(state: &AppState, request: BookingRequest) -> Result<Ride, AppError> {
    if request.rider_email.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "rider_email cannot be empty".to_string(),
        ));
    }
    if request.pickup.trim().is_empty() || request.drop.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "pickup and drop labels cannot be empty".to_string(),
        ));
    }
    request.pickup_coords.validate()?;
    request.drop_coords.validate()?;

    let distance_km = haversine_km(&request.pickup_coords, &request.drop_coords);
    let fare = state.fares.quote(distance_km);

    let ride = Ride::new(
        request.rider_email,
        request.pickup,
        request.drop,
        request.pickup_coords,
        request.drop_coords,
        round2(distance_km),
        fare,
    );

    state.rides.insert(ride.id, ride.clone());
    state.metrics.record_transition("book", "success");
    state.metrics.active_rides.inc();

    state.notifier.notify(
        &ride.rider_email,
        "Ride booked",
        &format!("Your ride from {} to {} is booked", ride.pickup, ride.drop),
    );
    info!(ride_id = %ride.id, fare = ride.fare, distance_km = ride.distance_km, "ride booked");

    Ok(ride)
}

pub async fn accept(state: &AppState, ride_id: Uuid, driver_email: &str) -> Result<Ride, AppError> {
    if driver_email.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "driver_email cannot be empty".to_string(),
        ));
    }

    let ride = transition(state, "accept", ride_id, |ride| match ride.status {
        RideStatus::Booked if ride.driver_email.is_some() => Err(AppError::AlreadyBound(format!(
            "ride {ride_id} already has a driver"
        ))),
        RideStatus::Booked => {
            if state.config.enforce_availability && !state.is_available(driver_email) {
                return Err(AppError::InvalidState(format!(
                    "driver {driver_email} is not online"
                )));
            }
            ride.driver_email = Some(driver_email.to_string());
            ride.status = RideStatus::Ongoing;
            Ok(())
        }
        RideStatus::Ongoing => Err(AppError::AlreadyBound(format!(
            "ride {ride_id} already accepted"
        ))),
        status => Err(AppError::InvalidState(format!(
            "cannot accept a {status:?} ride"
        ))),
    })
    .await?;

    state.notifier.notify(
        &ride.rider_email,
        "Driver on the way",
        &format!("{driver_email} accepted your ride"),
    );
    info!(ride_id = %ride.id, driver_email, "ride accepted");

    Ok(ride)
}

pub async fn complete(
    state: &AppState,
    ride_id: Uuid,
    driver_email: &str,
) -> Result<Ride, AppError> {
    let ride = transition(state, "complete", ride_id, |ride| match ride.status {
        RideStatus::Ongoing => {
            if ride.driver_email.as_deref() != Some(driver_email) {
                return Err(AppError::InvalidState(format!(
                    "ride {ride_id} is not assigned to {driver_email}"
                )));
            }
            ride.status = RideStatus::Completed;
            ride.completed_at = Some(Utc::now());
            Ok(())
        }
        RideStatus::Booked => Err(AppError::InvalidState(format!(
            "ride {ride_id} has not been accepted yet"
        ))),
        status => Err(AppError::InvalidState(format!(
            "cannot complete a {status:?} ride"
        ))),
    })
    .await?;

    state.metrics.active_rides.dec();
    state.notifier.notify(
        &ride.rider_email,
        "Ride completed",
        &format!("Your ride to {} is complete, fare {}", ride.drop, ride.fare),
    );
    info!(ride_id = %ride.id, driver_email, "ride completed");

    Ok(ride)
}

pub async fn cancel_by_rider(state: &AppState, ride_id: Uuid) -> Result<Ride, AppError> {
    let ride = transition(state, "cancel_rider", ride_id, |ride| match ride.status {
        RideStatus::Booked => {
            ride.status = RideStatus::Cancelled;
            ride.cancelled_by = Some(CancelParty::Rider);
            ride.cancelled_at = Some(Utc::now());
            Ok(())
        }
        status => Err(AppError::InvalidState(format!(
            "only booked rides can be cancelled by the rider, ride is {status:?}"
        ))),
    })
    .await?;

    state.metrics.active_rides.dec();
    info!(ride_id = %ride.id, "ride cancelled by rider");

    Ok(ride)
}

pub async fn cancel_by_driver(
    state: &AppState,
    ride_id: Uuid,
    driver_email: &str,
) -> Result<Ride, AppError> {
    let ride = transition(state, "cancel_driver", ride_id, |ride| match ride.status {
        RideStatus::Ongoing => {
            if ride.driver_email.as_deref() != Some(driver_email) {
                return Err(AppError::InvalidState(format!(
                    "ride {ride_id} is not assigned to {driver_email}"
                )));
            }
            ride.status = RideStatus::Cancelled;
            ride.cancelled_by = Some(CancelParty::Driver);
            ride.cancelled_at = Some(Utc::now());
            Ok(())
        }
        status => Err(AppError::InvalidState(format!(
            "only ongoing rides can be cancelled by the driver, ride is {status:?}"
        ))),
    })
    .await?;

    state.metrics.active_rides.dec();
    state.notifier.notify(
        &ride.rider_email,
        "Ride cancelled",
        "Your driver cancelled the ride",
    );
    info!(ride_id = %ride.id, driver_email, "ride cancelled by driver");

    Ok(ride)
}

pub async fn rate(state: &AppState, ride_id: Uuid, rating: i64) -> Result<Ride, AppError> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::InvalidInput(format!(
            "rating must be between 1 and 5, got {rating}"
        )));
    }

    let ride = transition(state, "rate", ride_id, |ride| match ride.status {
        RideStatus::Completed => {
            ride.rating = Some(rating as u8);
            Ok(())
        }
        status => Err(AppError::InvalidState(format!(
            "only completed rides can be rated, ride is {status:?}"
        ))),
    })
    .await?;

    info!(ride_id = %ride.id, rating, "ride rated");
    Ok(ride)
}

/// Read-modify-write on one ride, with the guard evaluated under the entry
/// lock. A locked entry is retried up to the configured budget with a yield
/// between attempts.
async fn transition<F>(
    state: &AppState,
    operation: &str,
    ride_id: Uuid,
    mut apply: F,
) -> Result<Ride, AppError>
where
    F: FnMut(&mut Ride) -> Result<(), AppError>,
{
    for _ in 0..state.config.transition_retries {
        match state.rides.try_get_mut(&ride_id) {
            TryResult::Present(mut entry) => {
                return match apply(entry.value_mut()) {
                    Ok(()) => {
                        state.metrics.record_transition(operation, "success");
                        Ok(entry.value().clone())
                    }
                    Err(err) => {
                        state.metrics.record_transition(operation, err.code());
                        Err(err)
                    }
                };
            }
            TryResult::Absent => {
                state.metrics.record_transition(operation, "not_found");
                return Err(AppError::NotFound(format!("ride {ride_id} not found")));
            }
            TryResult::Locked => tokio::task::yield_now().await,
        }
    }

    state.metrics.record_transition(operation, "conflict");
    Err(AppError::Conflict(format!(
        "ride {ride_id} is contended, retry the {operation}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state() -> AppState {
        AppState::new(Config::default())
    }

    fn booking() -> BookingRequest {
        BookingRequest {
            rider_email: "rider@example.com".to_string(),
            pickup: "MG Road".to_string(),
            drop: "Indiranagar".to_string(),
            pickup_coords: GeoPoint {
                lat: 12.9716,
                lng: 77.5946,
            },
            drop_coords: GeoPoint {
                lat: 12.9784,
                lng: 77.6408,
            },
        }
    }

    async fn booked_ride(state: &AppState) -> Ride {
        book(state, booking()).await.unwrap()
    }

    #[tokio::test]
    async fn book_computes_distance_and_fare() {
        let state = state();
        let ride = booked_ride(&state).await;

        assert_eq!(ride.status, RideStatus::Booked);
        assert!(ride.driver_email.is_none());
        // MG Road to Indiranagar is about 5 km.
        assert!(ride.distance_km > 4.0 && ride.distance_km < 6.0);
        let expected_fare = 50.0 + 10.0 * ride.distance_km;
        assert!((ride.fare - expected_fare).abs() < 0.1);
    }

    #[tokio::test]
    async fn book_rejects_missing_fields() {
        let state = state();

        let mut request = booking();
        request.rider_email = "  ".to_string();
        assert!(matches!(
            book(&state, request).await,
            Err(AppError::InvalidInput(_))
        ));

        let mut request = booking();
        request.pickup_coords.lat = 120.0;
        assert!(matches!(
            book(&state, request).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn happy_path_booked_ongoing_completed() {
        let state = state();
        let ride = booked_ride(&state).await;
        state.set_availability("driver@example.com", true, None);

        let ride = accept(&state, ride.id, "driver@example.com").await.unwrap();
        assert_eq!(ride.status, RideStatus::Ongoing);
        assert_eq!(ride.driver_email.as_deref(), Some("driver@example.com"));

        let ride = complete(&state, ride.id, "driver@example.com")
            .await
            .unwrap();
        assert_eq!(ride.status, RideStatus::Completed);
        assert!(ride.completed_at.is_some());
    }

    #[tokio::test]
    async fn accept_requires_online_driver() {
        let state = state();
        let ride = booked_ride(&state).await;

        let err = accept(&state, ride.id, "offline@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        // The failed accept must leave the ride untouched.
        let stored = state.rides.get(&ride.id).unwrap().clone();
        assert_eq!(stored.status, RideStatus::Booked);
        assert!(stored.driver_email.is_none());
    }

    #[tokio::test]
    async fn second_accept_is_already_bound() {
        let state = state();
        let ride = booked_ride(&state).await;
        state.set_availability("a@example.com", true, None);
        state.set_availability("b@example.com", true, None);

        accept(&state, ride.id, "a@example.com").await.unwrap();
        let err = accept(&state, ride.id, "b@example.com").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyBound(_)));

        let stored = state.rides.get(&ride.id).unwrap().clone();
        assert_eq!(stored.driver_email.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn concurrent_accepts_one_winner() {
        let state = state();
        let ride = booked_ride(&state).await;
        state.set_availability("a@example.com", true, None);
        state.set_availability("b@example.com", true, None);

        let (first, second) = tokio::join!(
            accept(&state, ride.id, "a@example.com"),
            accept(&state, ride.id, "b@example.com"),
        );

        assert!(first.is_ok() != second.is_ok());
        let loser = if first.is_err() { first } else { second };
        assert!(matches!(loser.unwrap_err(), AppError::AlreadyBound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawned_accepts_never_double_bind() {
        let state = std::sync::Arc::new(state());
        state.set_availability("a@example.com", true, None);
        state.set_availability("b@example.com", true, None);

        for _ in 0..50 {
            let ride = booked_ride(&state).await;

            let first = tokio::spawn({
                let state = state.clone();
                async move { accept(&state, ride.id, "a@example.com").await }
            });
            let second = tokio::spawn({
                let state = state.clone();
                async move { accept(&state, ride.id, "b@example.com").await }
            });

            let first = first.await.unwrap();
            let second = second.await.unwrap();

            assert!(first.is_ok() != second.is_ok());
            let loser = if first.is_err() { first } else { second };
            assert!(matches!(loser.unwrap_err(), AppError::AlreadyBound(_)));

            let stored = state.rides.get(&ride.id).unwrap().clone();
            assert_eq!(stored.status, RideStatus::Ongoing);
            assert!(stored.driver_email.is_some());
        }
    }

    #[tokio::test]
    async fn accept_missing_ride_is_not_found() {
        let state = state();
        state.set_availability("a@example.com", true, None);
        let err = accept(&state, Uuid::new_v4(), "a@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn complete_requires_ongoing_and_matching_driver() {
        let state = state();
        let ride = booked_ride(&state).await;

        let err = complete(&state, ride.id, "driver@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        state.set_availability("driver@example.com", true, None);
        accept(&state, ride.id, "driver@example.com").await.unwrap();

        let err = complete(&state, ride.id, "other@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        complete(&state, ride.id, "driver@example.com")
            .await
            .unwrap();

        // Completing twice must fail and leave the record unchanged.
        let err = complete(&state, ride.id, "driver@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn rider_cancel_only_from_booked() {
        let state = state();
        let ride = booked_ride(&state).await;

        let cancelled = cancel_by_rider(&state, ride.id).await.unwrap();
        assert_eq!(cancelled.status, RideStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(CancelParty::Rider));
        assert!(cancelled.cancelled_at.is_some());

        let err = cancel_by_rider(&state, ride.id).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn driver_cancel_only_from_ongoing() {
        let state = state();
        let ride = booked_ride(&state).await;

        let err = cancel_by_driver(&state, ride.id, "driver@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        state.set_availability("driver@example.com", true, None);
        accept(&state, ride.id, "driver@example.com").await.unwrap();

        let cancelled = cancel_by_driver(&state, ride.id, "driver@example.com")
            .await
            .unwrap();
        assert_eq!(cancelled.status, RideStatus::Cancelled);
        assert_eq!(cancelled.cancelled_by, Some(CancelParty::Driver));
        assert_eq!(
            cancelled.driver_email.as_deref(),
            Some("driver@example.com")
        );
    }

    #[tokio::test]
    async fn rate_guards_status_and_range() {
        let state = state();
        let ride = booked_ride(&state).await;

        // Rating a booked ride fails even with a valid value.
        let err = rate(&state, ride.id, 4).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        state.set_availability("driver@example.com", true, None);
        accept(&state, ride.id, "driver@example.com").await.unwrap();
        complete(&state, ride.id, "driver@example.com")
            .await
            .unwrap();

        assert!(matches!(
            rate(&state, ride.id, 0).await.unwrap_err(),
            AppError::InvalidInput(_)
        ));
        assert!(matches!(
            rate(&state, ride.id, 6).await.unwrap_err(),
            AppError::InvalidInput(_)
        ));

        let rated = rate(&state, ride.id, 5).await.unwrap();
        assert_eq!(rated.rating, Some(5));

        // A rating is overwritable on a completed ride.
        let rated = rate(&state, ride.id, 3).await.unwrap();
        assert_eq!(rated.rating, Some(3));
        assert_eq!(rated.status, RideStatus::Completed);
    }

    #[tokio::test]
    async fn cancelled_ride_stays_cancelled() {
        let state = state();
        let ride = booked_ride(&state).await;
        cancel_by_rider(&state, ride.id).await.unwrap();

        state.set_availability("driver@example.com", true, None);
        let err = accept(&state, ride.id, "driver@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let stored = state.rides.get(&ride.id).unwrap().clone();
        assert_eq!(stored.status, RideStatus::Cancelled);
    }
}
