use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::parse_ride_id;
use crate::engine::locator::{nearest_driver, sort_by_distance};
use crate::engine::{lifecycle, reporting};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::driver::{DriverAvailability, DriverCandidate};
use crate::models::ride::{Ride, RideStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/match-driver", post(match_driver))
        .route("/find-drivers", post(find_drivers))
        .route("/drivers/near/:lat/:lon", get(drivers_near))
        .route("/driver/status", post(update_status))
        .route("/driver/accept-ride", post(accept_ride))
        .route("/driver/complete-ride", post(complete_ride))
        .route("/driver/cancel-ride", post(cancel_ride))
        .route("/driver/available-rides", get(available_rides))
        .route("/driver/my-rides/:email", get(my_rides))
        .route("/driver/earnings/:email", get(earnings))
        .route("/driver/:email/rating", get(rating))
}

#[derive(Deserialize)]
pub struct MatchDriverRequest {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Serialize)]
pub struct MatchDriverResponse {
    pub driver: DriverCandidate,
    pub distance_km: f64,
    pub all_nearby_drivers: Vec<DriverCandidate>,
}

#[derive(Deserialize)]
pub struct FindDriversRequest {
    pub pickup_lat: f64,
    pub pickup_lon: f64,
    pub radius_km: Option<f64>,
    pub num_drivers: Option<usize>,
}

#[derive(Serialize)]
pub struct FindDriversResponse {
    pub pickup_location: GeoPoint,
    pub search_radius_km: f64,
    pub drivers_found: usize,
    pub drivers: Vec<DriverCandidate>,
}

#[derive(Deserialize)]
pub struct NearQuery {
    pub radius: Option<f64>,
    pub count: Option<usize>,
}

#[derive(Serialize)]
pub struct DriversNearResponse {
    pub location: GeoPoint,
    pub drivers: Vec<DriverCandidate>,
}

#[derive(Deserialize)]
pub struct StatusRequest {
    pub driver_email: String,
    pub is_available: bool,
    pub location: Option<GeoPoint>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub driver_email: String,
    #[serde(flatten)]
    pub record: DriverAvailability,
}

#[derive(Deserialize)]
pub struct RideActionRequest {
    pub ride_id: String,
    pub driver_email: String,
}

#[derive(Serialize)]
pub struct EarningsResponse {
    pub driver_email: String,
    pub completed_rides: usize,
    pub earnings: f64,
}

#[derive(Serialize)]
pub struct RatingResponse {
    pub driver_email: String,
    pub rating: f64,
}

async fn match_driver(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MatchDriverRequest>,
) -> Result<Json<MatchDriverResponse>, AppError> {
    let start = Instant::now();
    let center = GeoPoint::new(payload.lat, payload.lon)?;

    let candidates = state.driver_source.candidates_near(
        &center,
        state.config.default_driver_count,
        state.config.default_radius_km,
    )?;

    let (winner, distance_km) = nearest_driver(&center, &candidates)
        .ok_or_else(|| AppError::NotFound("no drivers available near this point".to_string()))?;
    let winner = winner.clone();

    state
        .metrics
        .driver_search_latency_seconds
        .with_label_values(&["match_driver"])
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(MatchDriverResponse {
        driver: winner,
        distance_km,
        all_nearby_drivers: candidates,
    }))
}

async fn find_drivers(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FindDriversRequest>,
) -> Result<Json<FindDriversResponse>, AppError> {
    let start = Instant::now();
    let center = GeoPoint::new(payload.pickup_lat, payload.pickup_lon)?;
    let radius_km = payload.radius_km.unwrap_or(state.config.default_radius_km);
    let count = payload
        .num_drivers
        .unwrap_or(state.config.default_driver_count);

    let mut drivers = state
        .driver_source
        .candidates_near(&center, count, radius_km)?;
    sort_by_distance(&mut drivers);

    state
        .metrics
        .driver_search_latency_seconds
        .with_label_values(&["find_drivers"])
        .observe(start.elapsed().as_secs_f64());

    Ok(Json(FindDriversResponse {
        pickup_location: center,
        search_radius_km: radius_km,
        drivers_found: drivers.len(),
        drivers,
    }))
}

async fn drivers_near(
    State(state): State<Arc<AppState>>,
    Path((lat, lon)): Path<(f64, f64)>,
    Query(query): Query<NearQuery>,
) -> Result<Json<DriversNearResponse>, AppError> {
    let center = GeoPoint::new(lat, lon)?;
    let radius_km = query.radius.unwrap_or(state.config.default_radius_km);
    let count = query.count.unwrap_or(state.config.default_driver_count);

    let mut drivers = state
        .driver_source
        .candidates_near(&center, count, radius_km)?;
    sort_by_distance(&mut drivers);

    Ok(Json(DriversNearResponse {
        location: center,
        drivers,
    }))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    if payload.driver_email.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "driver_email cannot be empty".to_string(),
        ));
    }
    if let Some(location) = &payload.location {
        location.validate()?;
    }

    state.set_availability(&payload.driver_email, payload.is_available, payload.location);
    let record = state
        .availability
        .get(&payload.driver_email)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::Internal("availability upsert lost".to_string()))?;

    Ok(Json(StatusResponse {
        driver_email: payload.driver_email,
        record,
    }))
}

async fn accept_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RideActionRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride_id = parse_ride_id(&payload.ride_id)?;
    let ride = lifecycle::accept(&state, ride_id, &payload.driver_email).await?;
    Ok(Json(ride))
}

async fn complete_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RideActionRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride_id = parse_ride_id(&payload.ride_id)?;
    let ride = lifecycle::complete(&state, ride_id, &payload.driver_email).await?;
    Ok(Json(ride))
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RideActionRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride_id = parse_ride_id(&payload.ride_id)?;
    let ride = lifecycle::cancel_by_driver(&state, ride_id, &payload.driver_email).await?;
    Ok(Json(ride))
}

async fn available_rides(State(state): State<Arc<AppState>>) -> Json<Vec<Ride>> {
    let mut rides: Vec<Ride> = state
        .rides
        .iter()
        .filter(|entry| entry.value().status == RideStatus::Booked)
        .map(|entry| entry.value().clone())
        .collect();
    rides.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(rides)
}

async fn my_rides(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Json<Vec<Ride>> {
    let mut rides: Vec<Ride> = state
        .rides
        .iter()
        .filter(|entry| entry.value().driver_email.as_deref() == Some(email.as_str()))
        .map(|entry| entry.value().clone())
        .collect();
    rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(rides)
}

async fn earnings(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Json<EarningsResponse> {
    let completed_rides = state
        .rides
        .iter()
        .filter(|entry| {
            let ride = entry.value();
            ride.status == RideStatus::Completed
                && ride.driver_email.as_deref() == Some(email.as_str())
        })
        .count();

    Json(EarningsResponse {
        earnings: reporting::driver_earnings(&state, &email),
        completed_rides,
        driver_email: email,
    })
}

async fn rating(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Json<RatingResponse> {
    Json(RatingResponse {
        rating: reporting::driver_rating(&state, &email),
        driver_email: email,
    })
}
