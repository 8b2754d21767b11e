use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::api::rest::parse_ride_id;
use crate::engine::lifecycle::{self, BookingRequest};
use crate::error::AppError;
use crate::fare::round2;
use crate::geo::{haversine_km, GeoPoint};
use crate::models::ride::Ride;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/book-ride", post(book_ride))
        .route("/cancel-ride", post(cancel_ride))
        .route("/calculate-fare", post(calculate_fare))
        .route("/rate-ride/:ride_id", post(rate_ride))
        .route("/rides", post(book_ride).get(list_rides))
        .route("/rides/user/:email", get(rides_for_user))
}

#[derive(Deserialize)]
pub struct BookRideRequest {
    pub rider_email: String,
    pub pickup: String,
    pub drop: String,
    /// [lat, lon]
    pub pickup_coords: [f64; 2],
    /// [lat, lon] — required; the booking fare is priced on the real drop
    /// point, not a placeholder offset.
    pub drop_coords: [f64; 2],
}

#[derive(Deserialize)]
pub struct CancelRideRequest {
    pub ride_id: String,
}

#[derive(Deserialize)]
pub struct FareRequest {
    pub pickup: [f64; 2],
    pub drop: [f64; 2],
}

#[derive(Serialize)]
pub struct FareResponse {
    pub distance: f64,
    pub fare: f64,
}

#[derive(Deserialize)]
pub struct RateRequest {
    pub rating: i64,
}

async fn book_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BookRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let request = BookingRequest {
        rider_email: payload.rider_email,
        pickup: payload.pickup,
        drop: payload.drop,
        pickup_coords: GeoPoint::new(payload.pickup_coords[0], payload.pickup_coords[1])?,
        drop_coords: GeoPoint::new(payload.drop_coords[0], payload.drop_coords[1])?,
    };

    let ride = lifecycle::book(&state, request).await?;
    Ok(Json(ride))
}

async fn cancel_ride(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CancelRideRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride_id = parse_ride_id(&payload.ride_id)?;
    let ride = lifecycle::cancel_by_rider(&state, ride_id).await?;
    Ok(Json(ride))
}

async fn calculate_fare(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FareRequest>,
) -> Result<Json<FareResponse>, AppError> {
    let pickup = GeoPoint::new(payload.pickup[0], payload.pickup[1])?;
    let drop = GeoPoint::new(payload.drop[0], payload.drop[1])?;

    let distance = haversine_km(&pickup, &drop);
    Ok(Json(FareResponse {
        distance: round2(distance),
        fare: state.fares.quote(distance),
    }))
}

async fn rate_ride(
    State(state): State<Arc<AppState>>,
    Path(ride_id): Path<String>,
    Json(payload): Json<RateRequest>,
) -> Result<Json<Ride>, AppError> {
    let ride_id = parse_ride_id(&ride_id)?;
    let ride = lifecycle::rate(&state, ride_id, payload.rating).await?;
    Ok(Json(ride))
}

async fn list_rides(State(state): State<Arc<AppState>>) -> Json<Vec<Ride>> {
    let mut rides: Vec<Ride> = state
        .rides
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(rides)
}

async fn rides_for_user(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Json<Vec<Ride>> {
    let mut rides: Vec<Ride> = state
        .rides
        .iter()
        .filter(|entry| entry.value().rider_email == email)
        .map(|entry| entry.value().clone())
        .collect();
    rides.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(rides)
}
