//! Realtime channel: clients push driver location updates, which fan out to
//! every connected client, and may ask for driver candidates on demand.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::engine::locator::sort_by_distance;
use crate::geo::GeoPoint;
use crate::state::{AppState, LocationUpdate};

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    LocationUpdate {
        driver_email: String,
        lat: f64,
        lng: f64,
    },
    RequestDrivers {
        lat: f64,
        lon: f64,
        radius: Option<f64>,
        count: Option<usize>,
    },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.location_events_tx.subscribe();

    info!("websocket client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(update) => {
                    let payload = json!({
                        "type": "driver_location",
                        "driver_email": update.driver_email,
                        "lat": update.lat,
                        "lng": update.lng,
                    });
                    if send_json(&mut sender, payload).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client lagging behind location events");
                }
                Err(RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if handle_client_message(&state, &mut sender, &text).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("websocket client disconnected");
}

async fn handle_client_message(
    state: &AppState,
    sender: &mut SplitSink<WebSocket, Message>,
    text: &str,
) -> Result<(), axum::Error> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            return send_json(
                sender,
                json!({ "type": "error", "message": format!("invalid message: {err}") }),
            )
            .await;
        }
    };

    match message {
        ClientMessage::LocationUpdate {
            driver_email,
            lat,
            lng,
        } => {
            // Nobody listening is fine; broadcast just drops the event.
            let _ = state.location_events_tx.send(LocationUpdate {
                driver_email,
                lat,
                lng,
            });
            Ok(())
        }
        ClientMessage::RequestDrivers {
            lat,
            lon,
            radius,
            count,
        } => {
            let response = GeoPoint::new(lat, lon)
                .and_then(|center| {
                    let mut drivers = state.driver_source.candidates_near(
                        &center,
                        count.unwrap_or(state.config.default_driver_count),
                        radius.unwrap_or(state.config.default_radius_km),
                    )?;
                    sort_by_distance(&mut drivers);
                    Ok(json!({
                        "type": "drivers_found",
                        "pickup_location": center,
                        "drivers": drivers,
                    }))
                })
                .unwrap_or_else(|err| {
                    json!({ "type": "error", "message": err.to_string() })
                });

            send_json(sender, response).await
        }
    }
}

async fn send_json(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: serde_json::Value,
) -> Result<(), axum::Error> {
    let text = payload.to_string();
    sender.send(Message::Text(text)).await
}
