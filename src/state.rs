use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::collaborators::{CredentialStore, InMemoryCredentialStore, LogNotifier, Notifier};
use crate::config::Config;
use crate::engine::locator::{DriverSource, SyntheticDriverSource};
use crate::fare::FareSchedule;
use crate::geo::GeoPoint;
use crate::models::driver::{default_roster, DriverAvailability};
use crate::models::ride::Ride;
use crate::observability::metrics::Metrics;

/// A driver position report pushed over the realtime channel and fanned out
/// to every connected client.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LocationUpdate {
    pub driver_email: String,
    pub lat: f64,
    pub lng: f64,
}

pub struct AppState {
    pub rides: DashMap<Uuid, Ride>,
    pub availability: DashMap<String, DriverAvailability>,
    pub driver_source: Arc<dyn DriverSource>,
    pub fares: FareSchedule,
    pub credentials: Arc<dyn CredentialStore>,
    pub notifier: Arc<dyn Notifier>,
    pub location_events_tx: broadcast::Sender<LocationUpdate>,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(SyntheticDriverSource::new(default_roster())),
            Arc::new(InMemoryCredentialStore::new()),
            Arc::new(LogNotifier),
        )
    }

    pub fn with_collaborators(
        config: Config,
        driver_source: Arc<dyn DriverSource>,
        credentials: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (location_events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        Self {
            rides: DashMap::new(),
            availability: DashMap::new(),
            driver_source,
            fares: FareSchedule::new(config.base_fare, config.per_km_rate),
            credentials,
            notifier,
            location_events_tx,
            metrics: Metrics::new(),
            config,
        }
    }

    /// Idempotent availability upsert; creating and updating both succeed.
    pub fn set_availability(&self, driver_email: &str, online: bool, location: Option<GeoPoint>) {
        self.availability.insert(
            driver_email.to_string(),
            DriverAvailability {
                online,
                location,
                updated_at: chrono::Utc::now(),
            },
        );
    }

    /// Drivers never registered read as offline.
    pub fn is_available(&self, driver_email: &str) -> bool {
        self.availability
            .get(driver_email)
            .map(|entry| entry.online)
            .unwrap_or(false)
    }
}
