use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub ride_transitions_total: IntCounterVec,
    pub active_rides: IntGauge,
    pub driver_search_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let ride_transitions_total = IntCounterVec::new(
            Opts::new(
                "ride_transitions_total",
                "Ride lifecycle transitions by operation and outcome",
            ),
            &["operation", "outcome"],
        )
        .expect("valid ride_transitions_total metric");

        let active_rides = IntGauge::new(
            "active_rides",
            "Rides currently booked or ongoing",
        )
        .expect("valid active_rides metric");

        let driver_search_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "driver_search_latency_seconds",
                "Latency of driver candidate searches in seconds",
            ),
            &["endpoint"],
        )
        .expect("valid driver_search_latency_seconds metric");

        registry
            .register(Box::new(ride_transitions_total.clone()))
            .expect("register ride_transitions_total");
        registry
            .register(Box::new(active_rides.clone()))
            .expect("register active_rides");
        registry
            .register(Box::new(driver_search_latency_seconds.clone()))
            .expect("register driver_search_latency_seconds");

        Self {
            registry,
            ride_transitions_total,
            active_rides,
            driver_search_latency_seconds,
        }
    }

    pub fn record_transition(&self, operation: &str, outcome: &str) {
        self.ride_transitions_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
