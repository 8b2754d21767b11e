/// Booking-time pricing: a flat base fare plus a per-kilometre rate.
/// Both values come from config so deployments can tune pricing without
/// a rebuild.
#[derive(Debug, Clone, Copy)]
pub struct FareSchedule {
    pub base_fare: f64,
    pub per_km_rate: f64,
}

impl FareSchedule {
    pub fn new(base_fare: f64, per_km_rate: f64) -> Self {
        Self {
            base_fare,
            per_km_rate,
        }
    }

    /// Fare for a trip of `distance_km`, rounded to 2 decimal places.
    pub fn quote(&self, distance_km: f64) -> f64 {
        round2(self.base_fare + self.per_km_rate * distance_km)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}
