use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::AppError;
use crate::fare::{round2, round6};
use crate::geo::{haversine_km, GeoPoint};
use crate::models::driver::{DriverCandidate, DriverProfile};

/// Minimum sampled distance from the pickup point, in km. Keeps synthesized
/// drivers from landing exactly on top of the rider.
const MIN_OFFSET_KM: f64 = 0.1;

/// How driver candidates are obtained. The matching endpoints only see this
/// trait, so a real telemetry feed can replace the synthetic source without
/// touching them.
pub trait DriverSource: Send + Sync {
    fn candidates_near(
        &self,
        center: &GeoPoint,
        count: usize,
        radius_km: f64,
    ) -> Result<Vec<DriverCandidate>, AppError>;
}

/// Synthesizes candidates by placing roster drivers at a random bearing and
/// distance from the pickup point. The roster is reference data supplied at
/// construction.
pub struct SyntheticDriverSource {
    roster: Vec<DriverProfile>,
}

impl SyntheticDriverSource {
    pub fn new(roster: Vec<DriverProfile>) -> Self {
        Self { roster }
    }
}

impl DriverSource for SyntheticDriverSource {
    fn candidates_near(
        &self,
        center: &GeoPoint,
        count: usize,
        radius_km: f64,
    ) -> Result<Vec<DriverCandidate>, AppError> {
        center.validate()?;
        if !radius_km.is_finite() || radius_km < MIN_OFFSET_KM {
            return Err(AppError::InvalidInput(format!(
                "radius_km must be at least {MIN_OFFSET_KM}, got {radius_km}"
            )));
        }

        let mut rng = rand::thread_rng();
        let picked: Vec<&DriverProfile> = self
            .roster
            .as_slice()
            .choose_multiple(&mut rng, count.min(self.roster.len()))
            .collect();

        let candidates = picked
            .into_iter()
            .map(|profile| {
                let bearing: f64 = rng.gen_range(0.0..std::f64::consts::TAU);
                let distance: f64 = rng.gen_range(MIN_OFFSET_KM..=radius_km);

                // Flat-earth offset: 1 degree of latitude is ~111 km,
                // longitude shrinks by cos(lat).
                let lat_offset = (distance * bearing.cos()) / 111.0;
                let lng_offset =
                    (distance * bearing.sin()) / (111.0 * center.lat.to_radians().cos());

                DriverCandidate {
                    id: profile.id,
                    name: profile.name.clone(),
                    vehicle_number: profile.vehicle_number.clone(),
                    location: GeoPoint {
                        lat: round6(center.lat + lat_offset),
                        lng: round6(center.lng + lng_offset),
                    },
                    distance_from_pickup: round2(distance),
                }
            })
            .collect();

        Ok(candidates)
    }
}

/// Sorted listing for the "find drivers" endpoints: ascending by the
/// sampled distance from the pickup point.
pub fn sort_by_distance(candidates: &mut [DriverCandidate]) {
    candidates.sort_by(|a, b| a.distance_from_pickup.total_cmp(&b.distance_from_pickup));
}

/// Linear scan for the candidate whose synthesized location is closest to
/// `center` by haversine distance. The sampled polar distance is ignored
/// here since the flat-earth placement drifts from it slightly. First
/// candidate wins ties.
pub fn nearest_driver<'a>(
    center: &GeoPoint,
    candidates: &'a [DriverCandidate],
) -> Option<(&'a DriverCandidate, f64)> {
    let mut best: Option<(&DriverCandidate, f64)> = None;

    for candidate in candidates {
        let distance = haversine_km(center, &candidate.location);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((candidate, distance)),
        }
    }

    best.map(|(candidate, distance)| (candidate, round2(distance)))
}
