use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;

use crate::geodesy::{distance_km, GeoPoint};
use crate::predict::error::PredictError;
use crate::predict::propagate;
use crate::predict::types::{PassCandidate, TleRecord};

const DEFAULT_LOOKAHEAD: Duration = Duration::hours(24);
const DEFAULT_STEP: Duration = Duration::seconds(60);
const DEFAULT_KEEP: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct MatcherSettings {
    pub lookahead: Duration,
    pub step: Duration,
    pub keep: usize,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
            step: DEFAULT_STEP,
            keep: DEFAULT_KEEP,
        }
    }
}

/// Bounded set of the `keep` closest candidates, ascending by distance.
///
/// Ties on distance order by timestamp, earliest first. Once full, a new
/// candidate only evicts the current worst if it is strictly closer.
#[derive(Debug, Clone)]
pub struct CandidateSet {
    keep: usize,
    items: Vec<PassCandidate>,
}

impl CandidateSet {
    pub fn new(keep: usize) -> Self {
        Self {
            keep,
            items: Vec::with_capacity(keep),
        }
    }

    /// Returns whether the candidate was admitted.
    pub fn offer(&mut self, candidate: PassCandidate) -> bool {
        if self.keep == 0 || !candidate.distance_km.is_finite() {
            return false;
        }

        if self.items.len() == self.keep {
            match self.items.last() {
                Some(worst) if candidate.distance_km < worst.distance_km => {
                    self.items.pop();
                }
                _ => return false,
            }
        }

        let index = self.items.partition_point(|existing| {
            existing.distance_km < candidate.distance_km
                || (existing.distance_km == candidate.distance_km
                    && existing.timestamp <= candidate.timestamp)
        });
        self.items.insert(index, candidate);
        true
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[PassCandidate] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<PassCandidate> {
        self.items
    }
}

pub fn rank_candidates<I>(candidates: I, keep: usize) -> Vec<PassCandidate>
where
    I: IntoIterator<Item = PassCandidate>,
{
    let mut set = CandidateSet::new(keep);
    for candidate in candidates {
        set.offer(candidate);
    }
    set.into_vec()
}

/// Closest sample of one satellite's ground track to `observer`.
fn closest_approach(
    tle: &TleRecord,
    observer: GeoPoint,
    at: DateTime<Utc>,
    settings: &MatcherSettings,
) -> Result<Option<PassCandidate>, PredictError> {
    let track = propagate(tle, at, settings.lookahead, settings.step)?;

    let mut best: Option<PassCandidate> = None;
    for sample in &track {
        let sample = sample?;
        let distance = distance_km(observer, sample.point);
        if best.as_ref().map_or(true, |b| distance < b.distance_km) {
            best = Some(PassCandidate {
                point: sample.point,
                distance_km: distance,
                timestamp: sample.timestamp,
                satellite: track.ephemeris().name().to_string(),
            });
        }
    }

    Ok(best)
}

/// Rank satellites by how close their ground track comes to `observer`
/// within the lookahead window. Each TLE contributes at most one candidate.
pub fn closest_passes(
    observer: GeoPoint,
    at: DateTime<Utc>,
    tles: &[TleRecord],
    settings: &MatcherSettings,
) -> Vec<PassCandidate> {
    let candidates: Vec<PassCandidate> = tles
        .par_iter()
        .filter_map(|tle| match closest_approach(tle, observer, at, settings) {
            Ok(candidate) => candidate,
            Err(e) => {
                log::warn!("Skipping TLE for {}: {}", tle.satellite, e);
                None
            }
        })
        .collect();

    rank_candidates(candidates, settings.keep)
}
