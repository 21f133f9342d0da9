mod error;
mod pass_finder;
mod propagation;
mod tle_loader;
mod types;

pub use error::PredictError;
pub use pass_finder::{closest_passes, rank_candidates, CandidateSet, MatcherSettings};
pub use propagation::{orbit_track, propagate, Ephemeris, GroundTrack, MIN_STEP};
pub use tle_loader::TleLoader;
pub use types::{GroundTrackPoint, PassCandidate, TleRecord};

#[cfg(test)]
pub(crate) use propagation::tests::{epoch_start, iss};
