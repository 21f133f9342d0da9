use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geodesy::GeoPoint;

/// A two-line element set as delivered by the TLE feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TleRecord {
    pub satellite: String,
    pub line1: String,
    pub line2: String,
    pub created_at: DateTime<Utc>,
}

/// Sub-satellite point at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundTrackPoint {
    pub point: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

/// Closest approach of one satellite to an observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassCandidate {
    pub point: GeoPoint,
    pub distance_km: f64,
    pub timestamp: DateTime<Utc>,
    pub satellite: String,
}
