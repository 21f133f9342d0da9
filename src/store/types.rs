use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geodesy::GeoPoint;
use crate::store::error::StoreError;

const FRESHNESS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a position-fix timestamp, `YYYY-MM-DD HH:MM:SS` with an optional
/// trailing zone name. Always read as UTC.
pub fn parse_freshness(value: &str) -> Result<DateTime<Utc>, StoreError> {
    let trimmed = value.trim();
    let stamp = match trimmed.get(..19) {
        Some(head) if trimmed[19..].trim().chars().all(|c| c.is_ascii_alphabetic()) => head,
        _ => trimmed,
    };
    NaiveDateTime::parse_from_str(stamp, FRESHNESS_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| StoreError::InvalidTimestamp(value.to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vessel {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub statuses: Vec<VesselStatus>,
}

/// One AIS position fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselStatus {
    pub id: String,
    /// Owning vessel; filled in from the enclosing record when loaded.
    #[serde(default)]
    pub vessel_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub course: f64,
    #[serde(default)]
    pub status: Option<i32>,
    pub timestamp: String,
}

impl VesselStatus {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn freshness(&self) -> Result<DateTime<Utc>, StoreError> {
        parse_freshness(&self.timestamp)
    }
}

/// A persisted satellite overflight with its corroborating image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatPass {
    pub status_id: String,
    pub satellite: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub image: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn freshness_plain_and_zoned() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(parse_freshness("2024-03-01 12:30:05").unwrap(), expected);
        assert_eq!(parse_freshness("2024-03-01 12:30:05 UTC").unwrap(), expected);
    }

    #[test]
    fn freshness_rejects_other_formats() {
        assert!(matches!(
            parse_freshness("01/03/2024 12:30"),
            Err(StoreError::InvalidTimestamp(_))
        ));
        assert!(parse_freshness("2024-03-01 12:30:05 +02:00").is_err());
    }

    #[test]
    fn vessel_yaml_defaults() {
        let vessel: Vessel = serde_yaml::from_str(
            "id: '563012345'\nstatuses:\n  - id: s1\n    latitude: 1.0\n    longitude: 103.0\n    timestamp: '2020-07-13 00:00:00'\n",
        )
        .unwrap();
        assert_eq!(vessel.statuses[0].speed, 0.0);
        assert_eq!(vessel.statuses[0].position(), GeoPoint::new(1.0, 103.0));
    }
}
