use chrono::{DateTime, Duration, Utc};
use sgp4::{Constants, Elements};

use crate::geodesy::GeoPoint;
use crate::predict::error::PredictError;
use crate::predict::types::{GroundTrackPoint, TleRecord};

// WGS-84
const WGS84_A_KM: f64 = 6378.137;
const WGS84_E2: f64 = 0.00669437999014;

const ORBIT_SPAN: Duration = Duration::days(1);
const ORBIT_STEP: Duration = Duration::minutes(120);

/// Finest sampling step a ground track accepts.
pub const MIN_STEP: Duration = Duration::milliseconds(1);

/// Parsed orbital state for one satellite.
#[derive(Debug)]
pub struct Ephemeris {
    name: String,
    elements: Elements,
    constants: Constants,
}

impl Ephemeris {
    pub fn from_record(record: &TleRecord) -> Result<Self, PredictError> {
        let invalid = |message: String| PredictError::InvalidEphemeris {
            satellite: record.satellite.clone(),
            message,
        };

        let elements = Elements::from_tle(
            Some(record.satellite.clone()),
            record.line1.trim().as_bytes(),
            record.line2.trim().as_bytes(),
        )
        .map_err(|e| invalid(e.to_string()))?;
        let constants = Constants::from_elements(&elements).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            name: record.satellite.clone(),
            elements,
            constants,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Geodetic sub-satellite point at `timestamp`.
    pub fn sub_satellite_point(&self, timestamp: DateTime<Utc>) -> Result<GeoPoint, PredictError> {
        let minutes = self
            .elements
            .datetime_to_minutes_since_epoch(&timestamp.naive_utc())
            .map_err(|e| PredictError::Propagation(e.to_string()))?;

        let prediction = self
            .constants
            .propagate(minutes)
            .map_err(|e| PredictError::Propagation(e.to_string()))?;

        let sidereal = sgp4::iau_epoch_to_sidereal_time(sgp4::julian_years_since_j2000(
            &timestamp.naive_utc(),
        ));

        Ok(ecef_to_geodetic(teme_to_ecef_position(
            prediction.position,
            sidereal,
        )))
    }
}

/// Finite, restartable sequence of sub-satellite points.
#[derive(Debug)]
pub struct GroundTrack {
    ephemeris: Ephemeris,
    start: DateTime<Utc>,
    step: Duration,
    samples: i32,
}

impl GroundTrack {
    pub fn ephemeris(&self) -> &Ephemeris {
        &self.ephemeris
    }

    pub fn len(&self) -> usize {
        self.samples as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples == 0
    }

    pub fn iter(&self) -> GroundTrackIter<'_> {
        GroundTrackIter {
            track: self,
            index: 0,
        }
    }
}

impl<'a> IntoIterator for &'a GroundTrack {
    type Item = Result<GroundTrackPoint, PredictError>;
    type IntoIter = GroundTrackIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct GroundTrackIter<'a> {
    track: &'a GroundTrack,
    index: i32,
}

impl Iterator for GroundTrackIter<'_> {
    type Item = Result<GroundTrackPoint, PredictError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.track.samples {
            return None;
        }
        let timestamp = self.track.start + self.track.step * self.index;
        self.index += 1;

        Some(
            self.track
                .ephemeris
                .sub_satellite_point(timestamp)
                .map(|point| GroundTrackPoint { point, timestamp }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.track.samples - self.index).max(0) as usize;
        (remaining, Some(remaining))
    }
}

/// Ground track of `tle` sampled every `step` over `[start, start + duration]`.
pub fn propagate(
    tle: &TleRecord,
    start: DateTime<Utc>,
    duration: Duration,
    step: Duration,
) -> Result<GroundTrack, PredictError> {
    let ephemeris = Ephemeris::from_record(tle)?;

    if step < MIN_STEP || duration < Duration::zero() {
        return Err(PredictError::Propagation(format!(
            "invalid sampling: duration {} step {}",
            duration, step
        )));
    }

    let samples = duration.num_milliseconds() / step.num_milliseconds() + 1;

    Ok(GroundTrack {
        ephemeris,
        start,
        step,
        samples: i32::try_from(samples)
            .map_err(|_| PredictError::Propagation("too many samples".into()))?,
    })
}

/// Coarse one-day orbit outline for display.
pub fn orbit_track(tle: &TleRecord, start: DateTime<Utc>) -> Result<Vec<GeoPoint>, PredictError> {
    propagate(tle, start, ORBIT_SPAN, ORBIT_STEP)?
        .iter()
        .map(|p| p.map(|p| p.point))
        .collect()
}

pub fn teme_to_ecef_position(pos_teme: [f64; 3], gmst: f64) -> [f64; 3] {
    let cos_gmst = gmst.cos();
    let sin_gmst = gmst.sin();
    [
        pos_teme[0] * cos_gmst + pos_teme[1] * sin_gmst,
        -pos_teme[0] * sin_gmst + pos_teme[1] * cos_gmst,
        pos_teme[2],
    ]
}

pub fn ecef_to_geodetic(ecef_km: [f64; 3]) -> GeoPoint {
    let [x, y, z] = ecef_km;
    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    let mut lat = z.atan2(p * (1.0 - WGS84_E2));
    for _ in 0..6 {
        let sin_lat = lat.sin();
        let n = WGS84_A_KM / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        let alt = if lat.cos().abs() > 1e-9 {
            p / lat.cos() - n
        } else {
            z.abs() - n * (1.0 - WGS84_E2)
        };
        lat = z.atan2(p * (1.0 - WGS84_E2 * n / (n + alt)));
    }

    GeoPoint::new(lat.to_degrees(), lon.to_degrees())
}
