mod aoi;

pub use aoi::BoundingBox;

use serde::{Deserialize, Serialize};

/// Spherical Earth radius used for destination-point projection.
pub const EARTH_RADIUS_KM: f64 = 6378.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
}

impl GeoPoint {
    pub fn new(latitude_deg: f64, longitude_deg: f64) -> Self {
        Self {
            latitude_deg,
            longitude_deg,
        }
    }

    pub fn lat_rad(&self) -> f64 {
        self.latitude_deg.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.longitude_deg.to_radians()
    }
}

/// Great-circle distance between two points in kilometres (haversine).
pub fn distance_km(p1: GeoPoint, p2: GeoPoint) -> f64 {
    let dlat = p2.lat_rad() - p1.lat_rad();
    let dlon = p2.lon_rad() - p1.lon_rad();

    let a = (dlat / 2.0).sin().powi(2)
        + p1.lat_rad().cos() * p2.lat_rad().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());

    EARTH_RADIUS_KM * c
}

/// Point reached by travelling `distance_km` from `start` along `bearing_deg`
/// (0 = north, clockwise).
pub fn destination_point(start: GeoPoint, distance_km: f64, bearing_deg: f64) -> GeoPoint {
    let bearing = bearing_deg.to_radians();
    let lat = start.lat_rad();
    let lon = start.lon_rad();
    let angular = distance_km / EARTH_RADIUS_KM;

    let new_lat =
        (lat.sin() * angular.cos() + lat.cos() * angular.sin() * bearing.cos()).asin();
    let new_lon = lon
        + (bearing.sin() * angular.sin() * lat.cos())
            .atan2(angular.cos() - lat.sin() * new_lat.sin());

    GeoPoint::new(new_lat.to_degrees(), normalize_lon(new_lon.to_degrees()))
}

fn normalize_lon(lon_deg: f64) -> f64 {
    (lon_deg + 540.0).rem_euclid(360.0) - 180.0
}
