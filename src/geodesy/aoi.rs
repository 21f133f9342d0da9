use std::fmt;

use serde::Serialize;

use super::{destination_point, GeoPoint};

/// Axis-aligned lat/lon box around a centre point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub north_deg: f64,
    pub south_deg: f64,
    pub east_deg: f64,
    pub west_deg: f64,
}

impl BoundingBox {
    /// Box whose edges lie `radius_km` north, south, east and west of `center`.
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let north = destination_point(center, radius_km, 0.0);
        let south = destination_point(center, radius_km, 180.0);
        let east = destination_point(center, radius_km, 90.0);
        let west = destination_point(center, radius_km, 270.0);

        Self {
            north_deg: north.latitude_deg,
            south_deg: south.latitude_deg,
            east_deg: east.longitude_deg,
            west_deg: west.longitude_deg,
        }
    }

    /// Closed ring in (lon, lat) order, first vertex repeated as last.
    pub fn ring(&self) -> [(f64, f64); 5] {
        [
            (self.west_deg, self.south_deg),
            (self.east_deg, self.south_deg),
            (self.east_deg, self.north_deg),
            (self.west_deg, self.north_deg),
            (self.west_deg, self.south_deg),
        ]
    }

    pub fn to_wkt(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vertices: Vec<String> = self
            .ring()
            .iter()
            .map(|(lon, lat)| format!("{} {}", lon, lat))
            .collect();
        write!(f, "POLYGON(({}))", vertices.join(", "))
    }
}
