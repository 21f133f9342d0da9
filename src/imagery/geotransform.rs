use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::imagery::error::RasterError;

const SIDECAR_EXTENSIONS: [&str; 3] = ["wld", "tfw", "j2w"];

/// Affine pixel-to-map transform in GDAL coefficient order:
/// `[origin_x, pixel_width, row_rotation, origin_y, column_rotation, pixel_height]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    pub const IDENTITY: GeoTransform = GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    /// Map coordinates of the top-left corner of pixel (x, y).
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [ox, pw, rr, oy, cr, ph] = self.0;
        (ox + x * pw + y * rr, oy + x * cr + y * ph)
    }

    /// Transform of a window whose top-left pixel is (x_off, y_off).
    pub fn window(&self, x_off: u32, y_off: u32) -> GeoTransform {
        let (ox, oy) = self.apply(x_off as f64, y_off as f64);
        let [_, pw, rr, _, cr, ph] = self.0;
        GeoTransform([ox, pw, rr, oy, cr, ph])
    }

    /// Transform from the raster's world-file sidecar, identity when there is none.
    pub fn for_raster(raster: &Path) -> Result<GeoTransform, RasterError> {
        match SIDECAR_EXTENSIONS
            .iter()
            .map(|ext| raster.with_extension(ext))
            .find(|path| path.exists())
        {
            Some(sidecar) => Self::read_world_file(&sidecar),
            None => Ok(GeoTransform::IDENTITY),
        }
    }

    pub fn read_world_file(path: &Path) -> Result<GeoTransform, RasterError> {
        let content = fs::read_to_string(path).map_err(|e| RasterError::WorldFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let values: Vec<f64> = content
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| RasterError::WorldFile {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let [a, d, b, e, c, f]: [f64; 6] =
            values.try_into().map_err(|v: Vec<f64>| RasterError::WorldFile {
                path: path.to_path_buf(),
                message: format!("expected 6 values, found {}", v.len()),
            })?;

        // World files reference pixel centres.
        Ok(GeoTransform([
            c - a / 2.0 - b / 2.0,
            a,
            b,
            f - d / 2.0 - e / 2.0,
            d,
            e,
        ]))
    }

    pub fn write_world_file(&self, path: &Path) -> io::Result<()> {
        let [ox, pw, rr, oy, cr, ph] = self.0;
        let centre_x = ox + pw / 2.0 + rr / 2.0;
        let centre_y = oy + cr / 2.0 + ph / 2.0;
        fs::write(
            path,
            format!("{}\n{}\n{}\n{}\n{}\n{}\n", pw, cr, rr, ph, centre_x, centre_y),
        )
    }
}

pub fn world_file_path(raster: &Path) -> PathBuf {
    raster.with_extension("wld")
}
