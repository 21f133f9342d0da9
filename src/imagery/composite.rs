use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::catalogue::RGB_BANDS;
use crate::imagery::error::RasterError;
use crate::imagery::tiler::{read_band, tile_path, Band16};

/// Brightness gain applied to top-of-atmosphere reflectance.
pub const GAIN: f32 = 2.0;
/// Digital numbers per unit reflectance.
pub const QUANTIFICATION: f32 = 10000.0;

pub fn normalize(dn: u16) -> f32 {
    (dn as f32 * GAIN / QUANTIFICATION).clamp(0.0, 1.0)
}

/// Normalized true-colour pixels, row-major.
#[derive(Debug, Clone)]
pub struct RgbComposite {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 3]>,
}

impl RgbComposite {
    pub fn from_bands(red: &Band16, green: &Band16, blue: &Band16) -> Result<Self, RasterError> {
        let dims = red.dimensions();
        if green.dimensions() != dims || blue.dimensions() != dims {
            return Err(RasterError::DimensionMismatch(format!(
                "red {:?}, green {:?}, blue {:?}",
                dims,
                green.dimensions(),
                blue.dimensions()
            )));
        }

        let pixels = red
            .pixels()
            .zip(green.pixels())
            .zip(blue.pixels())
            .map(|((r, g), b)| [normalize(r.0[0]), normalize(g.0[0]), normalize(b.0[0])])
            .collect();

        Ok(Self {
            width: dims.0,
            height: dims.1,
            pixels,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[[f32; 3]] {
        &self.pixels
    }

    pub fn to_rgb8(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let [r, g, b] = self.pixels[(y * self.width + x) as usize];
            Rgb([to_byte(r), to_byte(g), to_byte(b)])
        })
    }
}

fn to_byte(v: f32) -> u8 {
    (v * 255.0).round() as u8
}

/// Build `{out_name}_RGB.jpg` from the B04/B03/B02 tiles of one patch.
///
/// Returns `Ok(None)` when any of the three band tiles is absent.
pub fn composite_rgb(
    patches_dir: &Path,
    out_dir: &Path,
    out_name: &str,
) -> Result<Option<PathBuf>, RasterError> {
    // RGB_BANDS is ordered blue, green, red.
    let mut tiles = Vec::with_capacity(3);
    for band in RGB_BANDS.iter().rev() {
        let path = tile_path(patches_dir, out_name, band);
        if !path.exists() {
            log::warn!("Patch {} has no {} tile, skipping composite", out_name, band);
            return Ok(None);
        }
        tiles.push(read_band(&path)?);
    }

    let composite = RgbComposite::from_bands(&tiles[0], &tiles[1], &tiles[2])?;

    fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!("{}_RGB.jpg", out_name));
    composite
        .to_rgb8()
        .save(&path)
        .map_err(|source| RasterError::Write {
            path: path.clone(),
            source,
        })?;

    log::debug!("Wrote composite {}", path.display());
    Ok(Some(path))
}
