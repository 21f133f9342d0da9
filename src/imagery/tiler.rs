use std::fs;
use std::path::{Path, PathBuf};

use image::{imageops, ImageBuffer, ImageReader, Luma};
use rayon::prelude::*;

use crate::catalogue::BandAsset;
use crate::imagery::error::RasterError;
use crate::imagery::geotransform::{world_file_path, GeoTransform};

pub type Band16 = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Path of one band of one patch: `{patch_name}_{band}.tif`.
pub fn tile_path(dir: &Path, patch_name: &str, band: &str) -> PathBuf {
    dir.join(format!("{}_{}.tif", patch_name, band))
}

pub fn patch_name(out_name: &str, y_off: u32, x_off: u32) -> String {
    format!("{}_patch_y{}_x{}", out_name, y_off, x_off)
}

/// Decode a single-band raster as 16-bit luminance. The format is sniffed from content.
pub fn read_band(path: &Path) -> Result<Band16, RasterError> {
    if !path.exists() {
        return Err(RasterError::Missing(path.to_path_buf()));
    }
    let decode = |source: image::ImageError| RasterError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode)?;
    Ok(image.into_luma16())
}

/// Slice every band into `patch`-sized windows advanced by `step` (both width x height).
///
/// Windows running past the raster edge are zero-padded. Each tile gets a `.wld` sidecar
/// with the window's transform. Bands that are missing, undecodable or smaller than a
/// patch are skipped. Returns the distinct patch names in raster order.
pub fn crop_patches(
    bands: &[BandAsset],
    patch: (u32, u32),
    step: (u32, u32),
    out_dir: &Path,
    out_name: &str,
) -> Result<Vec<String>, RasterError> {
    if step.0 == 0 || step.1 == 0 {
        return Err(RasterError::InvalidStep(step.0, step.1));
    }
    fs::create_dir_all(out_dir)?;

    let results: Vec<Result<Vec<String>, RasterError>> = bands
        .par_iter()
        .map(|band| crop_band(band, patch, step, out_dir, out_name))
        .collect();

    let mut names: Vec<String> = Vec::new();
    for (band, result) in bands.iter().zip(results) {
        match result {
            Ok(band_names) => {
                log::debug!("Band {} cut into {} patches", band.band, band_names.len());
                for name in band_names {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => log::warn!("Skipping band {}: {}", band.band, e),
        }
    }

    Ok(names)
}

fn crop_band(
    band: &BandAsset,
    patch: (u32, u32),
    step: (u32, u32),
    out_dir: &Path,
    out_name: &str,
) -> Result<Vec<String>, RasterError> {
    let raster = read_band(&band.path)?;
    let (width, height) = raster.dimensions();
    if patch.0 > width || patch.1 > height {
        return Err(RasterError::PatchTooLarge {
            patch_width: patch.0,
            patch_height: patch.1,
            width,
            height,
        });
    }
    let transform = GeoTransform::for_raster(&band.path)?;

    let mut names = Vec::new();
    for y_off in (0..height).step_by(step.1 as usize) {
        for x_off in (0..width).step_by(step.0 as usize) {
            let window = imageops::crop_imm(&raster, x_off, y_off, patch.0, patch.1).to_image();
            let mut tile: Band16 = ImageBuffer::new(patch.0, patch.1);
            imageops::replace(&mut tile, &window, 0, 0);

            let name = patch_name(out_name, y_off, x_off);
            let path = tile_path(out_dir, &name, &band.band);
            tile.save(&path).map_err(|source| RasterError::Write {
                path: path.clone(),
                source,
            })?;
            transform
                .window(x_off, y_off)
                .write_world_file(&world_file_path(&path))?;
            names.push(name);
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a band raster filled with `value` and return its asset.
    fn write_band(
        dir: &Path,
        band: &str,
        width: u32,
        height: u32,
        value: u16,
    ) -> BandAsset {
        let path = dir.join(format!("scene_{}.tif", band));
        let raster: Band16 = ImageBuffer::from_pixel(width, height, Luma([value]));
        raster.save(&path).unwrap();
        BandAsset {
            band: band.to_string(),
            path,
        }
    }

    #[test]
    fn cuts_full_grid_with_shifted_transforms() {
        let dir = tempfile::tempdir().unwrap();
        let band = write_band(dir.path(), "B04", 2000, 2000, 1200);
        GeoTransform([600000.0, 10.0, 0.0, 200040.0, 0.0, -10.0])
            .write_world_file(&world_file_path(&band.path))
            .unwrap();
        let out = dir.path().join("patches");

        let names = crop_patches(&[band], (1024, 1024), (1024, 1024), &out, "scene").unwrap();

        assert_eq!(
            names,
            vec![
                "scene_patch_y0_x0",
                "scene_patch_y0_x1024",
                "scene_patch_y1024_x0",
                "scene_patch_y1024_x1024",
            ]
        );

        let corner = tile_path(&out, "scene_patch_y1024_x1024", "B04");
        let transform = GeoTransform::read_world_file(&world_file_path(&corner)).unwrap();
        approx::assert_relative_eq!(transform.0[0], 610240.0, epsilon = 1e-6);
        approx::assert_relative_eq!(transform.0[3], 189800.0, epsilon = 1e-6);
    }

    #[test]
    fn edge_patches_are_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let band = write_band(dir.path(), "B02", 48, 48, 500);
        let out = dir.path().join("patches");

        let names = crop_patches(&[band], (32, 32), (32, 32), &out, "scene").unwrap();
        assert_eq!(names.len(), 4);

        let edge = read_band(&tile_path(&out, "scene_patch_y32_x32", "B02")).unwrap();
        assert_eq!(edge.dimensions(), (32, 32));
        assert_eq!(edge.get_pixel(15, 15).0[0], 500);
        assert_eq!(edge.get_pixel(16, 16).0[0], 0);
    }

    #[test]
    fn patch_larger_than_raster_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let band = write_band(dir.path(), "B03", 16, 16, 1);
        let out = dir.path().join("patches");

        let names = crop_patches(&[band], (32, 32), (32, 32), &out, "scene").unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn missing_band_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let present = write_band(dir.path(), "B02", 32, 32, 1);
        let missing = BandAsset {
            band: "B03".to_string(),
            path: dir.path().join("absent.tif"),
        };
        let out = dir.path().join("patches");

        let names =
            crop_patches(&[present, missing], (32, 32), (32, 32), &out, "scene").unwrap();
        assert_eq!(names, vec!["scene_patch_y0_x0"]);
        assert!(tile_path(&out, "scene_patch_y0_x0", "B02").exists());
        assert!(!tile_path(&out, "scene_patch_y0_x0", "B03").exists());
    }

    #[test]
    fn band_with_corrupt_world_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let corrupt = write_band(dir.path(), "B02", 32, 32, 1);
        fs::write(world_file_path(&corrupt.path), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let good = write_band(dir.path(), "B03", 32, 32, 1);
        let out = dir.path().join("patches");

        let names = crop_patches(&[corrupt, good], (32, 32), (32, 32), &out, "scene").unwrap();
        assert_eq!(names, vec!["scene_patch_y0_x0"]);
        assert!(!tile_path(&out, "scene_patch_y0_x0", "B02").exists());
        assert!(tile_path(&out, "scene_patch_y0_x0", "B03").exists());
    }

    #[test]
    fn zero_step_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            crop_patches(&[], (32, 32), (0, 32), dir.path(), "scene"),
            Err(RasterError::InvalidStep(0, 32))
        ));
    }
}
