mod composite;
mod error;
mod geotransform;
mod tiler;

pub use composite::{composite_rgb, normalize, RgbComposite, GAIN, QUANTIFICATION};
pub use error::RasterError;
pub use geotransform::{world_file_path, GeoTransform};
pub use tiler::{crop_patches, patch_name, read_band, tile_path, Band16};
