use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::detect::error::DetectError;
use crate::detect::Detection;

const BOX_COLOUR: Rgb<u8> = Rgb([255, 48, 48]);

/// Outline each normalized oriented box on the image.
pub fn draw_detections(image: &mut RgbImage, detections: &[Detection]) {
    let (width, height) = (image.width() as f32, image.height() as f32);
    for detection in detections {
        let corners: Vec<(f32, f32)> = detection
            .points
            .chunks_exact(2)
            .map(|p| (p[0] * width, p[1] * height))
            .collect();
        for i in 0..corners.len() {
            let next = corners[(i + 1) % corners.len()];
            draw_line_segment_mut(image, corners[i], next, BOX_COLOUR);
        }
    }
}

pub fn render_to(
    source: &Path,
    target: &Path,
    detections: &[Detection],
) -> Result<(), DetectError> {
    let mut image = image::open(source)
        .map_err(|source_err| DetectError::Image {
            path: source.to_path_buf(),
            source: source_err,
        })?
        .into_rgb8();
    draw_detections(&mut image, detections);
    image.save(target).map_err(|e| DetectError::Image {
        path: target.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outlines_box_edges() {
        let mut image = RgbImage::new(100, 100);
        let detection = Detection {
            class_id: 0,
            points: [0.2, 0.2, 0.8, 0.2, 0.8, 0.8, 0.2, 0.8],
        };
        draw_detections(&mut image, &[detection]);

        assert_eq!(*image.get_pixel(50, 20), BOX_COLOUR);
        assert_eq!(*image.get_pixel(80, 50), BOX_COLOUR);
        assert_eq!(*image.get_pixel(50, 50), Rgb([0, 0, 0]));
    }
}
