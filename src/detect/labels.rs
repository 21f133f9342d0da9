use std::fs;
use std::path::Path;

use crate::detect::error::DetectError;
use crate::detect::Detection;

/// Parse `class x1 y1 x2 y2 x3 y3 x4 y4` lines. Blank lines are ignored.
pub fn parse_labels(path: &Path, content: &str) -> Result<Vec<Detection>, DetectError> {
    let mut detections = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bad = |message: String| DetectError::Labels {
            path: path.to_path_buf(),
            line: index + 1,
            message,
        };

        let mut fields = line.split_whitespace();
        let class_id = fields
            .next()
            .and_then(|c| c.parse::<u32>().ok())
            .ok_or_else(|| bad("missing class id".to_string()))?;

        let coords: Vec<f32> = fields
            .map(|v| v.parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| bad(e.to_string()))?;
        let points: [f32; 8] = coords
            .try_into()
            .map_err(|c: Vec<f32>| bad(format!("expected 8 coordinates, found {}", c.len())))?;

        detections.push(Detection { class_id, points });
    }
    Ok(detections)
}

pub fn read_labels(path: &Path) -> Result<Vec<Detection>, DetectError> {
    let content = fs::read_to_string(path)?;
    parse_labels(path, &content)
}

/// Scale pixel coordinates into [0, 1] by image width (x) and height (y).
pub fn normalize(detection: &Detection, width: u32, height: u32) -> Detection {
    let mut points = detection.points;
    for (i, v) in points.iter_mut().enumerate() {
        let extent = if i % 2 == 0 { width } else { height };
        *v = (*v / extent.max(1) as f32).clamp(0.0, 1.0);
    }
    Detection {
        class_id: detection.class_id,
        points,
    }
}

pub fn write_labels(path: &Path, detections: &[Detection]) -> Result<(), DetectError> {
    let body: String = detections
        .iter()
        .map(|d| {
            let coords: Vec<String> = d.points.iter().map(|v| v.to_string()).collect();
            format!("{} {}\n", d.class_id, coords.join(" "))
        })
        .collect();
    fs::write(path, body)?;
    Ok(())
}
