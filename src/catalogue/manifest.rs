use roxmltree::{Document, Node};

use crate::catalogue::error::CatalogueError;

/// Blue, green and red band codes in composite order.
pub const RGB_BANDS: [&str; 3] = ["B02", "B03", "B04"];

const GRANULE_PATH: [&str; 5] = [
    "General_Info",
    "Product_Info",
    "Product_Organisation",
    "Granule_List",
    "Granule",
];

/// Relative paths of the blue, green and red band files listed in an L1C
/// product manifest. Structural mismatches are logged and yield `None`.
pub fn parse_manifest(xml: &[u8]) -> Option<[String; 3]> {
    match try_parse_manifest(xml) {
        Ok(paths) => Some(paths),
        Err(e) => {
            log::warn!("Skipping manifest: {}", e);
            None
        }
    }
}

pub fn try_parse_manifest(xml: &[u8]) -> Result<[String; 3], CatalogueError> {
    let text = std::str::from_utf8(xml)
        .map_err(|e| CatalogueError::ManifestParse(format!("not UTF-8: {}", e)))?;
    let doc = Document::parse(text).map_err(|e| CatalogueError::ManifestParse(e.to_string()))?;

    let mut node = doc.root_element();
    for name in GRANULE_PATH {
        node = child(node, name).ok_or_else(|| {
            CatalogueError::ManifestParse(format!("missing element {}", name))
        })?;
    }

    let image_files: Vec<&str> = node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "IMAGE_FILE")
        .filter_map(|n| n.text())
        .map(str::trim)
        .collect();

    let find = |band: &str| -> Result<String, CatalogueError> {
        let suffix = format!("_{}", band);
        image_files
            .iter()
            .find(|f| f.ends_with(&suffix))
            .map(|f| f.to_string())
            .ok_or_else(|| CatalogueError::ManifestParse(format!("band {} not listed", band)))
    };

    Ok([find(RGB_BANDS[0])?, find(RGB_BANDS[1])?, find(RGB_BANDS[2])?])
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}
