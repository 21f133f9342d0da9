use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the catalogue's `value` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueProduct {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ContentDate", default)]
    pub content_date: Option<ContentDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDate {
    #[serde(rename = "Start")]
    pub start: Option<DateTime<Utc>>,
    #[serde(rename = "End")]
    pub end: Option<DateTime<Utc>>,
}

impl CatalogueProduct {
    /// Product name without the `.SAFE` container suffix.
    pub fn stem(&self) -> &str {
        self.name.strip_suffix(".SAFE").unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductListing {
    #[serde(default)]
    pub value: Vec<CatalogueProduct>,
}

/// A downloaded spectral band file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandAsset {
    pub band: String,
    pub path: PathBuf,
}

/// Filter parameters for one catalogue search.
#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub collection: String,
    pub product_type: String,
    pub aoi_wkt: String,
    pub max_cloud_cover: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ProductQuery {
    /// OData `$filter` expression; the content-date range is `[start, end)`.
    pub fn filter(&self) -> String {
        format!(
            "Collection/Name eq '{collection}' and \
             Attributes/OData.CSC.StringAttribute/any(att:att/Name eq 'productType' \
             and att/OData.CSC.StringAttribute/Value eq '{product_type}') and \
             OData.CSC.Intersects(area=geography'SRID=4326;{aoi}') and \
             ContentDate/Start ge {start} and \
             ContentDate/Start lt {end} and \
             Attributes/OData.CSC.DoubleAttribute/any(att:att/Name eq 'cloudCover' \
             and att/OData.CSC.DoubleAttribute/Value le {cloud})",
            collection = self.collection,
            product_type = self.product_type,
            aoi = self.aoi_wkt,
            start = self.start.to_rfc3339_opts(SecondsFormat::Millis, true),
            end = self.end.to_rfc3339_opts(SecondsFormat::Millis, true),
            cloud = self.max_cloud_cover,
        )
    }
}
