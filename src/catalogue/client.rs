use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};

use crate::catalogue::error::CatalogueError;
use crate::catalogue::types::{BandAsset, CatalogueProduct, ProductListing, ProductQuery};

pub const MANIFEST_NODE: &str = "MTD_MSIL1C.xml";

const DEFAULT_MAX_REDIRECTS: usize = 10;
const REDIRECT_STATUSES: [u16; 4] = [301, 302, 303, 307];

/// Blocking client for an OData product catalogue.
#[derive(Clone)]
pub struct CatalogueClient {
    http: Client,
    base_url: String,
    max_redirects: usize,
    band_extension: Option<String>,
}

impl CatalogueClient {
    /// HTTP client that leaves redirects to the catalogue client.
    pub fn http_client(timeout: Duration) -> Result<Client, CatalogueError> {
        Ok(Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?)
    }

    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            band_extension: None,
        }
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Extension appended to band node names that carry none (`jp2` for L1C).
    pub fn with_band_extension(mut self, extension: Option<String>) -> Self {
        self.band_extension = extension.filter(|e| !e.is_empty());
        self
    }

    pub fn query(&self, query: &ProductQuery) -> Result<Vec<CatalogueProduct>, CatalogueError> {
        let url = Url::parse_with_params(
            &format!("{}/Products", self.base_url),
            &[("$filter", query.filter())],
        )
        .map_err(|e| CatalogueError::InvalidUrl(e.to_string()))?;

        log::debug!("Catalogue query {} .. {}", query.start, query.end);
        let response = self.http.get(url).send()?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().unwrap_or_default();
            return Err(CatalogueError::Query {
                status: status.as_u16(),
                body,
            });
        }

        let listing: ProductListing = response.json()?;
        Ok(listing.value)
    }

    pub fn manifest_url(&self, product: &CatalogueProduct) -> String {
        format!(
            "{}/Products('{}')/Nodes({})/Nodes({})/$value",
            self.base_url, product.id, product.name, MANIFEST_NODE
        )
    }

    pub fn download_manifest(
        &self,
        token: &str,
        product: &CatalogueProduct,
    ) -> Result<Vec<u8>, CatalogueError> {
        let response = self.get_following_redirects(&self.manifest_url(product), token)?;
        Ok(response.bytes()?.to_vec())
    }

    /// Node URL for a band path such as `GRANULE/<g>/IMG_DATA/<file>`.
    pub fn band_url(
        &self,
        product: &CatalogueProduct,
        band_path: &str,
    ) -> Result<String, CatalogueError> {
        let nodes = self.band_nodes(band_path)?;
        let mut url = format!(
            "{}/Products('{}')/Nodes({})",
            self.base_url, product.id, product.name
        );
        for node in &nodes {
            url.push_str(&format!("/Nodes({})", node));
        }
        url.push_str("/$value");
        Ok(url)
    }

    fn band_nodes(&self, band_path: &str) -> Result<Vec<String>, CatalogueError> {
        let mut nodes: Vec<String> = band_path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if nodes.len() < 4 {
            return Err(CatalogueError::InvalidBandPath(band_path.to_string()));
        }
        if let (Some(last), Some(ext)) = (nodes.last_mut(), &self.band_extension) {
            if Path::new(last.as_str()).extension().is_none() {
                last.push('.');
                last.push_str(ext);
            }
        }
        Ok(nodes)
    }

    /// Download one band to `out_dir/{out_name}_{suffix}`.
    pub fn download_band(
        &self,
        token: &str,
        product: &CatalogueProduct,
        band_path: &str,
        out_dir: &Path,
        out_name: &str,
    ) -> Result<BandAsset, CatalogueError> {
        let url = self.band_url(product, band_path)?;
        let nodes = self.band_nodes(band_path)?;
        let file_node = nodes
            .last()
            .ok_or_else(|| CatalogueError::InvalidBandPath(band_path.to_string()))?;
        let suffix = file_node.rsplit('_').next().unwrap_or(file_node);
        let band = suffix.split('.').next().unwrap_or(suffix).to_string();

        let mut response = self.get_following_redirects(&url, token)?;

        fs::create_dir_all(out_dir)?;
        let out_path = out_dir.join(format!("{}_{}", out_name, suffix));
        let mut part = tempfile::Builder::new()
            .prefix(&format!("{}_{}.", out_name, band))
            .suffix(".part")
            .tempfile_in(out_dir)?;
        {
            let mut file = BufWriter::new(part.as_file_mut());
            response.copy_to(&mut file)?;
            file.flush()?;
        }
        part.persist(&out_path).map_err(|e| e.error)?;

        log::debug!("Band {} of {} saved to {}", band, product.name, out_path.display());
        Ok(BandAsset {
            band,
            path: out_path,
        })
    }

    /// GET with bearer auth, following up to `max_redirects` redirect responses.
    fn get_following_redirects(&self, url: &str, token: &str) -> Result<Response, CatalogueError> {
        let mut current = Url::parse(url).map_err(|e| CatalogueError::InvalidUrl(e.to_string()))?;

        for _ in 0..=self.max_redirects {
            let response = self.http.get(current.clone()).bearer_auth(token).send()?;
            let status = response.status().as_u16();

            if REDIRECT_STATUSES.contains(&status) {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| CatalogueError::Download {
                        status,
                        url: current.to_string(),
                        body: "redirect without Location header".into(),
                    })?;
                current = current
                    .join(location)
                    .map_err(|e| CatalogueError::InvalidUrl(e.to_string()))?;
                continue;
            }

            if status != 200 {
                let body = response.text().unwrap_or_default();
                return Err(CatalogueError::Download {
                    status,
                    url: current.to_string(),
                    body,
                });
            }

            return Ok(response);
        }

        Err(CatalogueError::TooManyRedirects(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::testing::{blocking_client, product, MockCatalogue};
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::Ordering;

    // Blocking clients must be built off the async runtime.
    fn client_for(base: &str) -> CatalogueClient {
        CatalogueClient::new(blocking_client(), base).with_band_extension(Some("jp2".into()))
    }

    #[test]
    fn band_url_nests_every_segment() {
        let client = CatalogueClient::new(Client::new(), "http://cat/odata/v1")
            .with_band_extension(Some("jp2".into()));
        let url = client
            .band_url(&product(), "GRANULE/L1C_T48/IMG_DATA/T48NUG_20200713T031529_B02")
            .unwrap();
        assert_eq!(
            url,
            "http://cat/odata/v1/Products('p-1')/Nodes(S2A_MSIL1C_20200713T031541_N0209_R118_T48NUG_20200713T050839.SAFE)\
             /Nodes(GRANULE)/Nodes(L1C_T48)/Nodes(IMG_DATA)/Nodes(T48NUG_20200713T031529_B02.jp2)/$value"
        );
    }

    #[test]
    fn short_band_path_is_rejected() {
        let client = CatalogueClient::new(Client::new(), "http://cat");
        let err = client.band_url(&product(), "IMG_DATA/B02").unwrap_err();
        assert!(matches!(err, CatalogueError::InvalidBandPath(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn query_returns_products() {
        let mock = MockCatalogue::default().spawn().await;
        let base = mock.url("/odata/v1/");
        let state = mock.state.clone();

        let products = tokio::task::spawn_blocking(move || {
            client_for(&base).query(&ProductQuery {
                collection: "SENTINEL-2".into(),
                product_type: "S2MSI1C".into(),
                aoi_wkt: "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))".into(),
                max_cloud_cover: 100.0,
                start: Utc.with_ymd_and_hms(2020, 7, 13, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2020, 7, 14, 0, 0, 0).unwrap(),
            })
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(products, vec![product()]);
        let filter = state.last_filter.lock().unwrap().clone().unwrap();
        assert!(filter.contains("OData.CSC.Intersects"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn query_failure_is_catalogue_error() {
        let mock = MockCatalogue {
            query_status: 503,
            ..Default::default()
        }
        .spawn()
        .await;
        let base = mock.url("/odata/v1/");

        let err = tokio::task::spawn_blocking(move || {
            client_for(&base).query(&ProductQuery {
                collection: "SENTINEL-2".into(),
                product_type: "S2MSI1C".into(),
                aoi_wkt: "POLYGON((0 0, 1 0, 1 1, 0 1, 0 0))".into(),
                max_cloud_cover: 100.0,
                start: Utc.with_ymd_and_hms(2020, 7, 13, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2020, 7, 14, 0, 0, 0).unwrap(),
            })
        })
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, CatalogueError::Query { status: 503, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn manifest_download_follows_redirects() {
        let mock = MockCatalogue::default().spawn().await;
        let base = mock.url("/odata/v1/");
        let state = mock.state.clone();

        let bytes = tokio::task::spawn_blocking(move || {
            client_for(&base).download_manifest("t", &product())
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(bytes, state.manifest);
        assert_eq!(state.node_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn redirect_limit_is_enforced() {
        let mock = MockCatalogue::default().spawn().await;
        let base = mock.url("/odata/v1/");

        let err = tokio::task::spawn_blocking(move || {
            client_for(&base)
                .with_max_redirects(0)
                .download_manifest("t", &product())
        })
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, CatalogueError::TooManyRedirects(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_band_is_download_error() {
        let mock = MockCatalogue::default().spawn().await;
        let base = mock.url("/odata/v1/");
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().to_path_buf();

        let err = tokio::task::spawn_blocking(move || {
            client_for(&base).download_band(
                "t",
                &product(),
                "GRANULE/L1C_T48/IMG_DATA/T48NUG_20200713T031529_B08",
                &out_dir,
                "scene",
            )
        })
        .await
        .unwrap()
        .unwrap_err();

        assert!(matches!(err, CatalogueError::Download { status: 404, .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn band_is_written_with_suffix() {
        let mock = MockCatalogue::default().spawn().await;
        let base = mock.url("/odata/v1/");
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().to_path_buf();
        let state = mock.state.clone();

        let asset = tokio::task::spawn_blocking(move || {
            client_for(&base).download_band(
                "t",
                &product(),
                "GRANULE/L1C_T48/IMG_DATA/T48NUG_20200713T031529_B03",
                &out_dir,
                "scene",
            )
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(asset.band, "B03");
        assert_eq!(asset.path, dir.path().join("scene_B03.jp2"));
        assert_eq!(fs::read(&asset.path).unwrap(), state.bands["B03"]);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_downloads_of_one_band_all_succeed() {
        let mock = MockCatalogue::default().spawn().await;
        let base = mock.url("/odata/v1/");
        let dir = tempfile::tempdir().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let base = base.clone();
                let out_dir = dir.path().to_path_buf();
                tokio::task::spawn_blocking(move || {
                    client_for(&base).download_band(
                        "t",
                        &product(),
                        "GRANULE/L1C_T48/IMG_DATA/T48NUG_20200713T031529_B02",
                        &out_dir,
                        "scene",
                    )
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            fs::read(dir.path().join("scene_B02.jp2")).unwrap(),
            mock.state.bands["B02"]
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
