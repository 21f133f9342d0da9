//! In-process stand-in for the auth endpoint and OData catalogue.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};
use reqwest::blocking::Client;
use serde_json::json;

use crate::catalogue::types::CatalogueProduct;
use crate::catalogue::CatalogueClient;

pub const MANIFEST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-1C_User_Product xmlns:n1="https://psd-14.sentinel2.eo.esa.int/PSD/User_Product_Level-1C.xsd">
  <n1:General_Info>
    <Product_Info>
      <PRODUCT_START_TIME>2020-07-13T03:15:41.024Z</PRODUCT_START_TIME>
      <Product_Organisation>
        <Granule_List>
          <Granule datastripIdentifier="DS" granuleIdentifier="G" imageFormat="JPEG2000">
            <IMAGE_FILE>GRANULE/L1C_T48NUG_A026420_20200713T031526/IMG_DATA/T48NUG_20200713T031529_B01</IMAGE_FILE>
            <IMAGE_FILE>GRANULE/L1C_T48NUG_A026420_20200713T031526/IMG_DATA/T48NUG_20200713T031529_B02</IMAGE_FILE>
            <IMAGE_FILE>GRANULE/L1C_T48NUG_A026420_20200713T031526/IMG_DATA/T48NUG_20200713T031529_B03</IMAGE_FILE>
            <IMAGE_FILE>GRANULE/L1C_T48NUG_A026420_20200713T031526/IMG_DATA/T48NUG_20200713T031529_B04</IMAGE_FILE>
            <IMAGE_FILE>GRANULE/L1C_T48NUG_A026420_20200713T031526/IMG_DATA/T48NUG_20200713T031529_B08</IMAGE_FILE>
          </Granule>
        </Granule_List>
      </Product_Organisation>
    </Product_Info>
  </n1:General_Info>
</n1:Level-1C_User_Product>
"#;

pub fn product() -> CatalogueProduct {
    CatalogueProduct {
        id: "p-1".into(),
        name: "S2A_MSIL1C_20200713T031541_N0209_R118_T48NUG_20200713T050839.SAFE".into(),
        content_date: None,
    }
}

pub fn blocking_client() -> Client {
    CatalogueClient::http_client(std::time::Duration::from_secs(10)).unwrap()
}

/// 64x64 single-band TIFF filled with `value`.
pub fn tiff_band(value: u16) -> Vec<u8> {
    let raster: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_pixel(64, 64, Luma([value]));
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageLuma16(raster)
        .write_to(&mut bytes, ImageFormat::Tiff)
        .unwrap();
    bytes.into_inner()
}

pub struct MockCatalogue {
    pub auth_status: u16,
    pub query_status: u16,
    /// Leading node requests answered with 401.
    pub unauthorized_node_responses: usize,
    pub products: Vec<CatalogueProduct>,
    pub manifest: Vec<u8>,
    pub bands: HashMap<String, Vec<u8>>,
    pub auth_calls: AtomicUsize,
    pub node_calls: AtomicUsize,
    pub last_filter: Mutex<Option<String>>,
    pub last_auth_form: Mutex<Option<HashMap<String, String>>>,
    pub last_bearer: Mutex<Option<String>>,
}

impl Default for MockCatalogue {
    fn default() -> Self {
        let bands = ["B02", "B03", "B04"]
            .iter()
            .map(|b| (b.to_string(), format!("raster {}", b).into_bytes()))
            .collect();
        Self {
            auth_status: 200,
            query_status: 200,
            unauthorized_node_responses: 0,
            products: vec![product()],
            manifest: MANIFEST_XML.as_bytes().to_vec(),
            bands,
            auth_calls: AtomicUsize::new(0),
            node_calls: AtomicUsize::new(0),
            last_filter: Mutex::new(None),
            last_auth_form: Mutex::new(None),
            last_bearer: Mutex::new(None),
        }
    }
}

pub struct RunningMock {
    pub base: String,
    pub state: Arc<MockCatalogue>,
}

impl RunningMock {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

impl MockCatalogue {
    /// Catalogue whose RGB bands are decodable rasters.
    pub fn with_rasters() -> Self {
        let bands = [("B02", 800), ("B03", 1100), ("B04", 1400)]
            .iter()
            .map(|(band, value)| (band.to_string(), tiff_band(*value)))
            .collect();
        Self {
            bands,
            ..Default::default()
        }
    }

    pub async fn spawn(self) -> RunningMock {
        let state = Arc::new(self);
        let app = Router::new()
            .route("/auth", post(auth))
            .fallback(catalogue)
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        RunningMock {
            base: format!("http://{}", addr),
            state,
        }
    }
}

async fn auth(
    State(state): State<Arc<MockCatalogue>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let n = state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
    *state.last_auth_form.lock().unwrap() = Some(form);

    if state.auth_status != 200 {
        let status = StatusCode::from_u16(state.auth_status).unwrap();
        return (status, r#"{"error":"invalid_grant"}"#).into_response();
    }
    Json(json!({ "access_token": format!("token-{}", n), "expires_in": 600 })).into_response()
}

async fn catalogue(
    State(state): State<Arc<MockCatalogue>>,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let path = uri.path().to_string();

    if path.ends_with("/Products") {
        *state.last_filter.lock().unwrap() = params.get("$filter").cloned();
        if state.query_status != 200 {
            let status = StatusCode::from_u16(state.query_status).unwrap();
            return (status, "catalogue unavailable").into_response();
        }
        return Json(json!({ "value": state.products })).into_response();
    }

    if !path.ends_with("/$value") {
        return StatusCode::NOT_FOUND.into_response();
    }

    let call = state.node_calls.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *state.last_bearer.lock().unwrap() = bearer;
    if call < state.unauthorized_node_responses {
        return (StatusCode::UNAUTHORIZED, "token expired").into_response();
    }

    if path.contains("MTD_MSIL1C.xml") {
        if !path.starts_with("/redirected") {
            let target = format!("/redirected{}", path);
            return (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, target)]).into_response();
        }
        return state.manifest.clone().into_response();
    }

    let node = path
        .trim_end_matches("/$value")
        .rsplit("Nodes(")
        .next()
        .unwrap_or_default()
        .trim_end_matches(')');
    let band = node
        .rsplit('_')
        .next()
        .unwrap_or_default()
        .split('.')
        .next()
        .unwrap_or_default();

    match state.bands.get(band) {
        Some(bytes) => bytes.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "no such node").into_response(),
    }
}
