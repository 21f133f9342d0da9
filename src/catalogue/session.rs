use std::path::Path;
use std::sync::Arc;

use crate::catalogue::auth::Authenticator;
use crate::catalogue::client::CatalogueClient;
use crate::catalogue::error::CatalogueError;
use crate::catalogue::types::{BandAsset, CatalogueProduct, ProductQuery};

/// Catalogue client plus the bearer token of one worker.
///
/// A step rejected with HTTP 401 is retried exactly once after
/// re-authenticating; a second rejection becomes `CatalogueError::Auth`.
pub struct CatalogueSession {
    client: CatalogueClient,
    authenticator: Arc<dyn Authenticator>,
    token: Option<String>,
}

impl CatalogueSession {
    pub fn new(client: CatalogueClient, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            client,
            authenticator,
            token: None,
        }
    }

    pub fn client(&self) -> &CatalogueClient {
        &self.client
    }

    /// Fetch a fresh token, replacing any previous one.
    pub fn authenticate(&mut self) -> Result<(), CatalogueError> {
        self.token = Some(self.authenticator.authenticate()?);
        Ok(())
    }

    fn token(&mut self) -> Result<String, CatalogueError> {
        if self.token.is_none() {
            self.authenticate()?;
        }
        self.token
            .clone()
            .ok_or_else(|| CatalogueError::Auth {
                status: 0,
                body: "no token".into(),
            })
    }

    pub fn with_reauth<T, F>(&mut self, mut step: F) -> Result<T, CatalogueError>
    where
        F: FnMut(&CatalogueClient, &str) -> Result<T, CatalogueError>,
    {
        let token = self.token()?;
        match step(&self.client, &token) {
            Err(e) if e.is_unauthorized() => {
                log::info!("Token rejected ({}), re-authenticating", e);
                self.authenticate()?;
                let token = self.token()?;
                step(&self.client, &token).map_err(|e| {
                    if e.is_unauthorized() {
                        CatalogueError::Auth {
                            status: 401,
                            body: e.to_string(),
                        }
                    } else {
                        e
                    }
                })
            }
            other => other,
        }
    }

    pub fn query(&self, query: &ProductQuery) -> Result<Vec<CatalogueProduct>, CatalogueError> {
        self.client.query(query)
    }

    pub fn download_manifest(
        &mut self,
        product: &CatalogueProduct,
    ) -> Result<Vec<u8>, CatalogueError> {
        self.with_reauth(|client, token| client.download_manifest(token, product))
    }

    /// Download every band; a band that fails is logged and skipped.
    /// Authentication failures and local disk errors end the batch.
    pub fn download_bands(
        &mut self,
        product: &CatalogueProduct,
        band_paths: &[String],
        out_dir: &Path,
        out_name: &str,
    ) -> Result<Vec<BandAsset>, CatalogueError> {
        let mut assets = Vec::with_capacity(band_paths.len());
        for band_path in band_paths {
            let result = self.with_reauth(|client, token| {
                client.download_band(token, product, band_path, out_dir, out_name)
            });
            match result {
                Ok(asset) => assets.push(asset),
                Err(e @ (CatalogueError::Auth { .. } | CatalogueError::Io(_))) => return Err(e),
                Err(e) => {
                    log::warn!("Skipping band {} of {}: {}", band_path, product.name, e);
                }
            }
        }
        Ok(assets)
    }
}
