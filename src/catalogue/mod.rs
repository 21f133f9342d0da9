mod auth;
mod client;
mod error;
mod manifest;
mod session;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{authenticate, Authenticator, PasswordAuthenticator};
pub use client::{CatalogueClient, MANIFEST_NODE};
pub use error::CatalogueError;
pub use manifest::{parse_manifest, try_parse_manifest, RGB_BANDS};
pub use session::CatalogueSession;
pub use types::{BandAsset, CatalogueProduct, ContentDate, ProductQuery};
