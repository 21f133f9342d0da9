mod error;
mod file;
mod types;

pub use error::StoreError;
pub use file::{sanitize, FileStore};
pub use types::{parse_freshness, SatPass, Vessel, VesselStatus};

use crate::predict::TleRecord;

/// Storage collaborator for vessels, their position fixes and recorded passes.
pub trait PassStore: Send + Sync {
    fn vessels(&self) -> Result<Vec<Vessel>, StoreError>;

    /// Most recent status of a vessel by freshness timestamp.
    fn latest_status(&self, vessel_id: &str) -> Result<Option<VesselStatus>, StoreError>;

    /// Most recent pass recorded against a status.
    fn latest_pass(&self, status_id: &str) -> Result<Option<SatPass>, StoreError>;

    fn tles(&self) -> Result<Vec<TleRecord>, StoreError>;

    /// Record a pass under an idempotency key. Returns `false` if the key already exists.
    fn insert_pass(&self, key: &str, pass: &SatPass) -> Result<bool, StoreError>;
}
