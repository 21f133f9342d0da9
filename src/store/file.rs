use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::predict::{TleLoader, TleRecord};
use crate::store::error::StoreError;
use crate::store::types::{SatPass, Vessel, VesselStatus};
use crate::store::PassStore;

/// YAML-on-disk store:
///
/// ```text
/// {base}/vessels/{vessel_id}.yaml
/// {base}/passes/{status_id}/{key}.yaml
/// {base}/tles/*.tle
/// ```
pub struct FileStore {
    base: PathBuf,
}

impl FileStore {
    pub fn new(base: PathBuf) -> Self {
        FileStore { base }
    }

    fn vessels_path(&self) -> PathBuf {
        self.base.join("vessels")
    }

    fn vessel_path(&self, id: &str) -> PathBuf {
        self.vessels_path().join(format!("{}.yaml", sanitize(id)))
    }

    fn passes_path(&self, status_id: &str) -> PathBuf {
        self.base.join("passes").join(sanitize(status_id))
    }

    pub fn tles_path(&self) -> PathBuf {
        self.base.join("tles")
    }

    pub fn vessel(&self, id: &str) -> Result<Vessel, StoreError> {
        let path = self.vessel_path(id);
        if !path.exists() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        read_vessel(&path)
    }

    pub fn save_vessel(&self, vessel: &Vessel) -> Result<(), StoreError> {
        fs::create_dir_all(self.vessels_path())?;
        let content = serde_yaml::to_string(vessel)?;
        fs::write(self.vessel_path(&vessel.id), content)?;
        Ok(())
    }

    pub fn passes(&self, status_id: &str) -> Result<Vec<SatPass>, StoreError> {
        let path = self.passes_path(status_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut passes = Vec::new();
        for entry in path.read_dir()? {
            let entry_path = entry?.path();
            if !is_yaml(&entry_path) {
                continue;
            }
            let content = fs::read_to_string(&entry_path)?;
            match serde_yaml::from_str::<SatPass>(&content) {
                Ok(pass) => passes.push(pass),
                Err(e) => log::error!("Failed to parse pass {}: {}", entry_path.display(), e),
            }
        }

        passes.sort_by_key(|p| p.timestamp);
        Ok(passes)
    }
}

impl PassStore for FileStore {
    fn vessels(&self) -> Result<Vec<Vessel>, StoreError> {
        let path = self.vessels_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let mut vessels = Vec::new();
        for entry in path.read_dir()? {
            let entry_path = entry?.path();
            if !is_yaml(&entry_path) {
                continue;
            }
            match read_vessel(&entry_path) {
                Ok(vessel) => vessels.push(vessel),
                Err(e) => log::error!("Failed to read vessel {}: {}", entry_path.display(), e),
            }
        }

        vessels.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(vessels)
    }

    fn latest_status(&self, vessel_id: &str) -> Result<Option<VesselStatus>, StoreError> {
        let vessel = self.vessel(vessel_id)?;
        let mut latest: Option<(chrono::DateTime<chrono::Utc>, VesselStatus)> = None;
        for status in vessel.statuses {
            let freshness = match status.freshness() {
                Ok(f) => f,
                Err(e) => {
                    log::warn!("Vessel {} status {}: {}", vessel_id, status.id, e);
                    continue;
                }
            };
            if latest.as_ref().map_or(true, |(best, _)| freshness > *best) {
                latest = Some((freshness, status));
            }
        }
        Ok(latest.map(|(_, status)| status))
    }

    fn latest_pass(&self, status_id: &str) -> Result<Option<SatPass>, StoreError> {
        Ok(self.passes(status_id)?.pop())
    }

    fn tles(&self) -> Result<Vec<TleRecord>, StoreError> {
        Ok(TleLoader::new(self.tles_path()).load_all()?)
    }

    fn insert_pass(&self, key: &str, pass: &SatPass) -> Result<bool, StoreError> {
        let content = serde_yaml::to_string(pass)?;
        let folder = self.passes_path(&pass.status_id);
        fs::create_dir_all(&folder)?;

        let path = folder.join(format!("{}.yaml", sanitize(key)));
        let created = publish_new(&folder, &path, |file| file.write_all(content.as_bytes()))?;
        if !created {
            log::debug!("Pass {} already recorded for status {}", key, pass.status_id);
        }
        Ok(created)
    }
}

/// Write into a temporary file in `folder`, then move it to `path` unless `path` exists.
/// A failed write leaves nothing at `path`.
fn publish_new(
    folder: &Path,
    path: &Path,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<bool> {
    let mut staged = tempfile::Builder::new()
        .prefix(".pass-")
        .suffix(".tmp")
        .tempfile_in(folder)?;
    write(staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    match staged.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error),
    }
}

fn read_vessel(path: &Path) -> Result<Vessel, StoreError> {
    let content = fs::read_to_string(path)?;
    let mut vessel: Vessel = serde_yaml::from_str(&content)?;
    for status in &mut vessel.statuses {
        status.vessel_id = vessel.id.clone();
    }
    Ok(vessel)
}

fn is_yaml(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "yaml")
}

/// Make an identifier safe to use as a file name.
pub fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
