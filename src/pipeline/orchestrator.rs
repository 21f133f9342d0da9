use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::catalogue::{parse_manifest, BandAsset, CatalogueProduct, CatalogueSession, ProductQuery};
use crate::detect::Detector;
use crate::executor::{self, ExecError, ExternalCommand};
use crate::geodesy::BoundingBox;
use crate::imagery::{composite_rgb, crop_patches};
use crate::pipeline::error::PipelineError;
use crate::pipeline::policy::AcquisitionPolicy;
use crate::pipeline::report::{OutcomeState, VesselOutcome};
use crate::predict::{closest_passes, MatcherSettings, PassCandidate, TleRecord};
use crate::store::{sanitize, PassStore, SatPass, VesselStatus};

/// Everything about a run that does not change between vessels.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub matcher: MatcherSettings,
    pub aoi_radius_km: f64,
    pub search_days: u32,
    pub patch_size: u32,
    pub step_size: u32,
    pub satellite_name: String,
    pub policy: AcquisitionPolicy,
    pub vessel_deadline: Duration,
    pub work_dir: PathBuf,
    pub collection: String,
    pub product_type: String,
    pub max_cloud_cover: f64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            matcher: MatcherSettings::default(),
            aoi_radius_km: 10.0,
            search_days: 3,
            patch_size: 1024,
            step_size: 1024,
            satellite_name: "Sentinel-2".to_string(),
            policy: AcquisitionPolicy::default(),
            vessel_deadline: Duration::from_secs(30 * 60),
            work_dir: PathBuf::from("work"),
            collection: "SENTINEL-2".to_string(),
            product_type: "S2MSI1C".to_string(),
            max_cloud_cover: 100.0,
        }
    }
}

/// Sensing start encoded in a product name, e.g. `S2A_MSIL1C_20200713T031541_...`.
pub fn sensing_time(product_name: &str) -> Option<DateTime<Utc>> {
    product_name
        .split('_')
        .filter(|token| token.len() == 15)
        .find_map(|token| NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%S").ok())
        .map(|naive| naive.and_utc())
}

/// Idempotency key of a pass: one per (candidate, product) under a status.
pub fn pass_key(candidate: &PassCandidate, product: &CatalogueProduct) -> String {
    format!(
        "{}_{}_{}",
        candidate.satellite,
        candidate.timestamp.format("%Y%m%dT%H%M%S"),
        product.id
    )
}

/// Drives selection, matching, acquisition and persistence for one vessel at a time.
pub struct PassPipeline {
    settings: PipelineSettings,
    store: Arc<dyn PassStore>,
    detector: Arc<dyn Detector>,
    transcoder: Option<ExternalCommand>,
}

impl PassPipeline {
    pub fn new(
        settings: PipelineSettings,
        store: Arc<dyn PassStore>,
        detector: Arc<dyn Detector>,
    ) -> Self {
        Self {
            settings,
            store,
            detector,
            transcoder: None,
        }
    }

    /// Convert downloaded bands with an external command before tiling.
    pub fn with_transcoder(mut self, transcoder: Option<ExternalCommand>) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn PassStore> {
        &self.store
    }

    /// Downloads, tiles and composites for one status. Workers never share it.
    pub fn scratch_dir(&self, status: &VesselStatus) -> PathBuf {
        self.settings
            .work_dir
            .join("scratch")
            .join(sanitize(&status.vessel_id))
            .join(sanitize(&status.id))
    }

    pub fn process_vessel(
        &self,
        session: &mut CatalogueSession,
        vessel_id: &str,
        tles: &[TleRecord],
    ) -> Result<VesselOutcome, PipelineError> {
        let deadline = Instant::now() + self.settings.vessel_deadline;

        let Some(status) = self.store.latest_status(vessel_id)? else {
            log::info!("Vessel {} has no position fix, skipping", vessel_id);
            return Ok(VesselOutcome::new(vessel_id, OutcomeState::NoStatus));
        };
        let freshness = status.freshness()?;

        let mut outcome = VesselOutcome::new(vessel_id, OutcomeState::Searched);
        outcome.status_id = Some(status.id.clone());

        if let Some(last) = self.store.latest_pass(&status.id)? {
            if last.timestamp >= freshness {
                log::debug!(
                    "Vessel {} status {} already has a pass at {}",
                    vessel_id,
                    status.id,
                    last.timestamp
                );
                outcome.state = OutcomeState::UpToDate;
                return Ok(outcome);
            }
        }

        let candidates = closest_passes(status.position(), freshness, tles, &self.settings.matcher);
        outcome.candidates = candidates.len();
        log::info!(
            "Vessel {} at ({:.4}, {:.4}): {} candidate passes",
            vessel_id,
            status.latitude,
            status.longitude,
            candidates.len()
        );

        for candidate in &candidates {
            let result = if Instant::now() >= deadline {
                Err(PipelineError::DeadlineExceeded(vessel_id.to_string()))
            } else {
                self.process_candidate(session, &status, candidate, deadline, &mut outcome)
            };

            match result {
                Ok(()) => {}
                Err(PipelineError::DeadlineExceeded(_)) => {
                    log::warn!(
                        "Vessel {} ran out of time after {} passes",
                        vessel_id,
                        outcome.passes_created
                    );
                    outcome.state = OutcomeState::DeadlineExceeded;
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!(
                        "Vessel {} candidate {} at {}: {}",
                        vessel_id,
                        candidate.satellite,
                        candidate.timestamp,
                        e
                    );
                    outcome.errors.push(e.to_string());
                }
            }
        }

        Ok(outcome)
    }

    fn process_candidate(
        &self,
        session: &mut CatalogueSession,
        status: &VesselStatus,
        candidate: &PassCandidate,
        deadline: Instant,
        outcome: &mut VesselOutcome,
    ) -> Result<(), PipelineError> {
        let aoi = BoundingBox::around(candidate.point, self.settings.aoi_radius_km);
        session.authenticate()?;

        let mut recorded = 0;
        for day in 0..self.settings.search_days {
            let start = candidate.timestamp + chrono::Duration::days(day as i64);
            let query = ProductQuery {
                collection: self.settings.collection.clone(),
                product_type: self.settings.product_type.clone(),
                aoi_wkt: aoi.to_wkt(),
                max_cloud_cover: self.settings.max_cloud_cover,
                start,
                end: start + chrono::Duration::days(1),
            };

            let products = match session.query(&query) {
                Ok(products) => products,
                Err(e) => {
                    log::warn!(
                        "Vessel {} candidate {}: query for {} failed: {}",
                        status.vessel_id,
                        candidate.satellite,
                        start.date_naive(),
                        e
                    );
                    outcome.errors.push(e.to_string());
                    continue;
                }
            };
            log::debug!("{} products on {}", products.len(), start.date_naive());

            for product in &products {
                if !self.settings.policy.should_continue(recorded) {
                    return Ok(());
                }
                if Instant::now() >= deadline {
                    return Err(PipelineError::DeadlineExceeded(status.vessel_id.clone()));
                }

                outcome.products_tried += 1;
                match self.acquire(session, status, candidate, product, deadline) {
                    Ok(true) => {
                        recorded += 1;
                        outcome.passes_created += 1;
                    }
                    Ok(false) => {}
                    Err(e @ PipelineError::DeadlineExceeded(_)) => return Err(e),
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        log::warn!(
                            "Vessel {} candidate {} product {}: {}",
                            status.vessel_id,
                            candidate.satellite,
                            product.name,
                            e
                        );
                        outcome.errors.push(e.to_string());
                    }
                }
            }
        }

        Ok(())
    }

    /// Manifest, bands, tiles, composites and detection for one product.
    /// Returns whether a new pass was recorded.
    fn acquire(
        &self,
        session: &mut CatalogueSession,
        status: &VesselStatus,
        candidate: &PassCandidate,
        product: &CatalogueProduct,
        deadline: Instant,
    ) -> Result<bool, PipelineError> {
        let out_of_time = || -> Result<(), PipelineError> {
            if Instant::now() >= deadline {
                return Err(PipelineError::DeadlineExceeded(status.vessel_id.clone()));
            }
            Ok(())
        };

        let manifest = session.download_manifest(product)?;
        archive(
            &self.settings.work_dir.join("metadata"),
            &format!(
                "{:.5}_{:.5}_MTD_MSIL1C.xml",
                candidate.point.latitude_deg, candidate.point.longitude_deg
            ),
            &manifest,
        )?;

        let Some(band_paths) = parse_manifest(&manifest) else {
            log::warn!("Product {} has an unusable manifest, skipping", product.name);
            return Ok(false);
        };

        let scratch = self.scratch_dir(status);
        let out_name = product.stem().to_string();
        let band_dir = scratch.join("bands").join(&out_name);
        let mut bands = session.download_bands(product, &band_paths, &band_dir, &out_name)?;
        out_of_time()?;
        if let Some(transcoder) = &self.transcoder {
            bands = self.transcode(transcoder, bands, &scratch.join("logs"))?;
        }
        if bands.is_empty() {
            log::warn!("No bands downloaded for {}", product.name);
            return Ok(false);
        }

        let patch_dir = scratch.join("patches").join(&out_name);
        let patch = (self.settings.patch_size, self.settings.patch_size);
        let step = (self.settings.step_size, self.settings.step_size);
        let patches = crop_patches(&bands, patch, step, &patch_dir, &out_name)?;
        log::debug!("{} patches from {}", patches.len(), product.name);

        let composite_dir = scratch.join("composites");
        for patch_name in &patches {
            out_of_time()?;
            let composite = match composite_rgb(&patch_dir, &composite_dir, patch_name) {
                Ok(Some(path)) => path,
                Ok(None) => continue,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    log::warn!("Composite of {} failed: {}", patch_name, e);
                    continue;
                }
            };

            let result = match self.detector.detect(&composite) {
                Ok(result) => result,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    log::warn!("Detection on {} failed: {}", composite.display(), e);
                    continue;
                }
            };
            if result.detections.is_empty() {
                log::debug!("Nothing detected in {}", patch_name);
                continue;
            }

            let pass = SatPass {
                status_id: status.id.clone(),
                satellite: self.settings.satellite_name.clone(),
                timestamp: sensing_time(&product.name).unwrap_or(candidate.timestamp),
                latitude: candidate.point.latitude_deg,
                longitude: candidate.point.longitude_deg,
                image: Some(result.image),
            };
            let created = self.store.insert_pass(&pass_key(candidate, product), &pass)?;
            if created {
                log::info!(
                    "Recorded {} pass at {} for vessel {} ({} detections in {})",
                    pass.satellite,
                    pass.timestamp,
                    status.vessel_id,
                    result.detections.len(),
                    patch_name
                );
            }
            return Ok(created);
        }

        Ok(false)
    }

    fn transcode(
        &self,
        command: &ExternalCommand,
        bands: Vec<BandAsset>,
        log_dir: &Path,
    ) -> Result<Vec<BandAsset>, PipelineError> {
        let mut converted = Vec::with_capacity(bands.len());
        for band in bands {
            let target = band.path.with_extension("tif");
            if target == band.path {
                converted.push(band);
                continue;
            }

            let input = band.path.to_string_lossy().into_owned();
            let output = target.to_string_lossy().into_owned();
            let log_name = format!("transcode_{}", band.band);
            match executor::run(
                command,
                &[("input", input.as_str()), ("output", output.as_str())],
                log_dir,
                &log_name,
            ) {
                Ok(()) => converted.push(BandAsset {
                    band: band.band,
                    path: target,
                }),
                Err(ExecError::Io(e)) => return Err(e.into()),
                Err(e) => log::warn!("Skipping band {}: {}", band.band, e),
            }
        }
        Ok(converted)
    }
}

/// Replace `dir/name` with `content` in one step.
fn archive(dir: &Path, name: &str, content: &[u8]) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(content)?;
    staged.persist(dir.join(name)).map_err(|e| e.error)?;
    Ok(())
}
