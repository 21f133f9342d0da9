use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;

use crate::catalogue::{Authenticator, CatalogueClient, CatalogueSession};
use crate::pipeline::error::PipelineError;
use crate::pipeline::orchestrator::PassPipeline;
use crate::pipeline::report::{
    generate_run_id, OutcomeState, ReportWriter, RunReport, VesselOutcome,
};

/// One scheduling cycle over every stored vessel.
pub struct BatchRunner {
    pipeline: Arc<PassPipeline>,
    client: CatalogueClient,
    authenticator: Arc<dyn Authenticator>,
    workers: usize,
}

impl BatchRunner {
    pub fn new(
        pipeline: PassPipeline,
        client: CatalogueClient,
        authenticator: Arc<dyn Authenticator>,
        workers: usize,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            client,
            authenticator,
            workers: workers.max(1),
        }
    }

    fn work_dir(&self) -> PathBuf {
        self.pipeline.settings().work_dir.clone()
    }

    /// Process every vessel with at most `workers` in flight. Each worker owns its own
    /// catalogue session. Returns an error only for failures that end the run.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let run_id = generate_run_id(Utc::now());
        let mut report = ReportWriter::new(&self.work_dir(), &run_id)?;
        log::info!("Starting run {}", run_id);

        let store = self.pipeline.store().clone();
        let (vessels, tles) = tokio::task::spawn_blocking(move || {
            Ok::<_, PipelineError>((store.vessels()?, store.tles()?))
        })
        .await
        .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))??;
        let tles = Arc::new(tles);
        log::info!("{} vessels, {} TLE records", vessels.len(), tles.len());

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let abort = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(vessels.len());

        for vessel in vessels {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
            let pipeline = self.pipeline.clone();
            let client = self.client.clone();
            let authenticator = self.authenticator.clone();
            let tles = tles.clone();
            let abort = abort.clone();
            let vessel_id = vessel.id.clone();

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                if abort.load(Ordering::SeqCst) {
                    return Ok(VesselOutcome::new(&vessel.id, OutcomeState::Aborted));
                }
                let mut session = CatalogueSession::new(client, authenticator);
                let result = pipeline.process_vessel(&mut session, &vessel.id, &tles);
                if matches!(&result, Err(e) if e.is_fatal()) {
                    abort.store(true, Ordering::SeqCst);
                }
                result
            });
            handles.push((vessel_id, handle));
        }

        let mut fatal: Option<PipelineError> = None;
        for (vessel_id, handle) in handles {
            let outcome = match handle.await {
                Ok(Ok(outcome)) => {
                    log::info!(
                        "Vessel {}: {} ({} passes)",
                        vessel_id,
                        outcome.state,
                        outcome.passes_created
                    );
                    outcome
                }
                Ok(Err(e)) if e.is_fatal() => {
                    log::error!("Vessel {}: {}, aborting run", vessel_id, e);
                    let outcome = VesselOutcome::failed(&vessel_id, e.to_string());
                    fatal.get_or_insert(e);
                    outcome
                }
                Ok(Err(e)) => {
                    log::warn!("Vessel {}: {}", vessel_id, e);
                    VesselOutcome::failed(&vessel_id, e.to_string())
                }
                Err(e) => {
                    log::error!("Vessel {} worker panicked: {}", vessel_id, e);
                    VesselOutcome::failed(&vessel_id, e.to_string())
                }
            };
            report.add_outcome(outcome)?;
        }

        let report = report.finish(fatal.as_ref().map(|e| e.to_string()))?;
        match fatal {
            Some(e) => Err(e),
            None => {
                log::info!(
                    "Run {} finished: {} passes recorded",
                    run_id,
                    report.passes_created()
                );
                Ok(report)
            }
        }
    }
}
