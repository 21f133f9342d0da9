mod error;
mod orchestrator;
mod policy;
mod report;
mod runner;

pub use error::PipelineError;
pub use orchestrator::{pass_key, sensing_time, PassPipeline, PipelineSettings};
pub use policy::AcquisitionPolicy;
pub use report::{generate_run_id, OutcomeState, ReportWriter, RunReport, VesselOutcome};
pub use runner::BatchRunner;
