use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeState {
    /// Vessel has no usable position fix.
    NoStatus,
    /// A pass at least as recent as the latest fix already exists.
    UpToDate,
    Searched,
    DeadlineExceeded,
    Failed,
    Aborted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselOutcome {
    pub vessel_id: String,
    pub status_id: Option<String>,
    pub state: OutcomeState,
    pub candidates: usize,
    pub products_tried: usize,
    pub passes_created: usize,
    pub errors: Vec<String>,
}

impl VesselOutcome {
    pub fn new(vessel_id: &str, state: OutcomeState) -> Self {
        Self {
            vessel_id: vessel_id.to_string(),
            status_id: None,
            state,
            candidates: 0,
            products_tried: 0,
            passes_created: 0,
            errors: Vec::new(),
        }
    }

    pub fn failed(vessel_id: &str, error: String) -> Self {
        let mut outcome = Self::new(vessel_id, OutcomeState::Failed);
        outcome.errors.push(error);
        outcome
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub vessels: Vec<VesselOutcome>,
    pub fatal: Option<String>,
}

impl RunReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            completed_at: None,
            vessels: Vec::new(),
            fatal: None,
        }
    }

    pub fn passes_created(&self) -> usize {
        self.vessels.iter().map(|v| v.passes_created).sum()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        fs::write(
            path,
            serde_yaml::to_string(self)
                .map_err(|e| io::Error::other(format!("Failed to serialize report: {}", e)))?,
        )
    }
}

/// Keeps `{work_dir}/runs/{run_id}/report.yaml` current as vessels finish.
pub struct ReportWriter {
    run_dir: PathBuf,
    report: RunReport,
}

impl ReportWriter {
    pub fn new(work_dir: &Path, run_id: &str) -> io::Result<Self> {
        let run_dir = work_dir.join("runs").join(run_id);
        fs::create_dir_all(&run_dir)?;
        let writer = Self {
            run_dir,
            report: RunReport::new(run_id.to_string()),
        };
        writer.report.save(&writer.report_path())?;
        Ok(writer)
    }

    pub fn add_outcome(&mut self, outcome: VesselOutcome) -> io::Result<()> {
        self.report.vessels.push(outcome);
        self.report.save(&self.report_path())
    }

    pub fn finish(mut self, fatal: Option<String>) -> io::Result<RunReport> {
        self.report.fatal = fatal;
        self.report.completed_at = Some(Utc::now());
        self.report.save(&self.report_path())?;
        Ok(self.report)
    }

    pub fn report_path(&self) -> PathBuf {
        self.run_dir.join("report.yaml")
    }
}

pub fn generate_run_id(start: DateTime<Utc>) -> String {
    let uuid = uuid::Uuid::new_v4();
    format!("{}_{}", start.format("%Y%m%dT%H%M%SZ"), uuid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_is_rewritten_per_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ReportWriter::new(dir.path(), "run-1").unwrap();
        let path = writer.report_path();
        assert_eq!(path, dir.path().join("runs/run-1/report.yaml"));

        let mut outcome = VesselOutcome::new("v1", OutcomeState::Searched);
        outcome.passes_created = 2;
        writer.add_outcome(outcome).unwrap();

        let on_disk: RunReport = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.vessels.len(), 1);
        assert!(on_disk.completed_at.is_none());

        let report = writer.finish(None).unwrap();
        assert_eq!(report.passes_created(), 2);
        let on_disk: RunReport = serde_yaml::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(on_disk.completed_at.is_some());
    }

    #[test]
    fn run_ids_are_unique() {
        let now = Utc::now();
        assert_ne!(generate_run_id(now), generate_run_id(now));
    }
}
