use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::predict::error::PredictError;
use crate::predict::propagation::Ephemeris;
use crate::predict::types::TleRecord;

/// Reads TLE records from `*.tle` / `*.txt` files in one directory.
pub struct TleLoader {
    tle_dir: PathBuf,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf) -> Self {
        Self { tle_dir }
    }

    /// Load every record from the directory. Unreadable files are skipped.
    pub fn load_all(&self) -> Result<Vec<TleRecord>, PredictError> {
        if !self.tle_dir.exists() {
            return Err(PredictError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.tle_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == "tle" || ext == "txt")
            })
            .collect();
        paths.sort();

        let mut records = Vec::new();
        for path in paths {
            match self.read_tle_file(&path) {
                Ok(mut file_records) => records.append(&mut file_records),
                Err(e) => {
                    log::warn!("Failed to read TLE file {}: {}", path.display(), e);
                }
            }
        }

        log::debug!(
            "Loaded {} TLE records from {}",
            records.len(),
            self.tle_dir.display()
        );
        Ok(records)
    }

    fn read_tle_file(&self, path: &Path) -> Result<Vec<TleRecord>, PredictError> {
        let content = fs::read_to_string(path)?;
        let created_at: DateTime<Utc> = fs::metadata(path)?.modified()?.into();
        Ok(parse_multi_tle(&content, created_at)
            .into_iter()
            .filter(|record| match Ephemeris::from_record(record) {
                Ok(_) => true,
                Err(e) => {
                    log::warn!("Skipping TLE in {}: {}", path.display(), e);
                    false
                }
            })
            .collect())
    }
}

/// Parse 2-line and 3-line (named) element sets from one text blob.
pub fn parse_multi_tle(content: &str, created_at: DateTime<Utc>) -> Vec<TleRecord> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            result.push(TleRecord {
                satellite: format!("NORAD {}", catalog_number(lines[i])),
                line1: lines[i].to_string(),
                line2: lines[i + 1].to_string(),
                created_at,
            });
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            let name = lines[i].strip_prefix("0 ").unwrap_or(lines[i]).trim();
            result.push(TleRecord {
                satellite: name.to_string(),
                line1: lines[i + 1].to_string(),
                line2: lines[i + 2].to_string(),
                created_at,
            });
            i += 3;
        } else {
            i += 1;
        }
    }

    result
}

fn catalog_number(line1: &str) -> &str {
    line1.get(2..7).map(str::trim).unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ISS_1: &str = "1 25544U 98067A   20194.88612269 -.00002218  00000-0 -31515-4 0  9992";
    const ISS_2: &str = "2 25544  51.6461 221.2784 0001413  89.1723 280.4612 15.49507896236008";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn parses_named_and_unnamed_sets() {
        let content = format!("0 ISS (ZARYA)\n{ISS_1}\n{ISS_2}\n\n{ISS_1}\n{ISS_2}\n");
        let records = parse_multi_tle(&content, now());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].satellite, "ISS (ZARYA)");
        assert_eq!(records[1].satellite, "NORAD 25544");
        assert_eq!(records[1].line2, ISS_2);
    }

    #[test]
    fn skips_stray_lines() {
        let content = format!("garbage\n{ISS_1}\nnot a line two\n{ISS_1}\n{ISS_2}\n");
        let records = parse_multi_tle(&content, now());
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn loads_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("stations.tle"),
            format!("ISS (ZARYA)\n{ISS_1}\n{ISS_2}\n"),
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let records = TleLoader::new(dir.path().to_path_buf()).load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].satellite, "ISS (ZARYA)");
    }

    #[test]
    fn drops_sets_sgp4_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let corrupt_2 = ISS_2.replace("51.6461", "51.6x61");
        fs::write(
            dir.path().join("stations.tle"),
            format!("BROKEN\n{ISS_1}\n{corrupt_2}\nISS (ZARYA)\n{ISS_1}\n{ISS_2}\n"),
        )
        .unwrap();

        let records = TleLoader::new(dir.path().to_path_buf()).load_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].satellite, "ISS (ZARYA)");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = TleLoader::new(PathBuf::from("/definitely/not/here"))
            .load_all()
            .unwrap_err();
        assert!(matches!(err, PredictError::DirectoryNotFound(_)));
    }
}
