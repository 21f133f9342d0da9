use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::executor::ExternalCommand;
use crate::pipeline::{AcquisitionPolicy, PipelineSettings};
use crate::predict::MatcherSettings;

pub const USERNAME_ENV: &str = "CATALOGUE_USERNAME";
pub const PASSWORD_ENV: &str = "CATALOGUE_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub catalogue: CatalogueConfig,
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub matcher: MatcherConfig,
    pub pipeline: PipelineConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub transcoder: Option<ExternalCommand>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub base_folder: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueConfig {
    pub catalogue_url: String,
    pub auth_url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub collection_name: String,
    pub product_type: String,
    #[serde(default = "default_max_cloud_cover")]
    pub max_cloud_cover: f64,
    #[serde(default = "default_timeout", deserialize_with = "humantime_duration")]
    pub timeout: Duration,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Appended to band file nodes that carry no extension.
    #[serde(default = "default_band_extension")]
    pub band_extension: Option<String>,
}

fn default_client_id() -> String {
    "cdse-public".to_string()
}

fn default_max_cloud_cover() -> f64 {
    100.0
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_redirects() -> usize {
    10
}

fn default_band_extension() -> Option<String> {
    Some("jp2".to_string())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    #[serde(default = "default_lookahead", deserialize_with = "humantime_duration")]
    pub lookahead: Duration,
    #[serde(default = "default_step", deserialize_with = "humantime_duration")]
    pub step: Duration,
    #[serde(default = "default_keep")]
    pub keep: usize,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            lookahead: default_lookahead(),
            step: default_step(),
            keep: default_keep(),
        }
    }
}

fn default_lookahead() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_step() -> Duration {
    Duration::from_secs(60)
}

fn default_keep() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_aoi_radius_km")]
    pub aoi_radius_km: f64,
    #[serde(default = "default_search_days")]
    pub search_days: u32,
    #[serde(default = "default_patch")]
    pub patch_size: u32,
    #[serde(default = "default_patch")]
    pub step_size: u32,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_vessel_deadline", deserialize_with = "humantime_duration")]
    pub vessel_deadline: Duration,
    #[serde(default = "default_satellite_name")]
    pub satellite_name: String,
    #[serde(default)]
    pub policy: AcquisitionPolicy,
    pub work_dir: PathBuf,
}

fn default_aoi_radius_km() -> f64 {
    10.0
}

fn default_search_days() -> u32 {
    3
}

fn default_patch() -> u32 {
    1024
}

fn default_workers() -> usize {
    4
}

fn default_vessel_deadline() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_satellite_name() -> String {
    "Sentinel-2".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    #[serde(flatten)]
    pub command: ExternalCommand,
    pub results_dir: PathBuf,
}

fn humantime_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(s.trim()).map_err(serde::de::Error::custom)
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str_with_env(&content, |name| std::env::var(name).ok())
    }

    /// Parse YAML, then apply credential overrides looked up through `env`.
    pub fn from_str_with_env(
        content: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)?;
        if let Some(username) = env(USERNAME_ENV) {
            config.credentials.username = username;
        }
        if let Some(password) = env(PASSWORD_ENV) {
            config.credentials.password = password;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matcher.step < Duration::from_millis(1) {
            return Err(ConfigError::Invalid("matcher.step must be at least 1ms".into()));
        }
        if self.pipeline.patch_size == 0 || self.pipeline.step_size == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.patch_size and pipeline.step_size must be positive".into(),
            ));
        }
        if self.pipeline.aoi_radius_km <= 0.0 {
            return Err(ConfigError::Invalid("pipeline.aoi_radius_km must be positive".into()));
        }
        Ok(())
    }

    pub fn matcher_settings(&self) -> Result<MatcherSettings, ConfigError> {
        let convert = |d: Duration| {
            chrono::Duration::from_std(d).map_err(|e| ConfigError::Invalid(e.to_string()))
        };
        Ok(MatcherSettings {
            lookahead: convert(self.matcher.lookahead)?,
            step: convert(self.matcher.step)?,
            keep: self.matcher.keep,
        })
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ConfigError> {
        Ok(PipelineSettings {
            matcher: self.matcher_settings()?,
            aoi_radius_km: self.pipeline.aoi_radius_km,
            search_days: self.pipeline.search_days,
            patch_size: self.pipeline.patch_size,
            step_size: self.pipeline.step_size,
            satellite_name: self.pipeline.satellite_name.clone(),
            policy: self.pipeline.policy,
            vessel_deadline: self.pipeline.vessel_deadline,
            work_dir: self.pipeline.work_dir.clone(),
            collection: self.catalogue.collection_name.clone(),
            product_type: self.catalogue.product_type.clone(),
            max_cloud_cover: self.catalogue.max_cloud_cover,
        })
    }
}
