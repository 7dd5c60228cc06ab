use std::time::Duration;

use garde::Validate;
use serde::Deserialize;

#[derive(Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    #[garde(skip)]
    pub bind_addr: String,

    /// API key for the OpenAI-compatible vision endpoint
    #[garde(length(min = 1))]
    pub openai_api_key: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_openai_base_url")]
    #[garde(skip)]
    pub openai_base_url: String,

    /// Vision model used for hand detection
    #[serde(default = "default_vision_model")]
    #[garde(length(min = 1))]
    pub vision_model: String,

    /// Per-request timeout for the vision API
    #[serde(default = "default_vision_timeout_secs")]
    #[garde(range(min = 1))]
    pub vision_timeout_secs: u64,

    /// Maximum number of jobs tracked at once
    #[serde(default = "default_max_jobs")]
    #[garde(range(min = 1))]
    pub max_jobs: usize,

    /// How long finished jobs stay readable before the sweep removes them
    #[serde(default = "default_job_retention_secs")]
    #[garde(range(min = 1))]
    pub job_retention_secs: u64,

    /// Shorter retention applied only when the store is full
    #[serde(default = "default_aggressive_retention_secs")]
    #[garde(range(min = 1))]
    pub aggressive_retention_secs: u64,

    /// Interval between background sweeps
    #[serde(default = "default_sweep_interval_secs")]
    #[garde(range(min = 1))]
    pub sweep_interval_secs: u64,

    /// How long uploaded images are kept in memory
    #[serde(default = "default_image_retention_secs")]
    #[garde(range(min = 1))]
    pub image_retention_secs: u64,

    /// Upload size limit in bytes
    #[serde(default = "default_max_upload_bytes")]
    #[garde(range(min = 1))]
    pub max_upload_bytes: usize,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_vision_timeout_secs() -> u64 {
    60
}

fn default_max_jobs() -> usize {
    1000
}

fn default_job_retention_secs() -> u64 {
    15 * 60
}

fn default_aggressive_retention_secs() -> u64 {
    5 * 60
}

fn default_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_image_retention_secs() -> u64 {
    60 * 60
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars())
    }

    /// Parse and validate configuration from `KEY=value` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        config.job_queue().validate()?;
        Ok(config)
    }

    pub fn job_queue(&self) -> JobQueueConfig {
        JobQueueConfig {
            max_jobs: self.max_jobs,
            retention: Duration::from_secs(self.job_retention_secs),
            aggressive_retention: Duration::from_secs(self.aggressive_retention_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }

    pub fn image_retention(&self) -> Duration {
        Duration::from_secs(self.image_retention_secs)
    }

    pub fn vision_timeout(&self) -> Duration {
        Duration::from_secs(self.vision_timeout_secs)
    }
}

/// Admission and reclamation settings for the job store.
///
/// The normal and aggressive retention windows are independent; nothing
/// requires one to be shorter than the other.
#[derive(Debug, Clone, Validate)]
pub struct JobQueueConfig {
    #[garde(range(min = 1))]
    pub max_jobs: usize,

    #[garde(custom(non_zero))]
    pub retention: Duration,

    #[garde(custom(non_zero))]
    pub aggressive_retention: Duration,

    #[garde(custom(non_zero))]
    pub sweep_interval: Duration,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            max_jobs: default_max_jobs(),
            retention: Duration::from_secs(default_job_retention_secs()),
            aggressive_retention: Duration::from_secs(default_aggressive_retention_secs()),
            sweep_interval: Duration::from_secs(default_sweep_interval_secs()),
        }
    }
}

fn non_zero(value: &Duration, _ctx: &()) -> garde::Result {
    if value.is_zero() {
        return Err(garde::Error::new("duration must be greater than zero"));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] garde::Report),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = JobQueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_jobs, 1000);
        assert_eq!(config.retention, Duration::from_secs(900));
        assert_eq!(config.aggressive_retention, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = JobQueueConfig {
            max_jobs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = JobQueueConfig {
            sweep_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    fn vars(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        std::iter::once(("OPENAI_API_KEY", "sk-test"))
            .chain(extra.iter().copied())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_defaults_fill_in() {
        let config = AppConfig::from_vars(vars(&[])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.vision_model, "gpt-4o-mini");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.job_queue().max_jobs, 1000);
    }

    #[test]
    fn test_zero_durations_and_limits_rejected() {
        for key in [
            "IMAGE_RETENTION_SECS",
            "VISION_TIMEOUT_SECS",
            "MAX_UPLOAD_BYTES",
            "MAX_JOBS",
            "JOB_RETENTION_SECS",
            "AGGRESSIVE_RETENTION_SECS",
            "SWEEP_INTERVAL_SECS",
        ] {
            let result = AppConfig::from_vars(vars(&[(key, "0")]));
            assert!(
                matches!(result, Err(ConfigError::Invalid(_))),
                "{key}=0 should be rejected"
            );
        }
    }

    #[test]
    fn test_overrides_are_read() {
        let config = AppConfig::from_vars(vars(&[
            ("IMAGE_RETENTION_SECS", "30"),
            ("VISION_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.image_retention(), Duration::from_secs(30));
        assert_eq!(config.vision_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_api_key_is_env_error() {
        let result = AppConfig::from_vars(Vec::<(String, String)>::new());
        assert!(matches!(result, Err(ConfigError::Env(_))));
    }
}
