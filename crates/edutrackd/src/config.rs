use edutrack_core::ConfidenceThreshold;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Gateway configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on (default: 0.0.0.0:5000).
    pub bind_addr: SocketAddr,
    /// Base URL of the face-recognition vendor, without a trailing slash.
    pub face_endpoint: String,
    /// Vendor subscription key.
    pub face_api_key: String,
    /// Reference group that identify calls match against.
    pub person_group_id: String,
    /// Minimum candidate confidence for a positive mark.
    pub confidence_threshold: ConfidenceThreshold,
    /// Candidates requested from each identify call.
    pub max_candidates: u32,
    /// Timeout applied to each vendor call.
    pub vendor_timeout: Duration,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `EDUTRACK_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let threshold: f64 = parse_or(&lookup, "EDUTRACK_CONFIDENCE_THRESHOLD", 0.70)?;
        let confidence_threshold =
            ConfidenceThreshold::new(threshold).map_err(|_| ConfigError::Invalid {
                key: "EDUTRACK_CONFIDENCE_THRESHOLD",
                value: threshold.to_string(),
            })?;

        let max_candidates: u32 = parse_or(&lookup, "EDUTRACK_MAX_CANDIDATES", 1)?;
        if max_candidates == 0 {
            return Err(ConfigError::Invalid {
                key: "EDUTRACK_MAX_CANDIDATES",
                value: "0".into(),
            });
        }

        let vendor_timeout_secs: u64 = parse_or(&lookup, "EDUTRACK_VENDOR_TIMEOUT_SECS", 20)?;
        if vendor_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "EDUTRACK_VENDOR_TIMEOUT_SECS",
                value: "0".into(),
            });
        }

        Ok(Self {
            bind_addr: parse_or(&lookup, "EDUTRACK_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
            face_endpoint: required("EDUTRACK_FACE_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            face_api_key: required("EDUTRACK_FACE_API_KEY")?,
            person_group_id: required("EDUTRACK_PERSON_GROUP_ID")?,
            confidence_threshold,
            max_candidates,
            vendor_timeout: Duration::from_secs(vendor_timeout_secs),
            max_upload_bytes: parse_or(&lookup, "EDUTRACK_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}
