//! Pipeline configuration: runtime knobs plus YAML file support.
//!
//! [`MatchConfig`] is what the pipeline itself consumes. The remaining
//! structs exist so a whole deployment (matcher knobs, image source, bundled
//! extractor) can be described in one YAML file and loaded at startup.
//!
//! ## Example YAML configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "event gallery"
//!
//! matcher:
//!   threshold: 0.5
//!   concurrency: 4
//!   per_candidate_timeout_ms: 5000
//!   serialize_extraction: false
//!
//! source:
//!   kind: "file"
//!   root: "./photos"
//!   max_bytes: 10485760
//!
//! extractor:
//!   kind: "hash"
//!   dim: 128
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::MatchError;

/// Errors that can occur when loading a YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Runtime knobs for one matching run.
///
/// Cheap to clone and serde-friendly so it can be embedded in higher-level
/// configs or shipped across process boundaries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    /// Maximum Euclidean distance between descriptors still considered the
    /// same person.
    #[serde(default = "MatchConfig::default_threshold")]
    pub threshold: f32,

    /// Upper bound on candidates in flight at once. Kept small by default to
    /// respect rate limits of the image source and extractor.
    #[serde(default = "MatchConfig::default_concurrency")]
    pub concurrency: usize,

    /// Optional wall-clock cap on one candidate's fetch + extraction. A
    /// candidate that exceeds it is reported as failed, not retried.
    #[serde(default)]
    pub per_candidate_timeout_ms: Option<u64>,

    /// Serialize extraction calls across workers. Required for backends
    /// whose underlying model is not reentrant; leave off for backends safe
    /// under concurrent invocation.
    #[serde(default)]
    pub serialize_extraction: bool,
}

impl MatchConfig {
    pub(crate) fn default_threshold() -> f32 {
        0.5
    }

    pub(crate) fn default_concurrency() -> usize {
        4
    }

    /// The per-candidate timeout as a `Duration`, when configured.
    pub fn per_candidate_timeout(&self) -> Option<Duration> {
        self.per_candidate_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration before a run.
    pub fn validate(&self) -> Result<(), MatchError> {
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(MatchError::InvalidConfig(
                "threshold must be finite and greater than zero".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(MatchError::InvalidConfig(
                "concurrency must be greater than zero".into(),
            ));
        }
        if self.per_candidate_timeout_ms == Some(0) {
            return Err(MatchError::InvalidConfig(
                "per_candidate_timeout_ms must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            threshold: Self::default_threshold(),
            concurrency: Self::default_concurrency(),
            per_candidate_timeout_ms: None,
            serialize_extraction: false,
        }
    }
}

/// Where candidate bytes come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// One of `"memory"`, `"file"`, `"http"`.
    #[serde(default = "SourceConfig::default_kind")]
    pub kind: String,

    /// Root directory for `kind: file`.
    #[serde(default)]
    pub root: Option<String>,

    /// Base URL prepended to relative locators for `kind: http`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Per-request timeout for `kind: http`.
    #[serde(default = "SourceConfig::default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connection timeout for `kind: http`.
    #[serde(default = "SourceConfig::default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Largest image the source will hand to the pipeline.
    #[serde(default = "SourceConfig::default_max_bytes")]
    pub max_bytes: usize,
}

impl SourceConfig {
    pub(crate) fn default_kind() -> String {
        "file".to_string()
    }

    pub(crate) fn default_timeout_secs() -> u64 {
        30
    }

    pub(crate) fn default_connect_timeout_secs() -> u64 {
        10
    }

    pub(crate) fn default_max_bytes() -> usize {
        10 * 1024 * 1024
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid_kinds = ["memory", "file", "http"];
        if !valid_kinds.contains(&self.kind.as_str()) {
            return Err(ConfigError::Validation(format!(
                "source.kind must be one of: {valid_kinds:?}"
            )));
        }
        if self.kind == "file" && self.root.is_none() {
            return Err(ConfigError::Validation(
                "source.root is required when kind is 'file'".to_string(),
            ));
        }
        if self.timeout_secs == 0 || self.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "source timeouts must be greater than zero".to_string(),
            ));
        }
        if self.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "source.max_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            kind: Self::default_kind(),
            root: Some(".".to_string()),
            base_url: None,
            timeout_secs: Self::default_timeout_secs(),
            connect_timeout_secs: Self::default_connect_timeout_secs(),
            max_bytes: Self::default_max_bytes(),
        }
    }
}

/// Settings for the bundled deterministic extractor.
///
/// Real detection backends bring their own configuration and only implement
/// the [`DescriptorExtractor`](crate::extractor::DescriptorExtractor) trait.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractorConfig {
    /// Backend selector; `"hash"` is the only bundled kind.
    #[serde(default = "ExtractorConfig::default_kind")]
    pub kind: String,

    /// Descriptor dimensionality.
    #[serde(default = "ExtractorConfig::default_dim")]
    pub dim: usize,

    /// Seed for the per-lane hashing; runs that must agree on descriptors
    /// must agree on the seed.
    #[serde(default = "ExtractorConfig::default_seed")]
    pub seed: u64,
}

impl ExtractorConfig {
    pub(crate) fn default_kind() -> String {
        "hash".to_string()
    }

    pub(crate) fn default_dim() -> usize {
        128
    }

    pub(crate) fn default_seed() -> u64 {
        0x5EED_FACE_5EED_FACE
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.kind != "hash" {
            return Err(ConfigError::Validation(format!(
                "extractor.kind `{}` is not bundled; implement DescriptorExtractor for external backends",
                self.kind
            )));
        }
        if self.dim == 0 {
            return Err(ConfigError::Validation(
                "extractor.dim must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            kind: Self::default_kind(),
            dim: Self::default_dim(),
            seed: Self::default_seed(),
        }
    }
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct FacematchConfig {
    /// Configuration format version.
    pub version: String,

    /// Optional configuration name/description.
    #[serde(default)]
    pub name: Option<String>,

    /// Matching run knobs.
    #[serde(default)]
    pub matcher: MatchConfig,

    /// Image source settings.
    #[serde(default)]
    pub source: SourceConfig,

    /// Bundled extractor settings.
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

impl FacematchConfig {
    /// Load a YAML configuration file from the given path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: FacematchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigError::UnsupportedVersion(v.to_string())),
        }?;

        self.matcher
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        self.source.validate()?;
        self.extractor.validate()?;

        Ok(())
    }
}

impl Default for FacematchConfig {
    fn default() -> Self {
        FacematchConfig {
            version: "1.0".to_string(),
            name: None,
            matcher: MatchConfig::default(),
            source: SourceConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_match_config_is_valid() {
        let cfg = MatchConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.threshold, 0.5);
        assert_eq!(cfg.concurrency, 4);
        assert!(cfg.per_candidate_timeout().is_none());
        assert!(!cfg.serialize_extraction);
    }

    #[test]
    fn zero_threshold_rejected() {
        let cfg = MatchConfig {
            threshold: 0.0,
            ..MatchConfig::default()
        };
        let err = cfg.validate().expect_err("config should be invalid");
        match err {
            MatchError::InvalidConfig(msg) => assert!(msg.contains("threshold")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_finite_threshold_rejected() {
        for bad in [f32::NAN, f32::INFINITY, -1.0] {
            let cfg = MatchConfig {
                threshold: bad,
                ..MatchConfig::default()
            };
            assert!(cfg.validate().is_err(), "threshold {bad} should be rejected");
        }
    }

    #[test]
    fn zero_concurrency_rejected() {
        let cfg = MatchConfig {
            concurrency: 0,
            ..MatchConfig::default()
        };
        let err = cfg.validate().expect_err("config should be invalid");
        match err {
            MatchError::InvalidConfig(msg) => assert!(msg.contains("concurrency")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = MatchConfig {
            per_candidate_timeout_ms: Some(0),
            ..MatchConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = MatchConfig {
            per_candidate_timeout_ms: Some(250),
            ..MatchConfig::default()
        };
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.per_candidate_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn load_valid_yaml() {
        let yaml = r#"
version: "1.0"
name: "test config"
matcher:
  threshold: 0.45
  concurrency: 8
source:
  kind: "file"
  root: "./photos"
"#;

        let config = FacematchConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.matcher.threshold, 0.45);
        assert_eq!(config.matcher.concurrency, 8);
        assert_eq!(config.source.root.as_deref(), Some("./photos"));
        // Omitted fields fall back to defaults.
        assert_eq!(config.extractor.dim, 128);
        assert_eq!(config.source.max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn load_from_file() {
        let yaml = r#"
version: "1"
matcher:
  threshold: 0.6
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = FacematchConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.matcher.threshold, 0.6);
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let result = FacematchConfig::from_yaml("version: [");
        assert!(matches!(result, Err(ConfigError::YamlParse(_))));
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let result = FacematchConfig::from_file("/definitely/not/here/facematch.yaml");
        assert!(matches!(result, Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn unsupported_version_rejected() {
        let yaml = r#"
version: "2.0"
"#;

        let result = FacematchConfig::from_yaml(yaml);
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(v)) if v == "2.0"));
    }

    #[test]
    fn matcher_validation_surfaces_through_file_load() {
        let yaml = r#"
version: "1.0"
matcher:
  concurrency: 0
"#;

        let result = FacematchConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("concurrency")
        );
    }

    #[test]
    fn file_source_requires_root() {
        let yaml = r#"
version: "1.0"
source:
  kind: "file"
  root: ~
"#;

        let result = FacematchConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("source.root"));
    }

    #[test]
    fn unknown_source_kind_rejected() {
        let yaml = r#"
version: "1.0"
source:
  kind: "ftp"
"#;

        let result = FacematchConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("source.kind"));
    }

    #[test]
    fn unknown_extractor_kind_rejected() {
        let yaml = r#"
version: "1.0"
extractor:
  kind: "cnn"
"#;

        let result = FacematchConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cnn"));
    }

    #[test]
    fn default_config_is_valid() {
        let config = FacematchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.version, "1.0");
        assert!(config.name.is_none());
    }
}
