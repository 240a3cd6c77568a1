//! Configuration for the verification engine.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML did not parse
    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Values out of range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Configuration for a verification registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registry instance ID
    pub registry_id: String,
    /// Compliance runner configuration
    pub compliance: ComplianceConfig,
    /// Audit log configuration
    pub audit: AuditConfig,
    /// General settings
    pub general: GeneralConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registry_id: uuid::Uuid::new_v4().to_string(),
            compliance: ComplianceConfig::default(),
            audit: AuditConfig::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create a new config with registry ID.
    pub fn new(registry_id: impl Into<String>) -> Self {
        Self {
            registry_id: registry_id.into(),
            ..Default::default()
        }
    }

    /// Load config from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compliance.max_concurrent_checks == 0 {
            return Err(ConfigError::Invalid(
                "compliance.max_concurrent_checks must be at least 1".to_string(),
            ));
        }
        if self.compliance.check_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "compliance.check_timeout_ms must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.compliance.gis_area_tolerance_pct) {
            return Err(ConfigError::Invalid(
                "compliance.gis_area_tolerance_pct must be within 0-100".to_string(),
            ));
        }
        if self.compliance.min_authenticity_score > 100 {
            return Err(ConfigError::Invalid(
                "compliance.min_authenticity_score must be within 0-100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Compliance runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Per-check timeout (ms)
    pub check_timeout_ms: u64,
    /// Maximum checks running at once
    pub max_concurrent_checks: usize,
    /// Panchayat updates required before the battery can pass
    pub min_panchayat_updates: usize,
    /// Allowed deviation between surveyed and declared area (percent)
    pub gis_area_tolerance_pct: f64,
    /// Minimum authenticity score for each media item (0 - 100)
    pub min_authenticity_score: u8,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            check_timeout_ms: 5_000,
            max_concurrent_checks: 4,
            min_panchayat_updates: 1,
            gis_area_tolerance_pct: 10.0,
            min_authenticity_score: 70,
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Record audit entries
    pub enabled: bool,
    /// Entries retained before pruning
    pub max_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
        }
    }
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,
    /// Methodology passed to certificate issuance
    pub default_methodology: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            default_methodology: "VM0033".to_string(),
        }
    }
}
