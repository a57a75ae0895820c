//! Configuration types for the reception backend.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the receptionist.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceptionConfig {
    /// Directory holding all persisted documents (session table, shared
    /// state snapshot, signal slot).
    pub data_dir: PathBuf,
    /// Wake/sleep gating settings.
    pub gate: GateConfig,
    /// Face match engine settings.
    pub face: FaceMatchConfig,
    /// Flow state machine settings.
    pub flow: FlowConfig,
    /// One-time-passcode settings.
    pub otp: OtpConfig,
}

impl Default for ReceptionConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            gate: GateConfig::default(),
            face: FaceMatchConfig::default(),
            flow: FlowConfig::default(),
            otp: OtpConfig::default(),
        }
    }
}

/// Wake/sleep gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Seconds of inactivity after which an awake receptionist goes back
    /// to sleep on the next input.
    pub auto_sleep_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            auto_sleep_secs: 180,
        }
    }
}

/// Face match engine configuration.
///
/// Distances are Euclidean in the embedding space produced by the
/// (external) face detector. Typical spacing for 128-d face embeddings:
///   - same person: 0.3–0.5
///   - different people: 0.7+
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceMatchConfig {
    /// Whether face matching is administratively enabled. When disabled,
    /// the flow always degrades to manual verification.
    pub enabled: bool,
    /// Maximum distance for the closest gallery entry to be accepted.
    pub match_threshold: f32,
    /// Below this distance a match is accepted even when a runner-up is
    /// close — the match alone is already unambiguous.
    pub strong_match_threshold: f32,
    /// If the runner-up is within this margin of the best match (and the
    /// best is not a strong match), the result is ambiguous.
    pub ambiguity_margin: f32,
    /// During registration, warn when the new embedding is closer than
    /// this to a different identity.
    pub duplicate_warn_distance: f32,
}

impl Default for FaceMatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            match_threshold: 0.6,
            strong_match_threshold: 0.4,
            ambiguity_margin: 0.05,
            duplicate_warn_distance: 0.4,
        }
    }
}

/// Flow state machine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Sessions idle longer than this are removed by cleanup.
    pub session_max_age_hours: u64,
    /// Verification attempts before the session must be reset.
    pub max_verification_attempts: u32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            session_max_age_hours: 2,
            max_verification_attempts: 3,
        }
    }
}

/// One-time-passcode configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Failed verification attempts before the OTP session is reset.
    pub max_attempts: u32,
    /// Number of digits in a generated code.
    pub code_digits: u32,
    /// When true, skip delivery entirely and hand the code back in the
    /// confirmation message. For local development only.
    pub dev_mode: bool,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            code_digits: 6,
            dev_mode: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(dir) = dirs::data_dir() {
        dir.join("clara")
    } else {
        PathBuf::from("/tmp").join("clara")
    }
}

impl ReceptionConfig {
    /// Load configuration from a TOML file, falling back to defaults for
    /// missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ReceptionError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ReceptionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
