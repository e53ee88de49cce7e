//! Post-processor configuration model.

use crate::error::{SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// When work coordinate systems are probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Probe every used frame in the preamble, before any operation runs.
    AtStart,
    /// Probe each frame just before switching into it.
    #[default]
    OnChange,
    /// Never emit probe commands.
    None,
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtStart => write!(f, "AT_START"),
            Self::OnChange => write!(f, "ON_CHANGE"),
            Self::None => write!(f, "NONE"),
        }
    }
}

/// Variable spindle speed control bracket.
///
/// When enabled, spindle RPM is varied around the requested speed to avoid
/// harmonic resonance between tool and workpiece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VsscSettings {
    /// Bracket the run with enable/disable commands.
    pub enabled: bool,
    /// Period over which RPM is varied up and down, in milliseconds.
    pub period_ms: u32,
    /// Variance around the target RPM, in RPM.
    pub variance_rpm: u32,
}

impl Default for VsscSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            period_ms: 4000,
            variance_rpm: 200,
        }
    }
}

/// Read-only configuration consumed by the emission engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostSettings {
    /// Emit the tool table header. Disabling this makes tool changes much
    /// harder for the operator.
    pub output_tools: bool,
    /// Emit supplemental machine setup (homing, reference probing, frame
    /// probing) in the preamble.
    pub output_job_setup: bool,
    /// Home all axes before the first operation.
    pub home_before_start: bool,
    /// Allow operations to start with a stationary spindle. Useful for
    /// drag knives; leave off for milling.
    pub allow_zero_rpm: bool,
    /// Emit a firmware version check in the header.
    pub version_check: bool,
    /// When used frames are probed and zeroed.
    pub probe_mode: ProbeMode,
    /// Spindle speed modulation bracket.
    pub vssc: VsscSettings,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            output_tools: true,
            output_job_setup: true,
            home_before_start: false,
            allow_zero_rpm: false,
            version_check: true,
            probe_mode: ProbeMode::default(),
            vssc: VsscSettings::default(),
        }
    }
}

impl PostSettings {
    /// Load settings from a TOML or JSON file, keyed on extension.
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(toml::from_str(&std::fs::read_to_string(path)?)?),
            Some("json") => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Save settings to a TOML or JSON file, keyed on extension.
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::to_string_pretty(self)?,
            Some("json") => serde_json::to_string_pretty(self)?,
            other => {
                return Err(SettingsError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_normal_milling() {
        let settings = PostSettings::default();
        assert!(settings.output_tools);
        assert!(settings.output_job_setup);
        assert!(!settings.home_before_start);
        assert!(!settings.allow_zero_rpm);
        assert!(settings.version_check);
        assert_eq!(settings.probe_mode, ProbeMode::OnChange);
        assert!(settings.vssc.enabled);
        assert_eq!(settings.vssc.period_ms, 4000);
        assert_eq!(settings.vssc.variance_rpm, 200);
    }

    #[test]
    fn test_probe_mode_display() {
        assert_eq!(ProbeMode::AtStart.to_string(), "AT_START");
        assert_eq!(ProbeMode::OnChange.to_string(), "ON_CHANGE");
        assert_eq!(ProbeMode::None.to_string(), "NONE");
    }

    #[test]
    fn test_toml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.toml");
        let mut settings = PostSettings::default();
        settings.probe_mode = ProbeMode::AtStart;
        settings.vssc.enabled = false;
        settings.save_to_file(&path).unwrap();
        let loaded = PostSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("post.json");
        let mut settings = PostSettings::default();
        settings.home_before_start = true;
        settings.save_to_file(&path).unwrap();
        let loaded = PostSettings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "allow_zero_rpm = true\n").unwrap();
        let loaded = PostSettings::load_from_file(&path).unwrap();
        assert!(loaded.allow_zero_rpm);
        assert!(loaded.output_tools);
        assert_eq!(loaded.probe_mode, ProbeMode::OnChange);
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let err = PostSettings::load_from_file(Path::new("post.yaml")).unwrap_err();
        assert!(matches!(err, SettingsError::UnsupportedFormat(_)));
    }
}
