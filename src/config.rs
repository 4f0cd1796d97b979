//! Engine configuration.
//!
//! Search bounds and validation policy. Every field has a default, so an
//! empty TOML document is a valid configuration:
//!
//! ```toml
//! [search]
//! backtrack_factor = 4
//! max_backtrack_depth = 8
//! max_placement_attempts = 250000
//! spread_days = true
//!
//! [validation]
//! shortfall = "violation"
//! max_consecutive_sessions = 3
//! workload_warning_hours = 20
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search: SearchSettings,
    pub validation: ValidationPolicy,
}

/// Search ceilings and slot preference.
///
/// The ceilings keep one invocation from running unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Total backtracks allowed = factor × requirement count.
    pub backtrack_factor: usize,
    /// Competing placements examined for one failing requirement.
    pub max_backtrack_depth: usize,
    /// Candidate (slot, faculty, room) checks allowed per invocation.
    pub max_placement_attempts: usize,
    /// Try days a (subject, section) pair has not used yet before reusing one.
    pub spread_days: bool,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backtrack_factor: 4,
            max_backtrack_depth: 8,
            max_placement_attempts: 250_000,
            spread_days: true,
        }
    }
}

impl SearchSettings {
    /// Backtrack budget for `requirements` units of work.
    pub fn backtrack_budget(&self, requirements: usize) -> usize {
        self.backtrack_factor.saturating_mul(requirements.max(1))
    }
}

/// How a (subject, section) pair with too few sessions is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallPolicy {
    /// Blocks `satisfied` via an `UnscheduledRequirement` violation.
    #[default]
    Violation,
    /// Reported as a `SessionShortfall` warning only.
    Warning,
}

/// Validator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationPolicy {
    pub shortfall: ShortfallPolicy,
    /// Longest run of back-to-back sessions before a warning.
    pub max_consecutive_sessions: u32,
    /// Recommended weekly load for faculty without an explicit cap.
    pub workload_warning_hours: u32,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            shortfall: ShortfallPolicy::Violation,
            max_consecutive_sessions: 3,
            workload_warning_hours: 20,
        }
    }
}

impl EngineConfig {
    /// Parses and checks a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::InvalidSettings(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Reads and checks a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidSettings(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Rejects settings that would make the search or validation meaningless.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.search.backtrack_factor == 0 {
            return Err(ConfigError::InvalidSettings(
                "search.backtrack_factor must be at least 1".into(),
            ));
        }
        if self.search.max_placement_attempts == 0 {
            return Err(ConfigError::InvalidSettings(
                "search.max_placement_attempts must be at least 1".into(),
            ));
        }
        if self.validation.max_consecutive_sessions == 0 {
            return Err(ConfigError::InvalidSettings(
                "validation.max_consecutive_sessions must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
