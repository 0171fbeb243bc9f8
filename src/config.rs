use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TonnetzError};
use crate::intervals::TonnetzIntervals;
use crate::notes::{MidiByte, MAX_MIDI_VALUE};

pub const DEFAULT_EXTENT: (usize, usize) = (12, 24);
pub const DEFAULT_START_PITCH: MidiByte = 57;
pub const DEFAULT_MAX_CHANNELS: usize = 3;
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.7;

/// Everything that determines a lattice. Two equal configs build identical lattices.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TonnetzConfig {
    pub intervals: TonnetzIntervals,
    /// Row count and column span, as given to the triangular lattice generator.
    pub extent: (usize, usize),
    pub start_pitch: MidiByte,
}

impl TonnetzConfig {
    pub fn validate(&self) -> Result<()> {
        if (0..=MAX_MIDI_VALUE).contains(&self.start_pitch) {
            Ok(())
        } else {
            Err(TonnetzError::InvalidStartPitch {pitch: self.start_pitch})
        }
    }
}

impl Default for TonnetzConfig {
    fn default() -> Self {
        TonnetzConfig {
            intervals: TonnetzIntervals::default(),
            extent: DEFAULT_EXTENT,
            start_pitch: DEFAULT_START_PITCH,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Only the first `max_channels` tracks of each song are compared.
    pub max_channels: usize,
    pub match_threshold: f64,
    pub dist_weighted: bool,
    /// Added to the second song's pitches before looking for shared transitions.
    pub pitch_offset: MidiByte,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        ComparisonConfig {
            max_channels: DEFAULT_MAX_CHANNELS,
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            dist_weighted: true,
            pitch_offset: 0,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub tonnetz: TonnetzConfig,
    pub comparison: ComparisonConfig,
}

impl AnalysisConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: AnalysisConfig = toml::from_str(text).context("parsing analysis configuration")?;
        config.tonnetz.validate().context("checking [tonnetz] settings")?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = AnalysisConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.tonnetz.intervals, TonnetzIntervals(3, 4, 5));
        assert_eq!(config.tonnetz.extent, (12, 24));
        assert_eq!(config.tonnetz.start_pitch, 57);
        assert_eq!(config.comparison.max_channels, 3);
        assert!(config.comparison.dist_weighted);
    }

    #[test]
    fn test_partial_config() {
        let text = "
[tonnetz]
start_pitch = 60
extent = [4, 8]

[comparison]
max_channels = 5
dist_weighted = false
";
        let config = AnalysisConfig::from_toml_str(text).unwrap();
        assert_eq!(config.tonnetz.start_pitch, 60);
        assert_eq!(config.tonnetz.extent, (4, 8));
        assert_eq!(config.tonnetz.intervals, TonnetzIntervals(3, 4, 5));
        assert_eq!(config.comparison.max_channels, 5);
        assert!(!config.comparison.dist_weighted);
        assert_eq!(config.comparison.match_threshold, DEFAULT_MATCH_THRESHOLD);
    }

    #[test]
    fn test_bad_config() {
        assert!(AnalysisConfig::from_toml_str("[tonnetz]\nstart_pitch = \"A3\"").is_err());
        assert!(AnalysisConfig::load("/nonexistent/tonnetz.toml").is_err());
        assert!(AnalysisConfig::from_toml_str("[tonnetz]\nstart_pitch = 32767").is_err());
        assert!(AnalysisConfig::from_toml_str("[tonnetz]\nstart_pitch = -1").is_err());
        assert!(AnalysisConfig::from_toml_str("[tonnetz]\nstart_pitch = 127").is_ok());
    }
}
