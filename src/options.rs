//! Resolved sequence options and background gain levels.

use std::fmt;

use crate::error::ParseErrorKind;

/// Attenuation applied to background audio, in dB below full scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl GainLevel {
    pub fn from_keyword(tok: &str) -> Option<GainLevel> {
        match tok {
            "verylow" => Some(GainLevel::VeryLow),
            "low" => Some(GainLevel::Low),
            "medium" => Some(GainLevel::Medium),
            "high" => Some(GainLevel::High),
            "veryhigh" => Some(GainLevel::VeryHigh),
            _ => None,
        }
    }

    /// Attenuation in dB (applied as `10^(-dB/20)`).
    pub fn attenuation_db(self) -> f64 {
        match self {
            GainLevel::VeryLow => 20.0,
            GainLevel::Low => 16.0,
            GainLevel::Medium => 12.0,
            GainLevel::High => 6.0,
            GainLevel::VeryHigh => 0.0,
        }
    }
}

impl fmt::Display for GainLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GainLevel::VeryLow => "verylow",
            GainLevel::Low => "low",
            GainLevel::Medium => "medium",
            GainLevel::High => "high",
            GainLevel::VeryHigh => "veryhigh",
        };
        write!(f, "{name}")
    }
}

/// Options resolved from `@...` lines (text) or the `options` object
/// (structured input).
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceOptions {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Global volume, 0–100.
    pub volume: u32,
    /// Locator of the background audio file, if any.
    pub background: Option<String>,
    pub gain_level: GainLevel,
}

impl Default for SequenceOptions {
    fn default() -> Self {
        SequenceOptions {
            sample_rate: 44_100,
            volume: 100,
            background: None,
            gain_level: GainLevel::Medium,
        }
    }
}

impl SequenceOptions {
    pub fn validate(&self) -> Result<(), ParseErrorKind> {
        if self.sample_rate == 0 {
            return Err(ParseErrorKind::Semantic(format!(
                "invalid sample rate: {}",
                self.sample_rate
            )));
        }
        if self.volume > 100 {
            return Err(ParseErrorKind::Semantic(format!(
                "invalid volume: {}",
                self.volume
            )));
        }
        Ok(())
    }
}
