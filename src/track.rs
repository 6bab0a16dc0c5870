//! Track data model: the closed set of voice kinds a channel can carry,
//! waveform shapes, background effects, and the raw amplitude/intensity
//! units used throughout the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseErrorKind;

/// Maximum raw amplitude (100%).
pub const AMPLITUDE_MAX: f64 = 4096.0;

/// Convert a user-facing percentage (0–100) to the raw 0..=4096 scale.
pub fn amplitude_from_percent(percent: f64) -> f64 {
    percent * 40.96
}

/// Convert a raw amplitude back to a percentage.
pub fn amplitude_to_percent(raw: f64) -> f64 {
    raw / 40.96
}

/// Convert a user-facing percentage (0–100) to the 0.0..=1.0 intensity scale.
pub fn intensity_from_percent(percent: f64) -> f64 {
    percent / 100.0
}

pub fn intensity_to_percent(raw: f64) -> f64 {
    raw * 100.0
}

// ── Waveform ────────────────────────────────────────────────

/// Waveform shape, indexing one of the four precomputed wavetables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Default for Waveform {
    fn default() -> Self {
        Waveform::Sine
    }
}

impl Waveform {
    pub fn from_keyword(tok: &str) -> Option<Waveform> {
        match tok {
            "sine" => Some(Waveform::Sine),
            "square" => Some(Waveform::Square),
            "triangle" => Some(Waveform::Triangle),
            "sawtooth" => Some(Waveform::Sawtooth),
            _ => None,
        }
    }

    /// Index into the wavetable array.
    pub fn table_index(self) -> usize {
        match self {
            Waveform::Sine => 0,
            Waveform::Square => 1,
            Waveform::Triangle => 2,
            Waveform::Sawtooth => 3,
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
        };
        write!(f, "{name}")
    }
}

// ── Noise ───────────────────────────────────────────────────

/// Colored-noise flavor, shared by plain noise tracks and spin tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    White,
    Pink,
    Brown,
}

impl NoiseKind {
    pub fn from_keyword(tok: &str) -> Option<NoiseKind> {
        match tok {
            "white" => Some(NoiseKind::White),
            "pink" => Some(NoiseKind::Pink),
            "brown" => Some(NoiseKind::Brown),
            _ => None,
        }
    }
}

impl fmt::Display for NoiseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NoiseKind::White => "white",
            NoiseKind::Pink => "pink",
            NoiseKind::Brown => "brown",
        };
        write!(f, "{name}")
    }
}

// ── Effect ──────────────────────────────────────────────────

/// Secondary low-frequency modulation applied to a background track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectKind {
    #[default]
    Off,
    /// Stereo rotation driven by an LFO.
    Spin,
    /// Amplitude envelope driven by an LFO.
    Pulse,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Effect {
    pub kind: EffectKind,
    /// 0.0..=1.0 — how much of the effect is mixed in.
    pub intensity: f64,
}

// ── Track kind ──────────────────────────────────────────────

/// The closed set of voice kinds. Dispatch on this happens at exactly two
/// places in the engine: channel sync and sample generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackKind {
    /// Slot not in use.
    #[default]
    Off,
    /// An audible-nothing placeholder; fades are built from it.
    Silence,
    /// Pure tone, no beat.
    Tone,
    Binaural,
    Monaural,
    Isochronic,
    Noise(NoiseKind),
    /// Spinning (stereo-rotating) noise.
    Spin(NoiseKind),
    /// Looped external audio, optionally effect-modulated.
    Background,
}

impl TrackKind {
    /// Off and Silence produce no sound and are exempt from the adjacency
    /// type-change rule.
    pub fn is_live(self) -> bool {
        !matches!(self, TrackKind::Off | TrackKind::Silence)
    }

    pub fn is_off(self) -> bool {
        self == TrackKind::Off
    }

    pub fn is_silence(self) -> bool {
        self == TrackKind::Silence
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Off => write!(f, "off"),
            TrackKind::Silence => write!(f, "silence"),
            TrackKind::Tone => write!(f, "tone"),
            TrackKind::Binaural => write!(f, "binaural"),
            TrackKind::Monaural => write!(f, "monaural"),
            TrackKind::Isochronic => write!(f, "isochronic"),
            TrackKind::Noise(kind) => write!(f, "{kind} noise"),
            TrackKind::Spin(kind) => write!(f, "{kind} spin"),
            TrackKind::Background => write!(f, "background"),
        }
    }
}

// ── Track ───────────────────────────────────────────────────

/// One track slot of a preset: a voice kind plus its parameters.
///
/// `carrier` doubles as the spin width (µs) for spin/background-spin
/// tracks; `resonance` doubles as the spin/pulse modulation rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Track {
    pub kind: TrackKind,
    /// Raw amplitude, 0..=4096 for 0–100%.
    pub amplitude: f64,
    /// Carrier frequency in Hz (or spin width in µs).
    pub carrier: f64,
    /// Resonance frequency in Hz (or modulation rate).
    pub resonance: f64,
    pub waveform: Waveform,
    pub effect: Effect,
}

impl Track {
    pub fn off() -> Track {
        Track::default()
    }

    pub fn silence() -> Track {
        Track {
            kind: TrackKind::Silence,
            ..Track::default()
        }
    }

    /// Range-check the parameters. Run after construction from user input
    /// and again after a template override.
    pub fn validate(&self) -> Result<(), ParseErrorKind> {
        if self.amplitude < 0.0 || self.amplitude > AMPLITUDE_MAX {
            return Err(ParseErrorKind::Semantic(format!(
                "amplitude must be between 0 and 100, received {:.2}",
                amplitude_to_percent(self.amplitude)
            )));
        }
        if self.carrier < 0.0 {
            return Err(ParseErrorKind::Semantic(format!(
                "carrier frequency must be positive, received {:.2}",
                self.carrier
            )));
        }
        if self.resonance < 0.0 {
            return Err(ParseErrorKind::Semantic(format!(
                "resonance frequency must be positive, received {:.2}",
                self.resonance
            )));
        }
        if self.effect.intensity < 0.0 || self.effect.intensity > 1.0 {
            return Err(ParseErrorKind::Semantic(format!(
                "intensity must be between 0 and 100, received {:.2}",
                intensity_to_percent(self.effect.intensity)
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Track {
    /// Render the track as a text-grammar line body (the form emitted by
    /// sequence conversion, re-parseable by the text loader).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let amp = amplitude_to_percent(self.amplitude);
        match self.kind {
            TrackKind::Off | TrackKind::Silence => write!(f, "- -"),
            TrackKind::Tone => write!(
                f,
                "waveform {} tone {:.2} amplitude {:.2}",
                self.waveform, self.carrier, amp
            ),
            TrackKind::Binaural | TrackKind::Monaural | TrackKind::Isochronic => {
                let mode = match self.kind {
                    TrackKind::Binaural => "binaural",
                    TrackKind::Monaural => "monaural",
                    _ => "isochronic",
                };
                write!(
                    f,
                    "waveform {} tone {:.2} {} {:.2} amplitude {:.2}",
                    self.waveform, self.carrier, mode, self.resonance, amp
                )
            }
            TrackKind::Noise(kind) => write!(f, "noise {kind} amplitude {amp:.2}"),
            TrackKind::Spin(kind) => write!(
                f,
                "waveform {} spin {} width {:.2} rate {:.2} amplitude {:.2}",
                self.waveform, kind, self.carrier, self.resonance, amp
            ),
            TrackKind::Background => match self.effect.kind {
                EffectKind::Spin => write!(
                    f,
                    "waveform {} background spin {:.2} rate {:.2} intensity {:.2} amplitude {:.2}",
                    self.waveform,
                    self.carrier,
                    self.resonance,
                    intensity_to_percent(self.effect.intensity),
                    amp
                ),
                EffectKind::Pulse => write!(
                    f,
                    "waveform {} background pulse {:.2} intensity {:.2} amplitude {:.2}",
                    self.waveform,
                    self.resonance,
                    intensity_to_percent(self.effect.intensity),
                    amp
                ),
                EffectKind::Off => write!(f, "background amplitude {amp:.2}"),
            },
        }
    }
}
