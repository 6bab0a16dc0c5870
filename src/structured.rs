//! Structured sequence input: one serde schema shared by JSON, XML, and
//! YAML. The three formats are isomorphic; XML uses element-based fields
//! so the same derive drives all of them.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ParseErrorKind, SynapseqError};
use crate::options::{GainLevel, SequenceOptions};
use crate::preset::NUM_CHANNELS;
use crate::sequence::Sequence;
use crate::timeline::{adjust_periods, Period, Transition};
use crate::track::{
    amplitude_from_percent, intensity_from_percent, Effect, EffectKind, NoiseKind, Track,
    TrackKind, Waveform,
};

/// Which structured syntax a byte payload is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredFormat {
    Json,
    Xml,
    Yaml,
}

// ── Input schema ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceInput {
    #[serde(default)]
    pub description: Vec<String>,
    pub options: InputOptions,
    #[serde(default)]
    pub sequence: Vec<InputEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputOptions {
    pub samplerate: u32,
    pub volume: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gainlevel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputEntry {
    /// Entry start time in milliseconds.
    pub time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    pub track: InputTrackSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputTrackSet {
    #[serde(default)]
    pub tones: Vec<InputTone>,
    #[serde(default)]
    pub noises: Vec<InputNoise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<InputBackground>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneMode {
    Binaural,
    Monaural,
    Isochronic,
    Pure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputTone {
    pub mode: ToneMode,
    pub carrier: f64,
    #[serde(default)]
    pub resonance: f64,
    /// Amplitude in percent (0–100).
    pub amplitude: f64,
    #[serde(default)]
    pub waveform: Waveform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputNoise {
    pub mode: NoiseKind,
    pub amplitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBackground {
    pub amplitude: f64,
    #[serde(default)]
    pub waveform: Waveform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<InputEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputEffect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spin: Option<InputSpin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse: Option<InputPulse>,
    /// Intensity in percent (0–100).
    pub intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpin {
    pub width: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputPulse {
    pub resonance: f64,
}

// ── Loader ──────────────────────────────────────────────────

fn semantic(msg: String) -> SynapseqError {
    ParseErrorKind::Semantic(msg).at(0, "").into()
}

fn structural(msg: String) -> SynapseqError {
    ParseErrorKind::Structural(msg).at(0, "").into()
}

/// Parse a structured sequence source in the given format.
pub fn parse_structured(source: &str, format: StructuredFormat) -> Result<Sequence, SynapseqError> {
    let input: SequenceInput = match format {
        StructuredFormat::Json => serde_json::from_str(source).map_err(|e| {
            SynapseqError::from(ParseErrorKind::Lexical(format!("error parsing JSON: {e}")).at(0, ""))
        })?,
        StructuredFormat::Xml => quick_xml::de::from_str(source).map_err(|e| {
            SynapseqError::from(ParseErrorKind::Lexical(format!("error parsing XML: {e}")).at(0, ""))
        })?,
        StructuredFormat::Yaml => serde_yaml::from_str(source).map_err(|e| {
            SynapseqError::from(ParseErrorKind::Lexical(format!("error parsing YAML: {e}")).at(0, ""))
        })?,
    };

    build_sequence(input)
}

/// Turn a deserialized [`SequenceInput`] into a compiled [`Sequence`],
/// running every entry through the same adjacency path as text input.
pub fn build_sequence(input: SequenceInput) -> Result<Sequence, SynapseqError> {
    if input.sequence.len() < 2 {
        return Err(structural(
            "not enough sequence data found in input file".to_string(),
        ));
    }

    let gain_level = match input.options.gainlevel.as_deref() {
        None => GainLevel::VeryHigh,
        Some(raw) => {
            let keyword = raw.trim().to_ascii_lowercase();
            GainLevel::from_keyword(&keyword)
                .ok_or_else(|| semantic(format!("invalid gain level: {raw}")))?
        }
    };

    let options = SequenceOptions {
        sample_rate: input.options.samplerate,
        volume: input.options.volume,
        background: input.options.background.clone(),
        gain_level,
    };
    options.validate().map_err(|e| e.at(0, ""))?;

    let mut periods: Vec<Period> = Vec::with_capacity(input.sequence.len());

    for (idx, entry) in input.sequence.iter().enumerate() {
        if idx == 0 && entry.time != 0 {
            return Err(structural(
                "first timeline must start at 0ms (00:00:00)".to_string(),
            ));
        }
        if idx >= 1 && entry.time <= input.sequence[idx - 1].time {
            return Err(structural(format!(
                "timeline {} time must be greater than previous timeline time",
                idx + 1
            )));
        }

        let mut elements = entry.track.tones.len() + entry.track.noises.len();
        if entry.track.background.is_some() {
            elements += 1;
        }
        if elements > NUM_CHANNELS {
            return Err(structural(format!(
                "too many elements defined (max {NUM_CHANNELS})"
            )));
        }

        let mut tracks = [Track::off(); NUM_CHANNELS];
        let mut slot = 0;

        for tone in &entry.track.tones {
            let kind = match tone.mode {
                ToneMode::Binaural => TrackKind::Binaural,
                ToneMode::Monaural => TrackKind::Monaural,
                ToneMode::Isochronic => TrackKind::Isochronic,
                ToneMode::Pure => TrackKind::Tone,
            };
            let track = Track {
                kind,
                carrier: tone.carrier,
                resonance: tone.resonance,
                amplitude: amplitude_from_percent(tone.amplitude),
                waveform: tone.waveform,
                effect: Effect::default(),
            };
            track.validate().map_err(|e| e.at(0, ""))?;
            tracks[slot] = track;
            slot += 1;
        }

        for noise in &entry.track.noises {
            let track = Track {
                kind: TrackKind::Noise(noise.mode),
                amplitude: amplitude_from_percent(noise.amplitude),
                ..Track::default()
            };
            track.validate().map_err(|e| e.at(0, ""))?;
            tracks[slot] = track;
            slot += 1;
        }

        match (&options.background, &entry.track.background) {
            (Some(_), None) => {
                return Err(structural(format!(
                    "background audio defined but no background settings found in timeline {}",
                    idx + 1
                )));
            }
            (None, Some(_)) => {
                return Err(structural(format!(
                    "background settings in timeline {} but no background audio file in options",
                    idx + 1
                )));
            }
            (Some(_), Some(background)) => {
                let mut effect = Effect::default();
                let mut carrier = 0.0;
                let mut resonance = 0.0;

                if let Some(input_effect) = &background.effect {
                    effect.intensity = intensity_from_percent(input_effect.intensity);
                    match (&input_effect.spin, &input_effect.pulse) {
                        (Some(spin), None) => {
                            effect.kind = EffectKind::Spin;
                            carrier = spin.width;
                            resonance = spin.rate;
                        }
                        (None, Some(pulse)) => {
                            effect.kind = EffectKind::Pulse;
                            resonance = pulse.resonance;
                        }
                        _ => {
                            return Err(semantic(
                                "invalid background effect type".to_string(),
                            ));
                        }
                    }
                }

                let track = Track {
                    kind: TrackKind::Background,
                    carrier,
                    resonance,
                    amplitude: amplitude_from_percent(background.amplitude),
                    waveform: background.waveform,
                    effect,
                };
                track.validate().map_err(|e| e.at(0, ""))?;
                tracks[slot] = track;
            }
            (None, None) => {}
        }

        let transition = entry.transition.unwrap_or_default();
        let mut period = Period::from_tracks(entry.time, tracks, transition);

        if let Some(last) = periods.last_mut() {
            adjust_periods(last, &mut period).map_err(|e| e.at(0, ""))?;
        }
        periods.push(period);
    }

    debug!(periods = periods.len(), "structured sequence compiled");

    Ok(Sequence {
        periods,
        options,
        comments: input.description,
        source: None,
    })
}
