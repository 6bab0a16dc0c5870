//! Presets: named track-sets, template inheritance, and track overrides.

use crate::error::ParseErrorKind;
use crate::track::{
    amplitude_from_percent, intensity_from_percent, EffectKind, Track, TrackKind,
};

/// Fixed number of track slots per preset (and channels in the renderer).
pub const NUM_CHANNELS: usize = 16;

/// Maximum number of presets in a sequence, builtin `silence` included.
pub const MAX_PRESETS: usize = 32;

/// Name of the builtin always-present preset at bank index 0.
pub const SILENCE_PRESET: &str = "silence";

/// Where an inherited preset came from. Holds the template's identity and a
/// frozen copy of its tracks; override legality is checked against this
/// original, not against the (possibly already overridden) working copy.
#[derive(Debug, Clone)]
struct TemplateOrigin {
    name: String,
    original: [Track; NUM_CHANNELS],
}

/// A named, reusable set of up to 16 simultaneous tracks.
#[derive(Debug, Clone)]
pub struct Preset {
    name: String,
    is_template: bool,
    from: Option<Box<TemplateOrigin>>,
    pub tracks: [Track; NUM_CHANNELS],
}

impl Preset {
    /// Create a preset with a validated name. Names are case-insensitive
    /// identifiers (`[A-Za-z][A-Za-z0-9_-]*`) and stored lowercased; the
    /// reserved word `silence` is rejected.
    ///
    /// When `from` is given, the template's 16 tracks are copied by value:
    /// the new preset owns an independent copy, not a live reference.
    pub fn new(name: &str, is_template: bool, from: Option<&Preset>) -> Result<Preset, ParseErrorKind> {
        let mut chars = name.chars();
        match chars.next() {
            None => {
                return Err(ParseErrorKind::Semantic(
                    "preset name cannot be empty".to_string(),
                ));
            }
            Some(first) if !first.is_ascii_alphabetic() => {
                return Err(ParseErrorKind::Semantic(format!(
                    "preset name must start with a letter: {name:?}"
                )));
            }
            Some(_) => {}
        }
        for ch in chars {
            if !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '-') {
                return Err(ParseErrorKind::Semantic(format!(
                    "invalid character in preset name {name:?}: {ch:?}"
                )));
            }
        }

        let lowered = name.to_ascii_lowercase();
        if lowered == SILENCE_PRESET {
            return Err(ParseErrorKind::Semantic(format!(
                "preset name {SILENCE_PRESET:?} is reserved"
            )));
        }

        let (tracks, origin) = match from {
            Some(template) => (
                template.tracks,
                Some(Box::new(TemplateOrigin {
                    name: template.name.clone(),
                    original: template.tracks,
                })),
            ),
            None => ([Track::off(); NUM_CHANNELS], None),
        };

        Ok(Preset {
            name: lowered,
            is_template,
            from: origin,
            tracks,
        })
    }

    /// The builtin `silence` preset: a real, valid preset whose 16 tracks
    /// are all `Silence` (distinct from `Off`).
    pub fn builtin_silence() -> Preset {
        Preset {
            name: SILENCE_PRESET.to_string(),
            is_template: false,
            from: None,
            tracks: [Track::silence(); NUM_CHANNELS],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_template(&self) -> bool {
        self.is_template
    }

    pub fn has_template_source(&self) -> bool {
        self.from.is_some()
    }

    /// First free (Off) slot, or an error when all 16 are used.
    pub fn allocate_track(&self) -> Result<usize, ParseErrorKind> {
        self.tracks
            .iter()
            .position(|tr| tr.kind == TrackKind::Off)
            .ok_or_else(|| {
                ParseErrorKind::Structural(format!(
                    "no available tracks for preset {:?}",
                    self.name
                ))
            })
    }

    /// True iff every slot is `Off`.
    pub fn is_empty(&self) -> bool {
        self.tracks.iter().all(|tr| tr.kind == TrackKind::Off)
    }

    /// Number of background tracks (at most one is legal).
    pub fn background_tracks(&self) -> usize {
        self.tracks
            .iter()
            .filter(|tr| tr.kind == TrackKind::Background)
            .count()
    }

    /// Apply a `track <slot> <keyword> <value>` override.
    ///
    /// Requires a template source; the caller has already rejected
    /// overrides on templates themselves. `slot` addresses the track array
    /// directly and must be in [1,16) — slot 0 is reserved and never
    /// overridable. The keyword may tune a parameter of the existing track
    /// but never retype it: each keyword is only legal against a matching
    /// track kind (and, for `rate`/`pulse`, a matching effect kind).
    /// Values arrive on the user percentage scale where applicable.
    pub fn apply_override(
        &mut self,
        slot: usize,
        keyword: &str,
        value: f64,
    ) -> Result<(), ParseErrorKind> {
        let origin = self.from.as_ref().ok_or_else(|| {
            ParseErrorKind::Structural(
                "cannot override tracks on a preset without a 'from' source".to_string(),
            )
        })?;

        if slot == 0 || slot >= NUM_CHANNELS {
            return Err(ParseErrorKind::Semantic(format!(
                "track index out of range (1-{}): {slot}",
                NUM_CHANNELS - 1
            )));
        }
        if origin.original[slot].kind == TrackKind::Off {
            return Err(ParseErrorKind::Semantic(format!(
                "cannot override track {slot} which is off in the template preset {:?}",
                origin.name
            )));
        }

        let track = &mut self.tracks[slot];
        let mismatch = |keyword: &str, kind: TrackKind| {
            ParseErrorKind::Semantic(format!(
                "override keyword {keyword:?} does not match track {slot} ({kind})"
            ))
        };

        match keyword {
            "tone" => match track.kind {
                TrackKind::Tone
                | TrackKind::Binaural
                | TrackKind::Monaural
                | TrackKind::Isochronic => track.carrier = value,
                kind => return Err(mismatch("tone", kind)),
            },
            "spin" => match track.kind {
                TrackKind::Spin(_) => track.carrier = value,
                TrackKind::Background if track.effect.kind == EffectKind::Spin => {
                    track.carrier = value
                }
                kind => return Err(mismatch("spin", kind)),
            },
            "binaural" if track.kind == TrackKind::Binaural => track.resonance = value,
            "monaural" if track.kind == TrackKind::Monaural => track.resonance = value,
            "isochronic" if track.kind == TrackKind::Isochronic => track.resonance = value,
            "binaural" | "monaural" | "isochronic" => {
                return Err(mismatch(keyword, track.kind));
            }
            "rate" => match track.kind {
                TrackKind::Spin(_) => track.resonance = value,
                TrackKind::Background if track.effect.kind == EffectKind::Spin => {
                    track.resonance = value
                }
                kind => return Err(mismatch("rate", kind)),
            },
            "pulse" => match track.kind {
                TrackKind::Background if track.effect.kind == EffectKind::Pulse => {
                    track.resonance = value
                }
                kind => return Err(mismatch("pulse", kind)),
            },
            "amplitude" => track.amplitude = amplitude_from_percent(value),
            "intensity" => {
                if track.effect.kind == EffectKind::Off {
                    return Err(mismatch("intensity", track.kind));
                }
                track.effect.intensity = intensity_from_percent(value);
            }
            other => {
                return Err(ParseErrorKind::Lexical(format!(
                    "unknown override keyword: {other:?}"
                )));
            }
        }

        track.validate()
    }
}

// ── Preset bank ─────────────────────────────────────────────

/// All presets of a sequence. The builtin `silence` preset always occupies
/// index 0; user presets follow in definition order.
#[derive(Debug)]
pub struct PresetBank {
    presets: Vec<Preset>,
}

impl PresetBank {
    pub fn new() -> PresetBank {
        let mut presets = Vec::with_capacity(MAX_PRESETS);
        presets.push(Preset::builtin_silence());
        PresetBank { presets }
    }

    /// Total number of presets, silence included.
    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    /// Look a preset up by (case-insensitive) name.
    pub fn find(&self, name: &str) -> Option<&Preset> {
        let lowered = name.to_ascii_lowercase();
        self.presets.iter().find(|p| p.name() == lowered)
    }

    /// Append a preset, rejecting duplicates and bank overflow.
    pub fn add(&mut self, preset: Preset) -> Result<(), ParseErrorKind> {
        if self.presets.len() >= MAX_PRESETS {
            return Err(ParseErrorKind::Structural(
                "maximum number of presets reached".to_string(),
            ));
        }
        if self.find(preset.name()).is_some() {
            return Err(ParseErrorKind::Structural(format!(
                "duplicate preset definition: {}",
                preset.name()
            )));
        }
        self.presets.push(preset);
        Ok(())
    }

    /// The most recently defined user preset, if any.
    pub fn last_user_mut(&mut self) -> Option<&mut Preset> {
        if self.presets.len() > 1 {
            self.presets.last_mut()
        } else {
            None
        }
    }

    /// Number of user presets (excludes builtin silence).
    pub fn user_count(&self) -> usize {
        self.presets.len() - 1
    }

    /// Iterate user presets (excludes builtin silence).
    pub fn user_presets(&self) -> impl Iterator<Item = &Preset> {
        self.presets.iter().skip(1)
    }
}

impl Default for PresetBank {
    fn default() -> Self {
        PresetBank::new()
    }
}
