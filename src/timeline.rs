//! Periods and the cross-period adjacency algorithm.
//!
//! A period is a time-stamped snapshot of all 16 channels. Appending a new
//! period to the chain runs [`adjust_periods`], which builds fades out of
//! `Silence`, rejects illegal direct transitions, and establishes the
//! invariant `last.end[ch] == next.start[ch]` that the renderer's
//! interpolation relies on.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseErrorKind;
use crate::preset::NUM_CHANNELS;
use crate::track::Track;

/// How channel parameters travel from a period's start values to its end
/// values. Shapes the interpolation progress inside the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    Steady,
    EaseIn,
    EaseOut,
    Smooth,
}

impl Default for Transition {
    fn default() -> Self {
        Transition::Steady
    }
}

impl Transition {
    pub fn from_keyword(tok: &str) -> Option<Transition> {
        match tok {
            "steady" => Some(Transition::Steady),
            "ease-in" => Some(Transition::EaseIn),
            "ease-out" => Some(Transition::EaseOut),
            "smooth" => Some(Transition::Smooth),
            _ => None,
        }
    }

    /// Shape a linear progress value (0..=1).
    pub fn shape(self, p: f64) -> f64 {
        match self {
            Transition::Steady => p,
            Transition::EaseIn => p * p,
            Transition::EaseOut => 1.0 - (1.0 - p) * (1.0 - p),
            Transition::Smooth => p * p * (3.0 - 2.0 * p),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Transition::Steady => "steady",
            Transition::EaseIn => "ease-in",
            Transition::EaseOut => "ease-out",
            Transition::Smooth => "smooth",
        };
        write!(f, "{name}")
    }
}

/// A time period with per-channel start and end track configurations.
/// `end` of period *i* equals `start` of period *i+1* once the chain has
/// been adjusted.
#[derive(Debug, Clone)]
pub struct Period {
    /// Start time in milliseconds. The period ends where its successor
    /// starts.
    pub time_ms: u64,
    pub start: [Track; NUM_CHANNELS],
    pub end: [Track; NUM_CHANNELS],
    pub transition: Transition,
}

impl Period {
    /// Build a period whose start and end both snapshot `tracks` (the end
    /// side is rewritten when the next period is appended).
    pub fn from_tracks(time_ms: u64, tracks: [Track; NUM_CHANNELS], transition: Transition) -> Period {
        Period {
            time_ms,
            start: tracks,
            end: tracks,
            transition,
        }
    }

    /// Format the start time as `HH:MM:SS`.
    pub fn time_string(&self) -> String {
        let hh = self.time_ms / 3_600_000;
        let mm = (self.time_ms % 3_600_000) / 60_000;
        let ss = (self.time_ms % 60_000) / 1000;
        format!("{hh:02}:{mm:02}:{ss:02}")
    }
}

/// Parse a `HH:MM:SS` timestamp into milliseconds. Each field must have
/// exactly two digits; hours are capped at 23.
pub fn parse_time(s: &str) -> Result<u64, ParseErrorKind> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 3 {
        return Err(ParseErrorKind::Lexical(format!(
            "invalid time format (must be HH:MM:SS): {s}"
        )));
    }
    for part in &parts {
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseErrorKind::Lexical(format!(
                "each time field must have 2 digits: {s}"
            )));
        }
    }

    let hh: u64 = parts[0].parse().unwrap_or(u64::MAX);
    let mm: u64 = parts[1].parse().unwrap_or(u64::MAX);
    let ss: u64 = parts[2].parse().unwrap_or(u64::MAX);
    if hh > 23 || mm > 59 || ss > 59 {
        return Err(ParseErrorKind::Semantic(format!("invalid time value: {s}")));
    }

    Ok((hh * 3600 + mm * 60 + ss) * 1000)
}

/// Resolve the boundary between two consecutive periods, channel by
/// channel:
///
/// 1. `Silence` at the end of `last` becomes a fade-in: the incoming
///    voice's timbre is copied backward with amplitude forced to 0.
/// 2. `Silence` at the start of `next` becomes a fade-out: the outgoing
///    voice's carrier/resonance/intensity are copied forward.
/// 3. Direct Off↔on transitions and direct type or waveform changes
///    between two live voices are hard errors.
/// 4. `last.end[ch]` is overwritten with `next.start[ch]`, chaining the
///    periods for interpolation.
pub fn adjust_periods(last: &mut Period, next: &mut Period) -> Result<(), ParseErrorKind> {
    for ch in 0..NUM_CHANNELS {
        let tr1 = last.end[ch];
        let tr2 = &mut next.start[ch];

        // Fade-in
        if last.start[ch].kind.is_silence() {
            let tr0 = &mut last.start[ch];
            tr0.kind = tr2.kind;
            tr0.carrier = tr2.carrier;
            tr0.resonance = tr2.resonance;
            tr0.amplitude = 0.0;
            tr0.effect.intensity = tr2.effect.intensity;
            tr0.effect.kind = tr2.effect.kind;
            tr0.waveform = tr2.waveform;
        }

        // Fade-out
        if tr2.kind.is_silence() {
            tr2.carrier = tr1.carrier;
            tr2.resonance = tr1.resonance;
            tr2.effect.intensity = tr1.effect.intensity;
        }

        // A channel may not go directly between off and a live voice.
        let off_to_on = tr1.kind.is_off() && tr2.kind.is_live();
        let on_to_off = tr1.kind.is_live() && tr2.kind.is_off();
        if off_to_on || on_to_off {
            return Err(ParseErrorKind::Adjacency(format!(
                "channel {} cannot be turned off or on directly, use silence instead: {} --> {}",
                ch + 1,
                tr1.kind,
                tr2.kind
            )));
        }

        // Nor change type or waveform directly between two live voices.
        if tr1.kind != tr2.kind && tr1.kind.is_live() && tr2.kind.is_live() {
            return Err(ParseErrorKind::Adjacency(format!(
                "channel {} cannot change track type directly, use silence instead: {} --> {}",
                ch + 1,
                tr1.kind,
                tr2.kind
            )));
        }
        if tr1.waveform != tr2.waveform && tr1.kind.is_live() && tr2.kind.is_live() {
            return Err(ParseErrorKind::Adjacency(format!(
                "channel {} cannot change waveform directly, use silence instead: {} --> {}",
                ch + 1,
                tr1.waveform,
                tr2.waveform
            )));
        }

        // Carry forward: the chain invariant used by interpolation.
        last.end[ch] = *tr2;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{amplitude_from_percent, NoiseKind, TrackKind, Waveform};

    fn tracks_with(ch: usize, tr: Track) -> [Track; NUM_CHANNELS] {
        let mut tracks = [Track::off(); NUM_CHANNELS];
        tracks[ch] = tr;
        tracks
    }

    fn all_silence() -> [Track; NUM_CHANNELS] {
        [Track::silence(); NUM_CHANNELS]
    }

    fn monaural(carrier: f64, resonance: f64, amp_percent: f64) -> Track {
        Track {
            kind: TrackKind::Monaural,
            carrier,
            resonance,
            amplitude: amplitude_from_percent(amp_percent),
            ..Track::default()
        }
    }

    #[test]
    fn parse_time_valid() {
        assert_eq!(parse_time("00:00:00").unwrap(), 0);
        assert_eq!(parse_time("00:01:00").unwrap(), 60_000);
        assert_eq!(parse_time("01:02:03").unwrap(), 3_723_000);
        assert_eq!(parse_time("23:59:59").unwrap(), 86_399_000);
    }

    #[test]
    fn parse_time_invalid() {
        assert!(parse_time("1:00:00").is_err());
        assert!(parse_time("00:00").is_err());
        assert!(parse_time("24:00:00").is_err());
        assert!(parse_time("00:60:00").is_err());
        assert!(parse_time("aa:00:00").is_err());
        assert!(parse_time("00:00:0x").is_err());
    }

    #[test]
    fn transition_keywords() {
        assert_eq!(Transition::from_keyword("steady"), Some(Transition::Steady));
        assert_eq!(Transition::from_keyword("ease-in"), Some(Transition::EaseIn));
        assert_eq!(Transition::from_keyword("ease-out"), Some(Transition::EaseOut));
        assert_eq!(Transition::from_keyword("smooth"), Some(Transition::Smooth));
        assert_eq!(Transition::from_keyword("linear"), None);
    }

    #[test]
    fn transition_shapes_hit_endpoints() {
        for t in [
            Transition::Steady,
            Transition::EaseIn,
            Transition::EaseOut,
            Transition::Smooth,
        ] {
            assert_eq!(t.shape(0.0), 0.0);
            assert_eq!(t.shape(1.0), 1.0);
        }
        assert!(Transition::EaseIn.shape(0.5) < 0.5);
        assert!(Transition::EaseOut.shape(0.5) > 0.5);
        assert_eq!(Transition::Smooth.shape(0.5), 0.5);
    }

    #[test]
    fn fade_in_copies_voice_with_zero_amplitude() {
        let mut last = Period::from_tracks(0, all_silence(), Transition::Steady);
        let mut next = Period::from_tracks(
            60_000,
            tracks_with(0, monaural(200.0, 6.0, 25.0)),
            Transition::Steady,
        );

        adjust_periods(&mut last, &mut next).unwrap();

        assert_eq!(last.start[0].kind, TrackKind::Monaural);
        assert_eq!(last.start[0].amplitude, 0.0);
        assert_eq!(last.start[0].carrier, 200.0);
        assert_eq!(last.start[0].resonance, 6.0);
        // Chain invariant after adjustment.
        assert_eq!(last.end[0], next.start[0]);
    }

    #[test]
    fn fade_out_copies_timbre_into_silence() {
        let voice = monaural(200.0, 6.0, 25.0);
        let mut last = Period::from_tracks(0, tracks_with(0, voice), Transition::Steady);
        let mut next = Period::from_tracks(60_000, all_silence(), Transition::Steady);

        adjust_periods(&mut last, &mut next).unwrap();

        assert_eq!(next.start[0].kind, TrackKind::Silence);
        assert_eq!(next.start[0].amplitude, 0.0);
        assert_eq!(next.start[0].carrier, 200.0);
        assert_eq!(next.start[0].resonance, 6.0);
    }

    #[test]
    fn direct_on_from_off_is_rejected() {
        let mut last = Period::from_tracks(0, [Track::off(); NUM_CHANNELS], Transition::Steady);
        let mut next = Period::from_tracks(
            60_000,
            tracks_with(3, Track {
                kind: TrackKind::Binaural,
                carrier: 100.0,
                resonance: 4.0,
                amplitude: amplitude_from_percent(10.0),
                ..Track::default()
            }),
            Transition::Steady,
        );

        let err = adjust_periods(&mut last, &mut next).unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("channel 4"), "should name the channel: {msg}");
    }

    #[test]
    fn direct_off_from_live_is_rejected() {
        let mut last = Period::from_tracks(
            0,
            tracks_with(0, monaural(200.0, 6.0, 25.0)),
            Transition::Steady,
        );
        let mut next = Period::from_tracks(60_000, [Track::off(); NUM_CHANNELS], Transition::Steady);
        assert!(adjust_periods(&mut last, &mut next).is_err());
    }

    #[test]
    fn direct_type_change_is_rejected() {
        let mut last = Period::from_tracks(
            0,
            tracks_with(0, monaural(200.0, 6.0, 25.0)),
            Transition::Steady,
        );
        let mut next = Period::from_tracks(
            60_000,
            tracks_with(0, Track {
                kind: TrackKind::Noise(NoiseKind::Pink),
                amplitude: amplitude_from_percent(25.0),
                ..Track::default()
            }),
            Transition::Steady,
        );
        let err = adjust_periods(&mut last, &mut next).unwrap_err();
        assert!(format!("{err}").contains("track type"));
    }

    #[test]
    fn direct_waveform_change_is_rejected() {
        let mut last = Period::from_tracks(
            0,
            tracks_with(0, monaural(200.0, 6.0, 25.0)),
            Transition::Steady,
        );
        let mut square = monaural(200.0, 6.0, 25.0);
        square.waveform = Waveform::Square;
        let mut next = Period::from_tracks(60_000, tracks_with(0, square), Transition::Steady);
        let err = adjust_periods(&mut last, &mut next).unwrap_err();
        assert!(format!("{err}").contains("waveform"));
    }

    #[test]
    fn same_voice_carries_forward() {
        let mut last = Period::from_tracks(
            0,
            tracks_with(0, monaural(200.0, 6.0, 25.0)),
            Transition::Steady,
        );
        let mut next = Period::from_tracks(
            60_000,
            tracks_with(0, monaural(250.0, 8.0, 50.0)),
            Transition::Steady,
        );
        adjust_periods(&mut last, &mut next).unwrap();
        assert_eq!(last.end[0].carrier, 250.0);
        assert_eq!(last.end[0].resonance, 8.0);
    }

    #[test]
    fn time_string_formats() {
        let p = Period::from_tracks(3_723_000, all_silence(), Transition::Steady);
        assert_eq!(p.time_string(), "01:02:03");
    }
}
