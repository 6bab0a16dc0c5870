//! The compiled sequence and its text rendering.

use std::fmt::Write as _;

use crate::options::SequenceOptions;
use crate::timeline::Period;

/// A fully compiled sequence: the adjusted period chain, resolved options,
/// exported comments, and (for text input) the original raw bytes needed
/// for metadata embedding.
#[derive(Debug)]
pub struct Sequence {
    pub periods: Vec<Period>,
    pub options: SequenceOptions,
    /// `##` exported comment lines, in source order.
    pub comments: Vec<String>,
    /// Raw source bytes of the original text sequence. `None` for
    /// structured input, which is never embedded as-is.
    pub source: Option<Vec<u8>>,
}

/// Render a sequence as a text sequence file. Each period becomes a
/// synthetic preset `tone-set-NNN`; the emitted lines re-parse under the
/// text grammar.
pub fn convert_to_text(sequence: &Sequence) -> String {
    let mut out = String::new();
    out.push_str("# GENERATED FROM SYNAPSEQ STRUCTURED SEQUENCE FILE\n\n");

    for comment in &sequence.comments {
        let _ = writeln!(out, "## {comment}");
    }

    let options = &sequence.options;
    out.push_str("\n# Options\n");
    let _ = write!(out, "@samplerate {}", options.sample_rate);
    let _ = write!(out, "\n@volume {}", options.volume);
    if let Some(background) = &options.background {
        let _ = write!(out, "\n@background {background}");
        let _ = write!(out, "\n@gainlevel {}", options.gain_level);
    }
    out.push('\n');

    out.push_str("\n# Presets");

    let mut timeline = Vec::with_capacity(sequence.periods.len());
    for (i, period) in sequence.periods.iter().enumerate() {
        let preset_id = format!("tone-set-{:03}", i + 1);
        let _ = write!(out, "\n{preset_id}");

        for track in &period.start {
            if track.kind.is_live() {
                let _ = write!(out, "\n  {track}");
            }
        }

        timeline.push(format!(
            "{} {} {}",
            period.time_string(),
            preset_id,
            period.transition
        ));
    }

    out.push_str("\n\n# Timeline");
    for line in &timeline {
        let _ = write!(out, "\n{line}");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::NUM_CHANNELS;
    use crate::timeline::Transition;
    use crate::track::{amplitude_from_percent, Track, TrackKind};

    fn two_period_sequence(comments: Vec<String>) -> Sequence {
        let voice = Track {
            kind: TrackKind::Binaural,
            carrier: 300.0,
            resonance: 10.0,
            amplitude: amplitude_from_percent(20.0),
            ..Track::default()
        };
        let mut tracks = [Track::off(); NUM_CHANNELS];
        tracks[0] = voice;

        Sequence {
            periods: vec![
                Period::from_tracks(0, tracks, Transition::Steady),
                Period::from_tracks(300_000, tracks, Transition::Smooth),
            ],
            options: SequenceOptions::default(),
            comments,
            source: None,
        }
    }

    #[test]
    fn sections_and_synthetic_presets() {
        let text = convert_to_text(&two_period_sequence(Vec::new()));

        assert!(text.contains("# Options"));
        assert!(text.contains("@samplerate 44100"));
        assert!(text.contains("@volume 100"));
        assert!(text.contains("# Presets"));
        assert!(text.contains("tone-set-001"));
        assert!(text.contains("tone-set-002"));
        assert!(text.contains("# Timeline"));
        assert!(text.contains("00:00:00 tone-set-001 steady"));
        assert!(text.contains("00:05:00 tone-set-002 smooth"));
        assert!(text.contains("waveform sine tone 300.00 binaural 10.00 amplitude 20.00"));
    }

    #[test]
    fn no_exported_markers_without_comments() {
        let text = convert_to_text(&two_period_sequence(Vec::new()));
        assert!(!text.contains("##"), "unexpected ## marker:\n{text}");
    }

    #[test]
    fn comments_are_exported() {
        let text = convert_to_text(&two_period_sequence(vec!["Session A".to_string()]));
        assert!(text.contains("## Session A"));
    }

    #[test]
    fn background_options_are_emitted_together() {
        let mut seq = two_period_sequence(Vec::new());
        seq.options.background = Some("amb.wav".to_string());
        let text = convert_to_text(&seq);
        assert!(text.contains("@background amb.wav"));
        assert!(text.contains("@gainlevel medium"));
    }
}
