//! Core library for the SynapSeq brainwave entrainment sequencer.
//!
//! Compiles a sequence description — the text grammar or the structured
//! JSON/XML/YAML schema — into a chain of interpolated periods, and
//! renders it to 16-bit stereo PCM: binaural/monaural/isochronic tones,
//! colored noise, spin noise, and effect-modulated background audio.
//! Rendered WAV files can carry the original sequence text in a custom
//! RIFF `LIST/INFO/ICMT` chunk and recover it later.

pub mod dsp;
pub mod error;
pub mod metadata;
pub mod options;
pub mod parser;
pub mod preset;
pub mod sequence;
pub mod source;
pub mod structured;
pub mod timeline;
pub mod token;
pub mod track;
pub mod wav;

pub use dsp::renderer::{Renderer, RendererOptions};
pub use dsp::stream::RenderStream;
pub use error::SynapseqError;
pub use metadata::Metadata;
pub use sequence::{convert_to_text, Sequence};
pub use structured::StructuredFormat;

use source::PayloadKind;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Input formats a sequence can be loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFormat {
    Text,
    Json,
    Xml,
    Yaml,
}

/// Compile a text sequence source into a [`Sequence`].
pub fn parse_text(source: &str) -> Result<Sequence, SynapseqError> {
    parser::parse_text(source)
}

/// Compile a structured (JSON/XML/YAML) sequence source into a
/// [`Sequence`].
pub fn parse_structured(
    source: &str,
    format: StructuredFormat,
) -> Result<Sequence, SynapseqError> {
    structured::parse_structured(source, format)
}

/// Resolve a locator (`-` for stdin, else a local path) under the format's
/// size ceiling and compile it.
pub fn load_sequence(locator: &str, format: SequenceFormat) -> Result<Sequence, SynapseqError> {
    let kind = match format {
        SequenceFormat::Text => PayloadKind::Text,
        _ => PayloadKind::Structured,
    };
    let bytes = source::fetch(locator, kind)?;
    let text = String::from_utf8(bytes).map_err(|e| {
        SynapseqError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{locator}: not valid UTF-8: {e}"),
        ))
    })?;

    match format {
        SequenceFormat::Text => parse_text(&text),
        SequenceFormat::Json => parse_structured(&text, StructuredFormat::Json),
        SequenceFormat::Xml => parse_structured(&text, StructuredFormat::Xml),
        SequenceFormat::Yaml => parse_structured(&text, StructuredFormat::Yaml),
    }
}

/// Render a compiled sequence to a complete WAV byte buffer.
pub fn render_wav_bytes(sequence: &Sequence) -> Result<Vec<u8>, SynapseqError> {
    let mut renderer = Renderer::for_sequence(sequence)?;
    let mut out = Vec::new();
    renderer.render_wav_into(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const SOURCE: &str = "\
@samplerate 8000
## Morning focus
alpha
  tone 250 binaural 10 amplitude 20
00:00:00 alpha
00:00:02 alpha smooth
";

    #[test]
    fn end_to_end_text_to_wav() {
        let sequence = parse_text(SOURCE).unwrap();
        let wav = render_wav_bytes(&sequence).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44, "WAV should carry audio data");

        // Not all silence.
        let has_signal = wav[44..]
            .chunks_exact(2)
            .any(|b| i16::from_le_bytes([b[0], b[1]]) != 0);
        assert!(has_signal);
    }

    #[test]
    fn end_to_end_metadata_roundtrip() {
        let sequence = parse_text(SOURCE).unwrap();
        let wav = render_wav_bytes(&sequence).unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&wav).unwrap();
        file.flush().unwrap();

        let metadata = Metadata::from_source(sequence.source.as_deref().unwrap());
        wav::write_icmt_chunk(file.path(), &metadata).unwrap();

        let extracted = wav::extract_text_sequence(file.path()).unwrap();
        assert!(extracted.contains(SOURCE));

        // The recovered text is itself a valid sequence.
        let reparsed = parse_text(&extracted).unwrap();
        assert_eq!(reparsed.periods.len(), sequence.periods.len());
    }

    #[test]
    fn load_sequence_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SOURCE.as_bytes()).unwrap();
        file.flush().unwrap();

        let sequence =
            load_sequence(file.path().to_str().unwrap(), SequenceFormat::Text).unwrap();
        assert_eq!(sequence.periods.len(), 2);
        assert_eq!(sequence.comments, vec!["Morning focus"]);
    }

    #[test]
    fn structured_and_text_render_identically() {
        let json = r#"{
            "options": { "samplerate": 8000, "volume": 100 },
            "sequence": [
                { "time": 0, "track": { "tones": [
                    { "mode": "binaural", "carrier": 250, "resonance": 10, "amplitude": 20 }
                ] } },
                { "time": 2000, "transition": "smooth", "track": { "tones": [
                    { "mode": "binaural", "carrier": 250, "resonance": 10, "amplitude": 20 }
                ] } }
            ]
        }"#;
        let text = "\
@samplerate 8000
alpha
  tone 250 binaural 10 amplitude 20
00:00:00 alpha
00:00:02 alpha smooth
";
        let from_json = render_wav_bytes(&parse_structured(json, StructuredFormat::Json).unwrap());
        let from_text = render_wav_bytes(&parse_text(text).unwrap());
        assert_eq!(from_json.unwrap(), from_text.unwrap());
    }

    #[test]
    fn convert_to_text_reparses() {
        let sequence = parse_text(SOURCE).unwrap();
        let text = convert_to_text(&sequence);
        let reparsed = parse_text(&text).unwrap();
        assert_eq!(reparsed.periods.len(), 2);
        assert_eq!(reparsed.periods[1].time_ms, 2000);
        assert_eq!(
            reparsed.periods[0].start[0].carrier,
            sequence.periods[0].start[0].carrier
        );
    }
}
