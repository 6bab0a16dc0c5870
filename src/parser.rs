//! Text sequence compiler: line classification and the stateful loader
//! that turns a `.spsq` text source into a [`Sequence`].
//!
//! Classification is positional/structural, not content-based, and is
//! checked in a fixed precedence order: comment, option, preset, track,
//! track override, timeline. Anything else is a syntax error.

use tracing::debug;

use crate::error::{ParseErrorKind, SynapseqError};
use crate::options::{GainLevel, SequenceOptions};
use crate::preset::{Preset, PresetBank, NUM_CHANNELS};
use crate::sequence::Sequence;
use crate::timeline::{adjust_periods, parse_time, Period, Transition};
use crate::token::LineCursor;
use crate::track::{
    amplitude_from_percent, intensity_from_percent, Effect, EffectKind, NoiseKind, Track,
    TrackKind, Waveform,
};

// ── Line classification ─────────────────────────────────────

/// True if the first token starts a comment (`#`).
pub fn has_comment(cur: &LineCursor) -> bool {
    cur.peek().is_some_and(|tok| tok.starts_with('#'))
}

/// True if the line is an option (`@name ...`).
pub fn has_option(line: &str) -> bool {
    line.starts_with('@')
}

/// True if the line is a preset definition: a letter at column 0.
pub fn has_preset(line: &str, cur: &LineCursor) -> bool {
    !line.starts_with(' ')
        && cur
            .peek()
            .is_some_and(|tok| tok.chars().next().is_some_and(|c| c.is_ascii_alphabetic()))
}

/// True if the line is a track definition: exactly two leading spaces and
/// a first token other than the `track` override keyword.
pub fn has_track(line: &str, cur: &LineCursor) -> bool {
    line.len() >= 3
        && line.starts_with("  ")
        && !line[2..].starts_with(' ')
        && cur.peek().is_some_and(|tok| tok != "track")
}

/// True if the line is a track override: two leading spaces then `track`.
pub fn has_track_override(line: &str, cur: &LineCursor) -> bool {
    line.len() >= 3
        && line.starts_with("  ")
        && !line[2..].starts_with(' ')
        && cur.peek() == Some("track")
}

/// True if the line is a timeline entry: column 0 non-space and a first
/// token that parses as `HH:MM:SS`.
pub fn has_timeline(line: &str, cur: &LineCursor) -> bool {
    !line.starts_with(' ')
        && cur.peek().is_some_and(|tok| parse_time(tok).is_ok())
}

// ── Per-line grammars ───────────────────────────────────────

/// Extract the exported text of a `##` comment; plain `#` comments yield
/// `None`.
fn parse_comment(cur: &mut LineCursor) -> Option<String> {
    let first = cur.next()?;
    if !first.starts_with("##") {
        return None;
    }
    // `##text` keeps the attached text, `## text` starts with the rest.
    let mut comment = first[2..].to_string();
    let rest = cur.rest();
    if !rest.is_empty() {
        if !comment.is_empty() {
            comment.push(' ');
        }
        comment.push_str(&rest);
    }
    let comment = comment.trim().to_string();
    (!comment.is_empty()).then_some(comment)
}

/// Apply an `@name value...` option line.
fn parse_option(cur: &mut LineCursor, options: &mut SequenceOptions) -> Result<(), ParseErrorKind> {
    let tok = cur
        .next()
        .ok_or_else(|| ParseErrorKind::Lexical("expected option".to_string()))?;
    let name = &tok[1..];
    if name.is_empty() {
        return Err(ParseErrorKind::Lexical("expected option name".to_string()));
    }

    match name {
        "samplerate" => {
            let rate = cur.next_int_strict()?;
            if rate <= 0 || rate > u32::MAX as i64 {
                return Err(ParseErrorKind::Semantic(format!(
                    "invalid sample rate: {rate}"
                )));
            }
            options.sample_rate = rate as u32;
            cur.expect_end()?;
        }
        "volume" => {
            let volume = cur.next_int_strict()?;
            if !(0..=100).contains(&volume) {
                return Err(ParseErrorKind::Semantic(format!("invalid volume: {volume}")));
            }
            options.volume = volume as u32;
            cur.expect_end()?;
        }
        "background" => {
            let path = cur.rest();
            if path.is_empty() {
                return Err(ParseErrorKind::Lexical("expected path".to_string()));
            }
            if path == "-" {
                return Err(ParseErrorKind::Semantic(
                    "stdin (-) is not supported for background audio".to_string(),
                ));
            }
            options.background = Some(path);
        }
        "gainlevel" => {
            let level = cur
                .next()
                .ok_or_else(|| ParseErrorKind::Lexical("expected gain level".to_string()))?;
            options.gain_level = GainLevel::from_keyword(level).ok_or_else(|| {
                ParseErrorKind::Semantic(format!("invalid gain level: {level:?}"))
            })?;
            cur.expect_end()?;
        }
        other => {
            return Err(ParseErrorKind::Lexical(format!("invalid option: {other:?}")));
        }
    }

    options.validate()
}

/// Parse a preset definition: `name`, `name as template`, or
/// `name from <template>`.
fn parse_preset(cur: &mut LineCursor, bank: &PresetBank) -> Result<Preset, ParseErrorKind> {
    let name = cur
        .next()
        .ok_or_else(|| ParseErrorKind::Lexical("expected preset name".to_string()))?;

    let mut is_template = false;
    let mut from = None;

    match cur.next() {
        Some("from") => {
            let parent = cur.next().ok_or_else(|| {
                ParseErrorKind::Lexical("expected preset name after 'from'".to_string())
            })?;
            let parent_preset = bank.find(parent).ok_or_else(|| {
                ParseErrorKind::Structural(format!("unknown preset to inherit from: {parent:?}"))
            })?;
            if !parent_preset.is_template() {
                return Err(ParseErrorKind::Structural(format!(
                    "can only inherit from a template preset, but {parent:?} is not a template"
                )));
            }
            from = Some(parent_preset);
        }
        Some("as") => {
            cur.expect_one_of(&["template"])?;
            is_template = true;
        }
        Some(_) => cur.rewind(1),
        None => {}
    }

    let preset = Preset::new(name, is_template, from)?;
    cur.expect_end()?;
    Ok(preset)
}

/// Parse a track definition line into a [`Track`].
fn parse_track(cur: &mut LineCursor) -> Result<Track, ParseErrorKind> {
    let mut waveform = Waveform::Sine;

    if cur.peek() == Some("waveform") {
        cur.next();
        let shape = cur.expect_one_of(&["sine", "square", "triangle", "sawtooth"])?;
        waveform = Waveform::from_keyword(shape).unwrap_or_default();
        // Only tone-like lines take a waveform prefix; probe and rewind so
        // the main grammar below re-reads the keyword.
        cur.expect_one_of(&["tone", "spin", "background"])?;
        cur.rewind(1);
    }

    let first = cur.next().ok_or_else(|| {
        ParseErrorKind::Lexical(
            "expected \"tone\", \"noise\", \"spin\" or \"background\"".to_string(),
        )
    })?;

    let mut carrier = 0.0;
    let mut resonance = 0.0;
    let amplitude;
    let kind;
    let mut effect = Effect::default();

    match first {
        "tone" => {
            carrier = cur.next_f64_strict()?;
            let mode = cur.expect_one_of(&["binaural", "monaural", "isochronic", "amplitude"])?;
            kind = match mode {
                "binaural" => TrackKind::Binaural,
                "monaural" => TrackKind::Monaural,
                "isochronic" => TrackKind::Isochronic,
                _ => TrackKind::Tone,
            };
            if kind != TrackKind::Tone {
                resonance = cur.next_f64_strict()?;
                cur.expect_one_of(&["amplitude"])?;
            }
            amplitude = cur.next_f64_strict()?;
        }
        "noise" => {
            let color = cur.expect_one_of(&["white", "pink", "brown"])?;
            kind = TrackKind::Noise(NoiseKind::from_keyword(color).unwrap_or(NoiseKind::White));
            cur.expect_one_of(&["amplitude"])?;
            amplitude = cur.next_f64_strict()?;
        }
        "spin" => {
            let color = cur.expect_one_of(&["white", "pink", "brown"])?;
            kind = TrackKind::Spin(NoiseKind::from_keyword(color).unwrap_or(NoiseKind::White));
            cur.expect_one_of(&["width"])?;
            carrier = cur.next_f64_strict()?;
            cur.expect_one_of(&["rate"])?;
            resonance = cur.next_f64_strict()?;
            cur.expect_one_of(&["amplitude"])?;
            amplitude = cur.next_f64_strict()?;
        }
        "background" => {
            kind = TrackKind::Background;
            let sub = cur.expect_one_of(&["amplitude", "spin", "pulse"])?;
            match sub {
                "spin" => {
                    effect.kind = EffectKind::Spin;
                    carrier = cur.next_f64_strict()?;
                    cur.expect_one_of(&["rate"])?;
                    resonance = cur.next_f64_strict()?;
                    cur.expect_one_of(&["intensity"])?;
                    effect.intensity = intensity_from_percent(cur.next_f64_strict()?);
                    cur.expect_one_of(&["amplitude"])?;
                    amplitude = cur.next_f64_strict()?;
                }
                "pulse" => {
                    effect.kind = EffectKind::Pulse;
                    resonance = cur.next_f64_strict()?;
                    cur.expect_one_of(&["intensity"])?;
                    effect.intensity = intensity_from_percent(cur.next_f64_strict()?);
                    cur.expect_one_of(&["amplitude"])?;
                    amplitude = cur.next_f64_strict()?;
                }
                _ => {
                    amplitude = cur.next_f64_strict()?;
                }
            }
        }
        other => {
            return Err(ParseErrorKind::Lexical(format!(
                "expected \"tone\", \"noise\", \"spin\" or \"background\", received {other:?}"
            )));
        }
    }

    cur.expect_end()?;

    let track = Track {
        kind,
        carrier,
        resonance,
        amplitude: amplitude_from_percent(amplitude),
        waveform,
        effect,
    };
    track.validate()?;
    Ok(track)
}

/// Parse a `track <N> <keyword> <value>` override line.
fn parse_track_override(cur: &mut LineCursor) -> Result<(usize, String, f64), ParseErrorKind> {
    cur.next(); // the `track` keyword, already matched by classification

    let slot = cur.next_int_strict()?;
    if slot <= 0 || slot >= NUM_CHANNELS as i64 {
        return Err(ParseErrorKind::Semantic(format!(
            "track index out of range (1-{}): {slot}",
            NUM_CHANNELS - 1
        )));
    }

    let keyword = cur.expect_one_of(&[
        "tone",
        "spin",
        "binaural",
        "monaural",
        "isochronic",
        "rate",
        "pulse",
        "amplitude",
        "intensity",
    ])?;
    let value = cur.next_f64_strict()?;
    cur.expect_end()?;

    Ok((slot as usize, keyword.to_string(), value))
}

/// Parse a timeline entry into an (unadjusted) [`Period`].
fn parse_timeline(cur: &mut LineCursor, bank: &PresetBank) -> Result<Period, ParseErrorKind> {
    let time_tok = cur
        .next()
        .ok_or_else(|| ParseErrorKind::Lexical("expected time".to_string()))?;
    let time_ms = parse_time(time_tok)?;

    let name = cur
        .next()
        .ok_or_else(|| ParseErrorKind::Lexical("expected preset name".to_string()))?;

    let transition = match cur.next() {
        None => Transition::Steady,
        Some(tok) => Transition::from_keyword(tok).ok_or_else(|| {
            ParseErrorKind::Lexical(format!("unknown transition mode {tok:?}"))
        })?,
    };
    cur.expect_end()?;

    let preset = bank
        .find(name)
        .ok_or_else(|| ParseErrorKind::Structural(format!("preset {name:?} not found")))?;
    if preset.is_template() {
        return Err(ParseErrorKind::Structural(format!(
            "preset {name:?} is a template and cannot be used in the timeline"
        )));
    }

    Ok(Period::from_tracks(time_ms, preset.tracks, transition))
}

// ── Text loader ─────────────────────────────────────────────

/// Compile a text sequence source into a [`Sequence`].
///
/// Section order is enforced: options, then presets (with their track and
/// override lines), then the timeline. The raw source bytes are retained
/// on the result for metadata embedding.
pub fn parse_text(source: &str) -> Result<Sequence, SynapseqError> {
    let mut bank = PresetBank::new();
    let mut options = SequenceOptions::default();
    let mut periods: Vec<Period> = Vec::new();
    let mut comments: Vec<String> = Vec::new();
    let mut line_count = 0;

    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        line_count = line_no;
        let mut cur = LineCursor::new(line);

        if cur.is_empty() {
            continue;
        }

        if has_comment(&cur) {
            if let Some(comment) = parse_comment(&mut cur) {
                comments.push(comment);
            }
            continue;
        }

        if has_option(line) {
            if bank.user_count() > 0 {
                return Err(ParseErrorKind::Structural(
                    "options must be defined before any preset".to_string(),
                )
                .at(line_no, line)
                .into());
            }
            parse_option(&mut cur, &mut options).map_err(|e| e.at(line_no, line))?;
            continue;
        }

        if has_preset(line, &cur) {
            if !periods.is_empty() {
                return Err(ParseErrorKind::Structural(
                    "preset definitions must be before any timeline definitions".to_string(),
                )
                .at(line_no, line)
                .into());
            }
            let preset = parse_preset(&mut cur, &bank).map_err(|e| e.at(line_no, line))?;
            debug!(name = preset.name(), template = preset.is_template(), "preset defined");
            bank.add(preset).map_err(|e| e.at(line_no, line))?;
            continue;
        }

        if has_track(line, &cur) {
            if !periods.is_empty() {
                return Err(ParseErrorKind::Structural(
                    "track definitions must be before any timeline definitions".to_string(),
                )
                .at(line_no, line)
                .into());
            }

            let track = parse_track(&mut cur).map_err(|e| e.at(line_no, line))?;
            if track.kind == TrackKind::Background && options.background.is_none() {
                return Err(ParseErrorKind::Structural(
                    "background track defined but no background audio file specified in options"
                        .to_string(),
                )
                .at(line_no, line)
                .into());
            }

            let Some(preset) = bank.last_user_mut() else {
                return Err(ParseErrorKind::Structural(
                    "track defined before any preset".to_string(),
                )
                .at(line_no, line)
                .into());
            };
            let slot = preset.allocate_track().map_err(|e| e.at(line_no, line))?;
            preset.tracks[slot] = track;
            continue;
        }

        if has_track_override(line, &cur) {
            if !periods.is_empty() {
                return Err(ParseErrorKind::Structural(
                    "track definitions must be before any timeline definitions".to_string(),
                )
                .at(line_no, line)
                .into());
            }

            let (slot, keyword, value) =
                parse_track_override(&mut cur).map_err(|e| e.at(line_no, line))?;
            let Some(preset) = bank.last_user_mut() else {
                return Err(ParseErrorKind::Structural(
                    "track override defined before any preset".to_string(),
                )
                .at(line_no, line)
                .into());
            };
            if preset.is_template() {
                return Err(ParseErrorKind::Structural(
                    "cannot override tracks on a template preset".to_string(),
                )
                .at(line_no, line)
                .into());
            }
            preset
                .apply_override(slot, &keyword, value)
                .map_err(|e| e.at(line_no, line))?;
            continue;
        }

        if has_timeline(line, &cur) {
            if bank.user_count() == 0 {
                return Err(ParseErrorKind::Structural(
                    "timeline defined before any preset".to_string(),
                )
                .at(line_no, line)
                .into());
            }

            let mut period = parse_timeline(&mut cur, &bank).map_err(|e| e.at(line_no, line))?;

            if periods.is_empty() && period.time_ms != 0 {
                return Err(ParseErrorKind::Structural(
                    "first timeline must start at 00:00:00".to_string(),
                )
                .at(line_no, line)
                .into());
            }
            if let Some(last) = periods.last_mut() {
                if last.time_ms >= period.time_ms {
                    return Err(ParseErrorKind::Structural(format!(
                        "timeline {} overlaps with previous timeline {}",
                        period.time_string(),
                        last.time_string()
                    ))
                    .at(line_no, line)
                    .into());
                }
                adjust_periods(last, &mut period).map_err(|e| e.at(line_no, line))?;
            }
            periods.push(period);
            continue;
        }

        return Err(ParseErrorKind::Lexical("invalid syntax".to_string())
            .at(line_no, line)
            .into());
    }

    // End-of-file validation.
    let eof = |kind: ParseErrorKind| SynapseqError::from(kind.at(line_count, ""));

    if bank.user_count() == 0 {
        return Err(eof(ParseErrorKind::Structural(
            "no presets defined".to_string(),
        )));
    }
    for preset in bank.user_presets() {
        if !preset.is_template() && preset.is_empty() {
            return Err(eof(ParseErrorKind::Structural(format!(
                "preset {:?} is empty",
                preset.name()
            ))));
        }
        let backgrounds = preset.background_tracks();
        if backgrounds > 1 {
            return Err(eof(ParseErrorKind::Structural(format!(
                "preset {:?} has {backgrounds} background tracks; only one background track is allowed per preset",
                preset.name()
            ))));
        }
    }
    if periods.len() < 2 {
        return Err(eof(ParseErrorKind::Structural(
            "at least two periods must be defined".to_string(),
        )));
    }

    debug!(
        periods = periods.len(),
        presets = bank.user_count(),
        "text sequence compiled"
    );

    Ok(Sequence {
        periods,
        options,
        comments,
        source: Some(source.as_bytes().to_vec()),
    })
}
