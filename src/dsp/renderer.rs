//! The audio renderer: owns all channel state, walks the period chain,
//! and mixes 16 channels into interleaved 16-bit stereo PCM.
//!
//! Rendering is single-threaded and pull-based: [`Renderer::render`]
//! produces fixed-size buffers synchronously and hands each to the
//! consumer callback; a consumer error unwinds the loop. Given identical
//! input and sample rate the output is byte-for-byte reproducible.

use std::io::Write;

use tracing::debug;

use crate::dsp::background::BackgroundAudio;
use crate::dsp::channel::Channel;
use crate::dsp::noise::{spin_place, NoiseGenerator};
use crate::dsp::wavetable::{init_wave_tables, BUFFER_SIZE, PHASE_MASK, WAVE_TABLE_AMPLITUDE};
use crate::error::{RenderError, SynapseqError};
use crate::options::{GainLevel, SequenceOptions};
use crate::preset::NUM_CHANNELS;
use crate::sequence::Sequence;
use crate::timeline::Period;
use crate::track::{EffectKind, TrackKind};
use crate::wav::wav_header;

const MIX_SHIFT: u32 = 16;
const SAMPLE_MAX: i64 = 32_767;
const SAMPLE_MIN: i64 = -32_768;

/// Options a renderer is constructed with.
#[derive(Debug, Clone)]
pub struct RendererOptions {
    pub sample_rate: u32,
    /// Global volume, 0–100.
    pub volume: u32,
    pub gain_level: GainLevel,
    /// Locator of the background audio, resolved at construction.
    pub background: Option<String>,
}

impl From<&SequenceOptions> for RendererOptions {
    fn from(opts: &SequenceOptions) -> RendererOptions {
        RendererOptions {
            sample_rate: opts.sample_rate,
            volume: opts.volume,
            gain_level: opts.gain_level,
            background: opts.background.clone(),
        }
    }
}

/// Explicitly owned renderer state; nothing here is shared or global.
#[derive(Debug)]
pub struct Renderer {
    channels: [Channel; NUM_CHANNELS],
    periods: Vec<Period>,
    wave_tables: [Vec<i32>; 4],
    noise: NoiseGenerator,
    background: BackgroundAudio,
    options: RendererOptions,
}

impl Renderer {
    /// Validate options, load background audio, and build a renderer.
    pub fn new(periods: Vec<Period>, options: RendererOptions) -> Result<Renderer, RenderError> {
        if options.sample_rate == 0 {
            return Err(RenderError::InvalidOptions(format!(
                "invalid sample rate: {}",
                options.sample_rate
            )));
        }
        if options.volume > 100 {
            return Err(RenderError::InvalidOptions(format!(
                "volume must be between 0 and 100, got {}",
                options.volume
            )));
        }
        if periods.is_empty() {
            return Err(RenderError::InvalidOptions(
                "no periods defined in the sequence".to_string(),
            ));
        }

        let background = match &options.background {
            Some(locator) => {
                let bg = BackgroundAudio::open(locator)?;
                if bg.sample_rate() != options.sample_rate {
                    return Err(RenderError::Background(format!(
                        "sample rate ({} Hz) does not match output sample rate ({} Hz)",
                        bg.sample_rate(),
                        options.sample_rate
                    )));
                }
                bg
            }
            None => BackgroundAudio::disabled(),
        };

        Ok(Renderer {
            channels: [Channel::default(); NUM_CHANNELS],
            periods,
            wave_tables: init_wave_tables(),
            noise: NoiseGenerator::new(),
            background,
            options,
        })
    }

    /// Build a renderer straight from a compiled sequence.
    pub fn for_sequence(sequence: &Sequence) -> Result<Renderer, RenderError> {
        Renderer::new(sequence.periods.clone(), (&sequence.options).into())
    }

    pub fn sample_rate(&self) -> u32 {
        self.options.sample_rate
    }

    /// Total output length in frames: the last period's timestamp ends the
    /// sequence.
    pub fn total_frames(&self) -> u64 {
        let end_ms = self.periods.last().map(|p| p.time_ms).unwrap_or(0);
        (end_ms as f64 * self.options.sample_rate as f64 / 1000.0).round() as u64
    }

    /// Produce the whole sequence, passing each interleaved stereo buffer
    /// to `consume`. A consumer error stops generation and is returned.
    pub fn render<F>(&mut self, mut consume: F) -> Result<(), RenderError>
    where
        F: FnMut(&[i16]) -> Result<(), RenderError>,
    {
        let total_frames = self.total_frames();
        let sample_rate = self.options.sample_rate;
        let mut frames_written: u64 = 0;
        let mut period_idx = 0usize;

        let mut out = vec![0i16; BUFFER_SIZE * 2];
        let mut bg = vec![0i32; BUFFER_SIZE * 2];

        while frames_written < total_frames {
            let time_ms = (frames_written as f64 * 1000.0 / sample_rate as f64) as u64;

            while period_idx + 1 < self.periods.len()
                && time_ms >= self.periods[period_idx + 1].time_ms
            {
                period_idx += 1;
                debug!(
                    period = period_idx,
                    start = %self.periods[period_idx].time_string(),
                    transition = %self.periods[period_idx].transition,
                    "period change"
                );
            }

            self.sync(time_ms, period_idx);

            if self.background.is_enabled() {
                self.background.read_samples(&mut bg);
            }
            self.mix_buffer(&bg, &mut out);

            let frames = (BUFFER_SIZE as u64).min(total_frames - frames_written) as usize;
            consume(&out[..frames * 2])?;
            frames_written += frames as u64;
        }

        Ok(())
    }

    /// Render as a complete WAV stream (header plus PCM data).
    pub fn render_wav_into<W: Write>(&mut self, w: &mut W) -> Result<(), SynapseqError> {
        w.write_all(&wav_header(self.options.sample_rate, self.total_frames()))?;
        self.render_raw_into(w)
    }

    /// Render as headerless interleaved 16-bit LE PCM.
    pub fn render_raw_into<W: Write>(&mut self, w: &mut W) -> Result<(), SynapseqError> {
        let mut bytes = Vec::with_capacity(BUFFER_SIZE * 4);
        self.render(|samples| {
            bytes.clear();
            for &sample in samples {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
            w.write_all(&bytes)
                .map_err(|e| RenderError::Consumer(format!("{e}")))
        })?;
        Ok(())
    }

    /// Update all channel state for the buffer starting at `time_ms`.
    fn sync(&mut self, time_ms: u64, period_idx: usize) {
        let (start, end, transition, period_time, next_time) = {
            let period = &self.periods[period_idx];
            let next_time = self
                .periods
                .get(period_idx + 1)
                .map(|p| p.time_ms)
                .unwrap_or(time_ms + 1000);
            (
                period.start,
                period.end,
                period.transition,
                period.time_ms,
                next_time,
            )
        };

        let span = (next_time - period_time).max(1) as f64;
        let progress = ((time_ms - period_time) as f64 / span).clamp(0.0, 1.0);
        let shaped = transition.shape(progress);

        let sample_rate = self.options.sample_rate;
        for (ch, channel) in self.channels.iter_mut().enumerate() {
            channel.sync(&start[ch], &end[ch], shaped, sample_rate);
        }
    }

    /// Mix one buffer of all 16 channels into interleaved stereo output.
    /// This is the single sample-generation dispatch site.
    fn mix_buffer(&mut self, bg: &[i32], out: &mut [i16]) {
        let Renderer {
            channels,
            wave_tables,
            noise,
            background: _,
            options,
            ..
        } = self;

        let volume = options.volume as i64;
        let bg_gain = 10f64.powf(-options.gain_level.attenuation_db() / 20.0);

        for i in 0..BUFFER_SIZE {
            let mut left: i64 = 0;
            let mut right: i64 = 0;

            for channel in channels.iter_mut() {
                let table = &wave_tables[channel.track.waveform.table_index()];

                match channel.track.kind {
                    TrackKind::Off | TrackKind::Silence => {}
                    TrackKind::Tone => {
                        channel.off[0] = (channel.off[0] + channel.inc[0]) & PHASE_MASK;
                        let sample = channel.amp[0] as i64
                            * table[(channel.off[0] >> 16) as usize] as i64;
                        left += sample;
                        right += sample;
                    }
                    TrackKind::Binaural => {
                        channel.off[0] = (channel.off[0] + channel.inc[0]) & PHASE_MASK;
                        channel.off[1] = (channel.off[1] + channel.inc[1]) & PHASE_MASK;
                        left += channel.amp[0] as i64
                            * table[(channel.off[0] >> 16) as usize] as i64;
                        right += channel.amp[1] as i64
                            * table[(channel.off[1] >> 16) as usize] as i64;
                    }
                    TrackKind::Monaural => {
                        channel.off[0] = (channel.off[0] + channel.inc[0]) & PHASE_MASK;
                        channel.off[1] = (channel.off[1] + channel.inc[1]) & PHASE_MASK;
                        let high = table[(channel.off[0] >> 16) as usize] as i64;
                        let low = table[(channel.off[1] >> 16) as usize] as i64;
                        let half_amp = channel.amp[0] as i64 / 2;
                        let mixed = half_amp * (high + low);
                        left += mixed;
                        right += mixed;
                    }
                    TrackKind::Isochronic => {
                        channel.off[0] = (channel.off[0] + channel.inc[0]) & PHASE_MASK;
                        channel.off[1] = (channel.off[1] + channel.inc[1]) & PHASE_MASK;
                        let gate = pulse_gate(table[(channel.off[1] >> 16) as usize] as f64);
                        let carrier = table[(channel.off[0] >> 16) as usize] as f64;
                        let sample = (channel.amp[0] as f64 * carrier * gate) as i64;
                        left += sample;
                        right += sample;
                    }
                    TrackKind::Noise(kind) => {
                        let value = noise.generate(kind) as i64;
                        let sample = channel.amp[0] as i64 * value;
                        left += sample;
                        right += sample;
                    }
                    TrackKind::Spin(kind) => {
                        channel.off[0] = (channel.off[0] + channel.inc[0]) & PHASE_MASK;
                        let spin_pos = (channel.inc[1] as i64
                            * table[(channel.off[0] >> 16) as usize] as i64)
                            >> 24;
                        let rotation = ((spin_pos as f64 * 1.5) as i64).clamp(-128, 127);

                        let base = noise.generate(kind) as i64;
                        let (l, r) = spin_place(base, base, rotation);
                        left += channel.amp[0] as i64 * l;
                        right += channel.amp[0] as i64 * r;
                    }
                    TrackKind::Background => {
                        let bg_amp = channel.amp[0] as f64 / 16.0;
                        let bg_left = (bg[i * 2] as f64 * bg_gain * bg_amp) as i64;
                        let bg_right = (bg[i * 2 + 1] as f64 * bg_gain * bg_amp) as i64;

                        match channel.track.effect.kind {
                            EffectKind::Spin => {
                                channel.off[0] =
                                    (channel.off[0] + channel.inc[0]) & PHASE_MASK;
                                let spin_pos = (channel.inc[1] as i64
                                    * table[(channel.off[0] >> 16) as usize] as i64)
                                    >> 24;
                                let spin_gain =
                                    0.5 + channel.track.effect.intensity * 0.7 * 3.5;
                                let rotation =
                                    ((spin_pos as f64 * spin_gain) as i64).clamp(-128, 127);

                                let (l, r) = spin_place(bg_left, bg_right, rotation);
                                left += l;
                                right += r;
                            }
                            EffectKind::Pulse => {
                                channel.off[1] =
                                    (channel.off[1] + channel.inc[1]) & PHASE_MASK;
                                let gate =
                                    pulse_gate(table[(channel.off[1] >> 16) as usize] as f64);
                                let effect_intensity = channel.track.effect.intensity * 0.7;
                                let gain =
                                    (1.0 - effect_intensity) + effect_intensity * gate;
                                left += (bg_left as f64 * gain) as i64;
                                right += (bg_right as f64 * gain) as i64;
                            }
                            EffectKind::Off => {
                                left += bg_left;
                                right += bg_right;
                            }
                        }
                    }
                }
            }

            if volume != 100 {
                left = left * volume / 100;
                right = right * volume / 100;
            }

            left >>= MIX_SHIFT;
            right >>= MIX_SHIFT;

            out[i * 2] = left.clamp(SAMPLE_MIN, SAMPLE_MAX) as i16;
            out[i * 2 + 1] = right.clamp(SAMPLE_MIN, SAMPLE_MAX) as i16;
        }
    }
}

/// Smoothstep gate used by isochronic tones and the pulse effect: zero
/// below 0.3 of the modulator's amplitude, then `3x² - 2x³` up to 1.
fn pulse_gate(mod_value: f64) -> f64 {
    let threshold = 0.3 * WAVE_TABLE_AMPLITUDE as f64;
    let denominator = 0.7 * WAVE_TABLE_AMPLITUDE as f64;

    if mod_value > threshold {
        let x = (mod_value - threshold) / denominator;
        x * x * (3.0 - 2.0 * x)
    } else {
        0.0
    }
}
