//! Looped background audio playback.
//!
//! The source WAV is resolved through the size-capped byte source, decoded
//! once, and cached in memory at 24-bit scale for the renderer's lifetime;
//! chunk reads wrap around seamlessly at the end of the material.

use std::io::Cursor;

use tracing::debug;

use crate::error::RenderError;
use crate::source::{self, PayloadKind};

/// Cached, loopable background audio.
#[derive(Debug)]
pub struct BackgroundAudio {
    /// Interleaved stereo samples at 24-bit scale.
    samples: Vec<i32>,
    position: usize,
    sample_rate: u32,
    enabled: bool,
}

impl BackgroundAudio {
    /// A background that produces silence (no `@background` option).
    pub fn disabled() -> BackgroundAudio {
        BackgroundAudio {
            samples: Vec::new(),
            position: 0,
            sample_rate: 0,
            enabled: false,
        }
    }

    /// Resolve and decode a background WAV from a locator.
    pub fn open(locator: &str) -> Result<BackgroundAudio, RenderError> {
        let bytes = source::fetch(locator, PayloadKind::BackgroundAudio)
            .map_err(|e| RenderError::Background(format!("{locator}: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Decode background audio from raw WAV bytes. The material must be
    /// stereo 16- or 24-bit integer PCM.
    pub fn from_bytes(bytes: &[u8]) -> Result<BackgroundAudio, RenderError> {
        let mut reader = hound::WavReader::new(Cursor::new(bytes))
            .map_err(|e| RenderError::Background(format!("invalid WAV file: {e}")))?;
        let spec = reader.spec();

        if spec.channels != 2 {
            return Err(RenderError::Background(format!(
                "must be stereo ({} channels detected)",
                spec.channels
            )));
        }
        if spec.sample_format != hound::SampleFormat::Int
            || !(spec.bits_per_sample == 16 || spec.bits_per_sample == 24)
        {
            return Err(RenderError::Background(format!(
                "must be 16-bit or 24-bit integer PCM (detected {}-bit {:?})",
                spec.bits_per_sample, spec.sample_format
            )));
        }

        // Normalize to 24-bit scale.
        let shift = 24 - spec.bits_per_sample as u32;
        let samples: Result<Vec<i32>, _> = reader
            .samples::<i32>()
            .map(|s| s.map(|v| v << shift))
            .collect();
        let mut samples =
            samples.map_err(|e| RenderError::Background(format!("decode error: {e}")))?;

        // Keep whole frames only.
        if samples.len() % 2 != 0 {
            samples.pop();
        }
        if samples.is_empty() {
            return Err(RenderError::Background("file contains no audio".to_string()));
        }

        debug!(
            frames = samples.len() / 2,
            sample_rate = spec.sample_rate,
            bits = spec.bits_per_sample,
            "background audio cached"
        );

        Ok(BackgroundAudio {
            samples,
            position: 0,
            sample_rate: spec.sample_rate,
            enabled: true,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fill `out` with interleaved samples, looping back to the start of
    /// the material on exhaustion. Disabled backgrounds yield silence.
    pub fn read_samples(&mut self, out: &mut [i32]) {
        if !self.enabled {
            out.fill(0);
            return;
        }

        let mut written = 0;
        while written < out.len() {
            if self.position == self.samples.len() {
                self.position = 0;
            }
            let run = (out.len() - written).min(self.samples.len() - self.position);
            out[written..written + run]
                .copy_from_slice(&self.samples[self.position..self.position + run]);
            self.position += run;
            written += run;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(spec: hound::WavSpec, samples: &[i32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn stereo_16(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let widened: Vec<i32> = samples.iter().map(|&s| s as i32).collect();
        wav_bytes(spec, &widened)
    }

    #[test]
    fn decodes_and_scales_16_bit() {
        let bg = BackgroundAudio::from_bytes(&stereo_16(44_100, &[100, -100, 50, -50])).unwrap();
        assert!(bg.is_enabled());
        assert_eq!(bg.sample_rate(), 44_100);

        let mut out = [0i32; 4];
        let mut bg = bg;
        bg.read_samples(&mut out);
        assert_eq!(out, [100 << 8, -100 << 8, 50 << 8, -50 << 8]);
    }

    #[test]
    fn loops_seamlessly() {
        let mut bg = BackgroundAudio::from_bytes(&stereo_16(44_100, &[1, 2, 3, 4])).unwrap();
        let mut out = [0i32; 10];
        bg.read_samples(&mut out);
        let expected: Vec<i32> = [1, 2, 3, 4, 1, 2, 3, 4, 1, 2]
            .iter()
            .map(|&v| v << 8)
            .collect();
        assert_eq!(out.to_vec(), expected);
    }

    #[test]
    fn rejects_mono_and_wrong_depth() {
        let mono = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        assert!(BackgroundAudio::from_bytes(&wav_bytes(mono, &[1, 2])).is_err());

        let eight = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        assert!(BackgroundAudio::from_bytes(&wav_bytes(eight, &[1, 2])).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(BackgroundAudio::from_bytes(b"not a wav at all").is_err());
    }

    #[test]
    fn disabled_background_is_silent() {
        let mut bg = BackgroundAudio::disabled();
        assert!(!bg.is_enabled());
        let mut out = [7i32; 8];
        bg.read_samples(&mut out);
        assert_eq!(out, [0i32; 8]);
    }

    #[test]
    fn accepts_24_bit() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 24,
            sample_format: hound::SampleFormat::Int,
        };
        let bg =
            BackgroundAudio::from_bytes(&wav_bytes(spec, &[1 << 20, -(1 << 20)])).unwrap();
        let mut bg = bg;
        let mut out = [0i32; 2];
        bg.read_samples(&mut out);
        assert_eq!(out, [1 << 20, -(1 << 20)]);
    }
}
