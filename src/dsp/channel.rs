//! Per-channel runtime state and the per-buffer sync step.

use crate::dsp::wavetable::{phase_increment, WAVE_TABLE_AMPLITUDE};
use crate::track::{EffectKind, Track, TrackKind};

/// Runtime state of one of the 16 renderer channels: the currently
/// interpolated track plus two fixed-point oscillators (Q16.16 offsets
/// and increments into the wavetables) and two amplitude registers.
/// Mutated every buffer by sync and every sample by the mixer; never
/// persisted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Channel {
    pub track: Track,
    /// Kind cache used to detect voice changes across period boundaries.
    pub kind: TrackKind,
    pub amp: [i32; 2],
    pub inc: [i32; 2],
    pub off: [i32; 2],
}

impl Channel {
    /// Interpolate between a period's start and end tracks and derive the
    /// oscillator parameters for the current voice.
    ///
    /// `progress` is the transition-shaped position in [0, 1]. Kind and
    /// waveform are not interpolated; the period builder guarantees they
    /// match across the boundary. A kind change resets both phase
    /// accumulators.
    pub fn sync(&mut self, start: &Track, end: &Track, progress: f64, sample_rate: u32) {
        let lerp = |a: f64, b: f64| a * (1.0 - progress) + b * progress;

        self.track.kind = start.kind;
        self.track.waveform = start.waveform;
        self.track.amplitude = lerp(start.amplitude, end.amplitude);
        self.track.carrier = lerp(start.carrier, end.carrier);
        self.track.resonance = lerp(start.resonance, end.resonance);
        self.track.effect.kind = start.effect.kind;
        self.track.effect.intensity = lerp(start.effect.intensity, end.effect.intensity);

        if self.kind != self.track.kind {
            self.kind = self.track.kind;
            self.off = [0, 0];
        }

        let amplitude = self.track.amplitude as i32;

        match self.track.kind {
            TrackKind::Off | TrackKind::Silence => {}
            TrackKind::Tone => {
                self.amp[0] = amplitude;
                self.inc[0] = phase_increment(self.track.carrier, sample_rate);
            }
            TrackKind::Binaural => {
                let high = self.track.carrier + self.track.resonance / 2.0;
                let low = self.track.carrier - self.track.resonance / 2.0;
                self.amp[0] = amplitude;
                self.amp[1] = amplitude;
                self.inc[0] = phase_increment(high, sample_rate);
                self.inc[1] = phase_increment(low, sample_rate);
            }
            TrackKind::Monaural => {
                let high = self.track.carrier + self.track.resonance / 2.0;
                let low = self.track.carrier - self.track.resonance / 2.0;
                self.amp[0] = amplitude;
                self.inc[0] = phase_increment(high, sample_rate);
                self.inc[1] = phase_increment(low, sample_rate);
            }
            TrackKind::Isochronic => {
                self.amp[0] = amplitude;
                self.inc[0] = phase_increment(self.track.carrier, sample_rate);
                self.inc[1] = phase_increment(self.track.resonance, sample_rate);
            }
            TrackKind::Noise(_) => {
                self.amp[0] = amplitude;
            }
            TrackKind::Spin(_) => {
                self.amp[0] = amplitude;
                self.inc[0] = phase_increment(self.track.resonance, sample_rate);
                self.inc[1] = spin_width_factor(self.track.carrier, sample_rate);
            }
            TrackKind::Background => {
                self.amp[0] = amplitude;
                match self.track.effect.kind {
                    EffectKind::Spin => {
                        self.inc[0] = phase_increment(self.track.resonance, sample_rate);
                        self.inc[1] = spin_width_factor(self.track.carrier, sample_rate);
                    }
                    EffectKind::Pulse => {
                        self.inc[1] = phase_increment(self.track.resonance, sample_rate);
                    }
                    EffectKind::Off => {}
                }
            }
        }
    }
}

/// Fixed-point multiplier turning a wavetable sample into a spin rotation.
///
/// The width is an inter-aural delay in µs, clamped so the derived
/// rotation never exceeds ±127 (larger widths click audibly).
fn spin_width_factor(width_us: f64, sample_rate: u32) -> i32 {
    let width_max = 127.0 / 1e-6 / sample_rate as f64;
    let clamped = width_us.clamp(-width_max, width_max);
    (clamped * 1e-6 * sample_rate as f64 * (1u32 << 24) as f64 / WAVE_TABLE_AMPLITUDE as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{amplitude_from_percent, NoiseKind, Waveform};

    fn binaural(carrier: f64, resonance: f64, amp_percent: f64) -> Track {
        Track {
            kind: TrackKind::Binaural,
            carrier,
            resonance,
            amplitude: amplitude_from_percent(amp_percent),
            ..Track::default()
        }
    }

    #[test]
    fn interpolates_between_start_and_end() {
        let start = binaural(200.0, 10.0, 0.0);
        let end = binaural(300.0, 4.0, 100.0);

        let mut ch = Channel::default();
        ch.sync(&start, &end, 0.5, 44_100);

        assert_eq!(ch.track.carrier, 250.0);
        assert_eq!(ch.track.resonance, 7.0);
        assert_eq!(ch.track.amplitude, 2048.0);
        assert_eq!(ch.kind, TrackKind::Binaural);
    }

    #[test]
    fn binaural_splits_carrier() {
        let voice = binaural(200.0, 10.0, 50.0);
        let mut ch = Channel::default();
        ch.sync(&voice, &voice, 0.0, 44_100);

        assert_eq!(ch.inc[0], phase_increment(205.0, 44_100));
        assert_eq!(ch.inc[1], phase_increment(195.0, 44_100));
        assert_eq!(ch.amp[0], ch.amp[1]);
    }

    #[test]
    fn kind_change_resets_phase() {
        let voice = binaural(200.0, 10.0, 50.0);
        let mut ch = Channel::default();
        ch.sync(&voice, &voice, 0.0, 44_100);
        ch.off = [123, 456];

        // Same kind: phase untouched.
        ch.sync(&voice, &voice, 0.5, 44_100);
        assert_eq!(ch.off, [123, 456]);

        // New kind: both accumulators reset.
        let noise = Track {
            kind: TrackKind::Noise(NoiseKind::Pink),
            amplitude: amplitude_from_percent(50.0),
            ..Track::default()
        };
        ch.sync(&noise, &noise, 0.0, 44_100);
        assert_eq!(ch.off, [0, 0]);
    }

    #[test]
    fn waveform_is_copied_not_interpolated() {
        let mut voice = binaural(200.0, 10.0, 50.0);
        voice.waveform = Waveform::Triangle;
        let mut ch = Channel::default();
        ch.sync(&voice, &voice, 0.3, 44_100);
        assert_eq!(ch.track.waveform, Waveform::Triangle);
    }

    #[test]
    fn spin_width_is_clamped() {
        let max = spin_width_factor(1e9, 44_100);
        let exact = spin_width_factor(127.0 / 1e-6 / 44_100.0, 44_100);
        assert_eq!(max, exact);
        assert_eq!(spin_width_factor(-1e9, 44_100), -exact);

        // In range, the factor scales linearly with width.
        let one = spin_width_factor(100.0, 44_100);
        let two = spin_width_factor(200.0, 44_100);
        assert!((two - one * 2).abs() <= 1);
    }

    #[test]
    fn background_pulse_drives_modulator_increment() {
        let bg = Track {
            kind: TrackKind::Background,
            resonance: 4.0,
            amplitude: amplitude_from_percent(60.0),
            effect: crate::track::Effect {
                kind: EffectKind::Pulse,
                intensity: 0.5,
            },
            ..Track::default()
        };
        let mut ch = Channel::default();
        ch.sync(&bg, &bg, 0.0, 44_100);
        assert_eq!(ch.inc[1], phase_increment(4.0, 44_100));
    }
}
