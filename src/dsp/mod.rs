//! Audio rendering engine: wavetables, noise generation, channel state,
//! background playback, the renderer itself, and the bounded stream
//! bridge for external encoders.

pub mod background;
pub mod channel;
pub mod noise;
pub mod renderer;
pub mod stream;
pub mod wavetable;
