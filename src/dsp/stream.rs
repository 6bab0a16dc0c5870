//! Bounded bridge between the renderer (producer) and an external
//! consumer such as a streaming encoder.
//!
//! The renderer runs on a dedicated worker thread and pushes cloned
//! buffers into a bounded channel; a full queue blocks the producer
//! (backpressure — frames are never dropped). Dropping the receiving
//! half fails the producer's next send, which unwinds the render loop
//! with a consumer error surfaced by [`RenderStream::finish`].

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use tracing::debug;

use crate::dsp::renderer::Renderer;
use crate::error::RenderError;

/// Queue depth in buffers: enough to decouple producer and consumer,
/// small enough to bound memory and latency.
const QUEUE_DEPTH: usize = 2;

/// A renderer running on its own thread, consumed buffer by buffer.
pub struct RenderStream {
    rx: Option<Receiver<Vec<i16>>>,
    worker: Option<JoinHandle<Result<(), RenderError>>>,
}

impl RenderStream {
    /// Start rendering on a worker thread.
    pub fn spawn(mut renderer: Renderer) -> RenderStream {
        let (tx, rx) = bounded::<Vec<i16>>(QUEUE_DEPTH);

        let worker = thread::spawn(move || {
            let result = renderer.render(|samples| {
                tx.send(samples.to_vec())
                    .map_err(|_| RenderError::Consumer("stream receiver disconnected".to_string()))
            });
            debug!(ok = result.is_ok(), "render worker finished");
            result
        });

        RenderStream {
            rx: Some(rx),
            worker: Some(worker),
        }
    }

    /// Receive the next buffer; `None` once the renderer is done.
    pub fn next_buffer(&mut self) -> Option<Vec<i16>> {
        self.rx.as_ref()?.recv().ok()
    }

    /// Stop consuming and collect the renderer's result. Call after
    /// draining for a clean result, or early to abort the producer.
    pub fn finish(mut self) -> Result<(), RenderError> {
        // Closing our end makes a still-running producer unwind.
        drop(self.rx.take());
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .unwrap_or_else(|_| Err(RenderError::Consumer("render worker panicked".to_string()))),
            None => Ok(()),
        }
    }
}

impl Iterator for RenderStream {
    type Item = Vec<i16>;

    fn next(&mut self) -> Option<Vec<i16>> {
        self.next_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;

    const SOURCE: &str = "\
@samplerate 8000
alpha
  tone 300 binaural 10 amplitude 20
00:00:00 alpha
00:00:02 alpha
";

    fn renderer() -> Renderer {
        Renderer::for_sequence(&parse_text(SOURCE).unwrap()).unwrap()
    }

    #[test]
    fn streams_the_full_sequence() {
        let mut direct = Vec::new();
        renderer()
            .render(|buf| {
                direct.extend_from_slice(buf);
                Ok(())
            })
            .unwrap();

        let mut stream = RenderStream::spawn(renderer());
        let mut streamed = Vec::new();
        while let Some(buf) = stream.next_buffer() {
            streamed.extend_from_slice(&buf);
        }
        stream.finish().unwrap();

        // The bridge must deliver the exact same PCM, in order.
        assert_eq!(streamed, direct);
    }

    #[test]
    fn early_drop_propagates_consumer_error() {
        let mut stream = RenderStream::spawn(renderer());
        // Take one buffer, then walk away.
        assert!(stream.next_buffer().is_some());
        let result = stream.finish();
        assert!(
            matches!(result, Err(RenderError::Consumer(_))),
            "expected consumer error, got {result:?}"
        );
    }

    #[test]
    fn iterator_interface_drains() {
        let count = RenderStream::spawn(renderer()).count();
        // 2 s at 8 kHz in 1024-frame buffers.
        assert_eq!(count, 16);
    }
}
