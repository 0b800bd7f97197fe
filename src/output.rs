//! The mixed output stream handed to a sink.

use std::io::{self, Read};

use alloc::string::String;
use alloc::sync::Arc;

use crate::frame::Frame;

/// Anything that can serve a pull for a given output generation.
pub(crate) trait FrameSource: Send + Sync {
    fn produce(&self, generation: u64) -> Option<Frame>;

    fn player_error(&self, generation: u64, cause: String);
}

/// The produce-next-frame capability of a [`Mixer`](crate::Mixer).
///
/// A sink pulls from this at its own cadence, ideally one frame per
/// [`FRAME_DURATION`](crate::FRAME_DURATION). Every pull yields exactly one
/// frame until the mixer detaches or resets, after which the stream is
/// over and every pull returns `None` (or EOF through [`Read`]).
pub struct MixedStream {
    source: Arc<dyn FrameSource>,
    generation: u64,
    /// Partially consumed frame for byte-level reads.
    pending: Option<(Frame, usize)>,
}

impl MixedStream {
    pub(crate) fn new(source: Arc<dyn FrameSource>, generation: u64) -> Self {
        Self {
            source,
            generation,
            pending: None,
        }
    }

    /// Produce the next frame, or `None` once the stream has been closed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.source.produce(self.generation)
    }

    /// Tell the mixer's subscribers that playback of this stream failed
    /// ([`MixerEvent::PlayerError`](crate::MixerEvent::PlayerError)).
    /// Ignored once the stream has been closed.
    pub fn report_error(&self, cause: impl Into<String>) {
        self.source.player_error(self.generation, cause.into());
    }
}

impl Iterator for MixedStream {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.next_frame()
    }
}

impl Read for MixedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let (frame, offset) = match self.pending.take() {
            Some(pending) => pending,
            None => match self.next_frame() {
                Some(frame) => (frame, 0),
                None => return Ok(0),
            },
        };

        let bytes = &frame.as_bytes()[offset..];
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);

        if offset + n < frame.len() {
            self.pending = Some((frame, offset + n));
        }
        Ok(n)
    }
}

impl core::fmt::Debug for MixedStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MixedStream")
            .field("generation", &self.generation)
            .finish()
    }
}
