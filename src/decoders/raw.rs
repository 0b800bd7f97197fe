//! Raw PCM file decoder

use std::fs::File;
use std::path::Path;
use std::thread;

use crate::decoders::{buffer_bytes, require_file, Decoder, DEFAULT_BUFFER_FRAMES};
use crate::error::{DecodeError, MixerError, Result};
use crate::stream::{pcm_channel, PcmStream};

/// Streams a file that is already raw s16le, 48 kHz, stereo.
///
/// No transcoding happens; the bytes are copied into the stream by a
/// worker thread as fast as the mixer drains them.
#[derive(Clone, Debug)]
pub struct RawPcmDecoder {
    buffer_frames: usize,
}

impl RawPcmDecoder {
    /// Decoder buffering [`DEFAULT_BUFFER_FRAMES`].
    pub fn new() -> Self {
        Self {
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }

    /// How many frames to buffer ahead of the mixer.
    pub fn with_buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames;
        self
    }
}

impl Default for RawPcmDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RawPcmDecoder {
    fn open(&self, input: &Path) -> Result<PcmStream> {
        require_file(input)?;
        let file = File::open(input).map_err(|e| MixerError::unavailable(input, e.to_string()))?;

        let name = input.display().to_string();
        let (mut writer, stream) = pcm_channel(name.clone(), buffer_bytes(self.buffer_frames));

        thread::Builder::new()
            .name("mischpult-raw".into())
            .spawn(move || match writer.pump(file) {
                Ok(true) => writer.finish(),
                Ok(false) => tracing::trace!(input = %name, "stream closed before end of file"),
                Err(err) => writer.fail(DecodeError::new(err.to_string())),
            })?;

        Ok(stream)
    }
}
