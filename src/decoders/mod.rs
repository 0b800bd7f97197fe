//! Decoder collaborators.
//!
//! A [`Decoder`] turns an input path into a [`PcmStream`] of raw s16le,
//! 48 kHz, stereo bytes. The mixer never negotiates formats; a decoder is
//! responsible for producing exactly that layout.
//!
//! - [`FfmpegDecoder`] - transcodes anything ffmpeg can read, out of process
//! - [`RawPcmDecoder`] - streams a file that already is raw s16le/48k/stereo
//! - [`OggDecoder`] - decodes Ogg Vorbis in process (requires `vorbis_src` feature)

mod ffmpeg;
mod raw;

#[cfg(feature = "vorbis_src")]
mod ogg;

pub use ffmpeg::FfmpegDecoder;
pub use raw::RawPcmDecoder;

#[cfg(feature = "vorbis_src")]
pub use ogg::OggDecoder;

use std::path::Path;

use crate::error::{MixerError, Result};
use crate::frame::FRAME_SIZE;
use crate::stream::PcmStream;

/// Frames buffered per source by default (200 ms).
pub const DEFAULT_BUFFER_FRAMES: usize = 10;

/// Opens a decode stream for an input.
pub trait Decoder: Send {
    /// Start decoding `input`. Fails with
    /// [`MixerError::SourceUnavailable`] if it cannot be opened.
    fn open(&self, input: &Path) -> Result<PcmStream>;
}

impl<D: Decoder + Sync> Decoder for alloc::sync::Arc<D> {
    fn open(&self, input: &Path) -> Result<PcmStream> {
        (**self).open(input)
    }
}

pub(crate) fn buffer_bytes(frames: usize) -> usize {
    frames.max(1) * FRAME_SIZE
}

pub(crate) fn require_file(input: &Path) -> Result<()> {
    if input.is_file() {
        Ok(())
    } else {
        Err(MixerError::unavailable(input, "file not found"))
    }
}
