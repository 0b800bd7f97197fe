//! Fixed frame geometry and the [`Frame`] type.
//!
//! Every tick of the mixer produces exactly one frame: 20 ms of interleaved
//! stereo, signed 16-bit little-endian PCM at 48 kHz.

use core::time::Duration;

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 48_000;
/// Interleaved channel count (L, R).
pub const CHANNELS: usize = 2;
/// Width of one sample in bytes.
pub const BYTES_PER_SAMPLE: usize = 2;
/// Samples per channel in one frame.
pub const SAMPLES_PER_FRAME: usize = 960;
/// Interleaved samples in one frame.
pub const FRAME_SAMPLES: usize = SAMPLES_PER_FRAME * CHANNELS;
/// Size of one frame in bytes (3840).
pub const FRAME_SIZE: usize = FRAME_SAMPLES * BYTES_PER_SAMPLE;
/// Wall-clock length of one frame.
pub const FRAME_DURATION: Duration = Duration::from_millis(20);

/// One immutable block of mixed output.
///
/// A `Frame` is always exactly [`FRAME_SIZE`] bytes long.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Box<[u8]>,
}

impl Frame {
    /// The all-zero frame.
    pub fn silence() -> Self {
        Self {
            bytes: vec![0u8; FRAME_SIZE].into_boxed_slice(),
        }
    }

    /// Build a frame from interleaved samples. Used by the mixer, which
    /// always produces [`FRAME_SAMPLES`] of them.
    pub(crate) fn from_samples(samples: impl IntoIterator<Item = i16>) -> Self {
        let mut bytes = Vec::with_capacity(FRAME_SIZE);
        for sample in samples.into_iter().take(FRAME_SAMPLES) {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes.resize(FRAME_SIZE, 0);

        Self {
            bytes: bytes.into_boxed_slice(),
        }
    }

    /// The raw s16le bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the raw s16le bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_vec()
    }

    /// Always [`FRAME_SIZE`].
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Never true; present for symmetry with [`len`](Self::len).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Iterate the interleaved samples of this frame.
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Read the sample at interleaved index `index`.
    pub fn sample(&self, index: usize) -> Option<i16> {
        let offset = index * BYTES_PER_SAMPLE;
        let pair = self.bytes.get(offset..offset + BYTES_PER_SAMPLE)?;
        Some(i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Whether every sample is zero.
    pub fn is_silent(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl core::fmt::Debug for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.bytes.len())
            .field("silent", &self.is_silent())
            .finish()
    }
}
