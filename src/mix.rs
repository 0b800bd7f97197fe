//! Frame mixer - sums per-source chunks into one saturated output frame

use alloc::vec;

use crate::frame::{Frame, BYTES_PER_SAMPLE, FRAME_SAMPLES};

/// Mix raw s16le chunks into exactly one [`Frame`].
///
/// `chunks[i]` is scaled by `gains[i]`; the two slices are walked in
/// lockstep and any surplus entries on either side are ignored. A chunk
/// shorter than a frame contributes its available samples and silence for
/// the rest, and a trailing odd byte is never read. The weighted sum is
/// accumulated in `f64`, hard-clamped to the `i16` range (so a hot mix
/// saturates instead of wrapping) and truncated toward zero.
///
/// With no chunks the result is [`Frame::silence`].
pub fn mix_frame<B: AsRef<[u8]>>(chunks: &[B], gains: &[f64]) -> Frame {
    if chunks.is_empty() || gains.is_empty() {
        return Frame::silence();
    }

    let mut acc = vec![0f64; FRAME_SAMPLES];

    for (chunk, &gain) in chunks.iter().zip(gains) {
        let pairs = chunk.as_ref().chunks_exact(BYTES_PER_SAMPLE);
        for (sum, pair) in acc.iter_mut().zip(pairs) {
            *sum += gain * f64::from(i16::from_le_bytes([pair[0], pair[1]]));
        }
    }

    Frame::from_samples(acc.into_iter().map(saturate))
}

#[inline]
fn saturate(sum: f64) -> i16 {
    // NaN (e.g. from a NaN gain) maps to 0 through the cast.
    sum.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}
