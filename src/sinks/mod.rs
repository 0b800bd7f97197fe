//! Transport collaborators.
//!
//! A [`Connection`] is whatever ultimately plays the mix: a voice channel,
//! an audio device, a pipe. When a [`Mixer`](crate::Mixer) attaches it hands
//! the connection a [`MixedStream`]; the connection pulls frames from it at
//! its own pace and returns a [`Player`] that stops playback on demand.
//!
//! Built-in connections:
//! - [`Loopback`] - the caller pulls frames by hand (tests, custom clocks)
//! - [`PacedWriter`] - pulls one frame per 20 ms into any [`std::io::Write`]
//! - [`CpalSink`] - plays through an audio device (requires `cpal_sink` feature)

mod loopback;
mod paced;

#[cfg(feature = "cpal_sink")]
mod cpal_sink;

pub use loopback::{Loopback, LoopbackTap};
pub use paced::PacedWriter;

#[cfg(feature = "cpal_sink")]
pub use cpal_sink::CpalSink;

use alloc::boxed::Box;

use crate::error::Result;
use crate::output::MixedStream;

/// Something that can play a [`MixedStream`].
pub trait Connection: Send {
    /// Start pulling from `stream`. The returned player stops it.
    fn subscribe(&mut self, stream: MixedStream) -> Result<Box<dyn Player>>;
}

/// Playback of a mixed stream on a connection.
pub trait Player: Send {
    /// Stop pulling frames. Called exactly once, on detach or reset.
    fn stop(&mut self);
}
