//! # Mischpult
//!
//! A pull-driven mixer for raw PCM voice/audio streams.
//!
//! Any number of sources, each started and stopped independently under a
//! key of your choosing, are mixed into one continuous stream of 20 ms
//! frames (48 kHz, stereo, s16le). Every source has its own gain, and the
//! sum is hard-clamped per sample so loud mixes saturate instead of wrapping.
//!
//! ## Quick Start
//!
//! ```no_run
//! use mischpult::{Mixer, sinks::PacedWriter};
//!
//! let mut mixer = Mixer::new();
//!
//! // Any raw-byte consumer works as an output; here, stdout at real-time pace.
//! mixer.attach(PacedWriter::new(std::io::stdout()))?;
//!
//! mixer.play_sound("intro", "intro.mp3", 1.0)?;
//! mixer.play_sound("crowd", "crowd.ogg", 0.4)?;
//! # Ok::<(), mischpult::MixerError>(())
//! ```
//!
//! ## How frames are produced
//!
//! The mixer has no clock. The attached [`Connection`](sinks::Connection)
//! pulls from a [`MixedStream`] whenever it wants the next frame, and each
//! pull reads up to one frame from every source without blocking. A source
//! whose decoder has not caught up simply sits out that frame, so the
//! output never stalls.
//!
//! ## Features
//!
//! - `cpal_sink` - [`sinks::CpalSink`], playback on a local audio device
//! - `vorbis_src` - [`decoders::OggDecoder`], in-process Ogg Vorbis decoding

extern crate alloc;

mod engine;
mod error;
mod event;
mod frame;
mod mix;
mod output;
mod registry;
mod scheduler;
mod session;
mod stream;

pub mod decoders;
pub mod sinks;

pub use engine::SourceKey;
pub use error::{DecodeError, MixerError, Result};
pub use event::{EventReceiver, MixerEvent};
pub use frame::{
    Frame, BYTES_PER_SAMPLE, CHANNELS, FRAME_DURATION, FRAME_SAMPLES, FRAME_SIZE, SAMPLES_PER_FRAME,
    SAMPLE_RATE,
};
pub use mix::mix_frame;
pub use output::MixedStream;
pub use registry::{Source, SourceRegistry};
pub use scheduler::{Finish, PullScheduler, SchedulerState, Tick};
pub use session::Mixer;
pub use stream::{pcm_channel, PcmStream, PcmWriter, StreamClosed, StreamRead};
