//! Error types

use std::path::PathBuf;

use alloc::string::String;
use thiserror::Error;

/// Errors surfaced by [`Mixer`](crate::Mixer) operations and collaborators.
#[derive(Error, Debug)]
pub enum MixerError {
    /// Playback was requested while no connection is attached.
    #[error("mixer is not attached to a connection")]
    NotAttached,

    /// The input could not be opened or no decoder could be started for it.
    #[error("source unavailable: {input}: {reason}")]
    SourceUnavailable { input: PathBuf, reason: String },

    /// A decoder stream failed after it had started.
    #[error(transparent)]
    DecodeStream(#[from] DecodeError),

    /// The transport could not start playing the mixed stream.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MixerError {
    pub(crate) fn unavailable(input: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Failure reported by a decoder for one running source.
///
/// Cloneable so the same cause can reach every event subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("decode stream failed: {reason}")]
pub struct DecodeError {
    reason: String,
}

impl DecodeError {
    /// A failure described by `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// What went wrong, as reported by the decoder.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, MixerError>;
