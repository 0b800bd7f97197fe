//! Decoded PCM byte streams.
//!
//! A decoder feeds a [`PcmWriter`] from its own thread; the mixer owns the
//! matching [`PcmStream`] and polls it without blocking once per tick. The
//! two halves share an `rtrb` ring buffer of raw s16le bytes plus a
//! one-slot queue carrying the decoder's final outcome.

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::DecodeError;
use crate::frame::FRAME_SIZE;

/// How long a blocked writer sleeps before retrying a full ring.
const WRITE_BACKOFF: Duration = Duration::from_millis(2);

/// Create a connected writer/stream pair buffering up to `capacity` bytes.
///
/// `name` labels the stream in logs (usually the input path).
pub fn pcm_channel(name: impl Into<String>, capacity: usize) -> (PcmWriter, PcmStream) {
    let (pcm_tx, pcm_rx) = RingBuffer::<u8>::new(capacity.max(FRAME_SIZE));
    let (outcome_tx, outcome_rx) = RingBuffer::new(1);

    let writer = PcmWriter {
        pcm: pcm_tx,
        outcome: outcome_tx,
    };
    let stream = PcmStream {
        name: name.into(),
        pcm: pcm_rx,
        outcome: outcome_rx,
        finished: false,
        scratch: Vec::with_capacity(FRAME_SIZE),
        on_close: None,
    };
    (writer, stream)
}

/// Result of one non-blocking [`PcmStream::read_frame`].
#[derive(Debug, PartialEq)]
pub enum StreamRead<'a> {
    /// Bytes for this tick. A full frame, or the shorter tail of a finished stream.
    Chunk(&'a [u8]),
    /// Less than a frame is buffered and the decoder is still running.
    Pending,
    /// The decoder finished and every byte has been consumed.
    Ended,
    /// The decoder reported a failure.
    Failed(DecodeError),
}

/// Returned by [`PcmWriter::write_all`] when the reading half is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamClosed;

enum Outcome {
    Finished,
    Failed(DecodeError),
}

/// Producer half of a PCM stream, owned by a decoder.
pub struct PcmWriter {
    pcm: Producer<u8>,
    outcome: Producer<Outcome>,
}

impl PcmWriter {
    /// Push all of `bytes`, sleeping while the ring is full.
    ///
    /// Returns [`StreamClosed`] if the stream was destroyed meanwhile.
    pub fn write_all(&mut self, mut bytes: &[u8]) -> Result<(), StreamClosed> {
        while !bytes.is_empty() {
            if self.pcm.is_abandoned() {
                return Err(StreamClosed);
            }

            let n = self.pcm.slots().min(bytes.len());
            if n == 0 {
                thread::sleep(WRITE_BACKOFF);
                continue;
            }

            let chunk = self.pcm.write_chunk_uninit(n).map_err(|_| StreamClosed)?;
            let written = chunk.fill_from_iter(bytes[..n].iter().copied());
            bytes = &bytes[written..];
        }
        Ok(())
    }

    /// Copy `reader` into the stream until EOF.
    ///
    /// Returns `Ok(false)` if the stream was destroyed before EOF.
    pub fn pump(&mut self, mut reader: impl Read) -> io::Result<bool> {
        let mut buf = [0u8; 4096];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => return Ok(true),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if self.write_all(&buf[..n]).is_err() {
                return Ok(false);
            }
        }
    }

    /// Whether the reading half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.pcm.is_abandoned()
    }

    /// Mark the stream as complete. Buffered bytes stay readable.
    pub fn finish(mut self) {
        let _ = self.outcome.push(Outcome::Finished);
    }

    /// Mark the stream as failed.
    pub fn fail(mut self, error: DecodeError) {
        let _ = self.outcome.push(Outcome::Failed(error));
    }
}

/// Consumer half of a PCM stream: the decoded input of one source.
///
/// Dropping it destroys the stream and runs the decoder's teardown hook
/// (for example killing the decoder process).
pub struct PcmStream {
    name: String,
    pcm: Consumer<u8>,
    outcome: Consumer<Outcome>,
    /// The writer reported a clean finish; drain what is left.
    finished: bool,
    scratch: Vec<u8>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl PcmStream {
    /// Register a hook run once when this stream is destroyed.
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Label given to [`pcm_channel`].
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes currently buffered.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.pcm.slots()
    }

    /// Take up to one frame of bytes without blocking.
    pub fn read_frame(&mut self) -> StreamRead<'_> {
        let mut finished = self.finished;
        if !finished {
            match self.outcome.pop() {
                Ok(Outcome::Finished) => {
                    self.finished = true;
                    finished = true;
                }
                Ok(Outcome::Failed(error)) => return StreamRead::Failed(error),
                Err(_) => {}
            }
        }

        let available = self.pcm.slots();
        let take = if available >= FRAME_SIZE {
            FRAME_SIZE
        } else if finished {
            if available == 0 {
                return StreamRead::Ended;
            }
            available
        } else if self.outcome.is_abandoned() && self.outcome.is_empty() {
            // Writer dropped without finish() or fail().
            return StreamRead::Failed(DecodeError::new("decoder exited without finishing"));
        } else {
            return StreamRead::Pending;
        };

        self.scratch.clear();
        match self.pcm.read_chunk(take) {
            Ok(chunk) => {
                let (first, second) = chunk.as_slices();
                self.scratch.extend_from_slice(first);
                self.scratch.extend_from_slice(second);
                chunk.commit_all();
            }
            Err(_) => return StreamRead::Pending,
        }

        StreamRead::Chunk(&self.scratch)
    }

    /// Destroy the stream now. Equivalent to dropping it.
    pub fn destroy(self) {}
}

impl Drop for PcmStream {
    fn drop(&mut self) {
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl core::fmt::Debug for PcmStream {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PcmStream")
            .field("name", &self.name)
            .field("buffered", &self.pcm.slots())
            .finish()
    }
}
