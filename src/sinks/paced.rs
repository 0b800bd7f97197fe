//! Real-time paced writer sink

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};
use std::time::Instant;

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::error::{MixerError, Result};
use crate::frame::FRAME_DURATION;
use crate::output::MixedStream;
use crate::sinks::{Connection, Player};

/// A connection that pulls one frame every 20 ms and writes the raw bytes
/// into `W`.
///
/// Pacing is deadline based (frame `n` is due at `start + n * 20ms`), so a
/// slow write does not accumulate drift. Pipe the output of
/// `PacedWriter::new(std::io::stdout())` into
/// `ffplay -f s16le -ar 48000 -ch_layout stereo -` to listen.
pub struct PacedWriter<W> {
    writer: Option<W>,
}

impl<W: Write + Send + 'static> PacedWriter<W> {
    /// Pace the mix into `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }
}

impl<W: Write + Send + 'static> Connection for PacedWriter<W> {
    fn subscribe(&mut self, stream: MixedStream) -> Result<Box<dyn Player>> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| MixerError::Transport("paced writer already subscribed".into()))?;

        let stopped = Arc::new(AtomicBool::new(false));
        let flag = stopped.clone();

        let handle = thread::Builder::new()
            .name("mischpult-paced".into())
            .spawn(move || run(stream, writer, &flag))?;

        Ok(Box::new(PacedPlayer {
            stopped,
            thread: handle.thread().clone(),
        }))
    }
}

fn run<W: Write>(mut stream: MixedStream, mut writer: W, stopped: &AtomicBool) {
    let start = Instant::now();
    let mut written: u32 = 0;

    while !stopped.load(Ordering::Acquire) {
        let Some(frame) = stream.next_frame() else {
            break;
        };

        if let Err(err) = writer.write_all(frame.as_bytes()) {
            tracing::debug!(%err, "paced writer failed, stopping");
            stream.report_error(err.to_string());
            break;
        }
        written += 1;

        let due = start + FRAME_DURATION * written;
        loop {
            let now = Instant::now();
            if now >= due || stopped.load(Ordering::Acquire) {
                break;
            }
            thread::park_timeout(due - now);
        }
    }

    let _ = writer.flush();
    tracing::debug!(frames = written, "paced writer finished");
}

struct PacedPlayer {
    stopped: Arc<AtomicBool>,
    thread: Thread,
}

impl Player for PacedPlayer {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.thread.unpark();
    }
}
