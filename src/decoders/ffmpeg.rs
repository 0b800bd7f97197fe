//! ffmpeg subprocess decoder

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use alloc::format;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::decoders::{buffer_bytes, require_file, Decoder, DEFAULT_BUFFER_FRAMES};
use crate::error::{DecodeError, MixerError, Result};
use crate::frame::{CHANNELS, SAMPLE_RATE};
use crate::stream::{pcm_channel, PcmStream};

const REAP_INTERVAL: Duration = Duration::from_millis(5);

/// Decodes any input ffmpeg understands by running it as a child process.
///
/// The child is started with fixed output arguments
/// (`-f s16le -ar 48000 -ac 2 pipe:1`), so its stdout is exactly the format
/// the mixer consumes. A non-zero exit status fails the stream; destroying
/// the stream kills the child.
#[derive(Clone, Debug)]
pub struct FfmpegDecoder {
    program: PathBuf,
    buffer_frames: usize,
}

impl FfmpegDecoder {
    /// Decode with `ffmpeg` from `PATH`, buffering [`DEFAULT_BUFFER_FRAMES`].
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }

    /// Use a specific ffmpeg binary instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// How many frames to buffer ahead of the mixer.
    pub fn with_buffer_frames(mut self, frames: usize) -> Self {
        self.buffer_frames = frames;
        self
    }

    fn args(input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-loglevel", "error", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        args.extend(
            [
                "-f".to_string(),
                "s16le".to_string(),
                "-ar".to_string(),
                SAMPLE_RATE.to_string(),
                "-ac".to_string(),
                CHANNELS.to_string(),
                "pipe:1".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args
    }
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(child: &Mutex<Child>) -> MutexGuard<'_, Child> {
    child.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wait for the child without holding its lock across the wait, so a
/// concurrent kill from the mixer side never blocks.
fn reap(child: &Mutex<Child>) -> std::io::Result<ExitStatus> {
    loop {
        if let Some(status) = lock(child).try_wait()? {
            return Ok(status);
        }
        thread::sleep(REAP_INTERVAL);
    }
}

impl Decoder for FfmpegDecoder {
    fn open(&self, input: &Path) -> Result<PcmStream> {
        require_file(input)?;

        let mut child = Command::new(&self.program)
            .args(Self::args(input))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                MixerError::unavailable(
                    input,
                    format!("cannot start {}: {}", self.program.display(), e),
                )
            })?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(MixerError::unavailable(input, "decoder has no stdout"));
        };

        let name = input.display().to_string();
        let (mut writer, stream) = pcm_channel(name.clone(), buffer_bytes(self.buffer_frames));
        tracing::debug!(input = %name, pid = child.id(), "spawned ffmpeg");

        let child = Arc::new(Mutex::new(child));
        let worker_child = child.clone();

        let spawned = thread::Builder::new()
            .name("mischpult-ffmpeg".into())
            .spawn(move || {
                let pumped = writer.pump(stdout);
                if !matches!(pumped, Ok(true)) {
                    let _ = lock(&worker_child).kill();
                }

                match (pumped, reap(&worker_child)) {
                    (Ok(true), Ok(status)) if status.success() => writer.finish(),
                    (Ok(true), Ok(status)) => {
                        writer.fail(DecodeError::new(format!("ffmpeg exited with {}", status)))
                    }
                    (Ok(false), _) => tracing::trace!(input = %name, "stream closed, ffmpeg killed"),
                    (Err(err), _) | (Ok(true), Err(err)) => {
                        writer.fail(DecodeError::new(err.to_string()))
                    }
                }
            });

        if let Err(err) = spawned {
            let _ = lock(&child).kill();
            return Err(err.into());
        }

        Ok(stream.on_close(move || {
            // Already exited is fine.
            let _ = lock(&child).kill();
        }))
    }
}
