//! CPAL audio output sink

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, Thread};

use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, SupportedStreamConfig};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::{MixerError, Result};
use crate::frame::{CHANNELS, FRAME_DURATION, FRAME_SAMPLES, SAMPLE_RATE};
use crate::output::MixedStream;
use crate::sinks::{Connection, Player};

/// Frames queued between the mixer and the device (100 ms).
const QUEUED_FRAMES: usize = 5;

/// Device errors held for the feeder until it next wakes up.
const ERROR_SLOTS: usize = 8;

/// A connection that plays the mix on a CPAL output device.
///
/// The device must support 48 kHz stereo; nothing is resampled.
///
/// Two threads are involved. A feeder pulls frames from the mixer into a
/// lock-free ring, and the CPAL callback only pops samples from that ring,
/// playing silence on underrun. The callback never touches the mixer.
pub struct CpalSink {
    device: cpal::Device,
    config: SupportedStreamConfig,
    name: String,
}

impl CpalSink {
    /// Use the system's default output device.
    pub fn default_output() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| MixerError::Transport("no output device available".into()))?;
        Self::new(device)
    }

    /// Use a specific device, provided it can run at 48 kHz stereo.
    pub fn new(device: cpal::Device) -> Result<Self> {
        let name = device.name().unwrap_or_else(|_| "Unknown".into());

        let config = device
            .supported_output_configs()
            .map_err(|e| MixerError::Transport(format!("{}: {}", name, e)))?
            .filter(|range| range.channels() as usize == CHANNELS)
            .find(|range| {
                range.min_sample_rate().0 <= SAMPLE_RATE && SAMPLE_RATE <= range.max_sample_rate().0
            })
            .map(|range| range.with_sample_rate(cpal::SampleRate(SAMPLE_RATE)))
            .ok_or_else(|| {
                MixerError::Transport(format!("{} cannot play {} Hz stereo", name, SAMPLE_RATE))
            })?;

        Ok(Self {
            device,
            config,
            name,
        })
    }

    /// Device name as reported by the host.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Connection for CpalSink {
    fn subscribe(&mut self, stream: MixedStream) -> Result<Box<dyn Player>> {
        let (samples_tx, samples_rx) = RingBuffer::<i16>::new(FRAME_SAMPLES * QUEUED_FRAMES);
        let (errors_tx, errors_rx) = RingBuffer::<String>::new(ERROR_SLOTS);
        let stopped = Arc::new(AtomicBool::new(false));
        let had_underrun = Arc::new(AtomicBool::new(false));

        let output = spawn_output(
            self.device.clone(),
            self.config.clone(),
            Callback {
                samples: samples_rx,
                errors: errors_tx,
                had_underrun: had_underrun.clone(),
            },
            stopped.clone(),
        )?;

        let feeder = Feeder {
            stream,
            samples: samples_tx,
            errors: errors_rx,
            had_underrun,
        };
        let flag = stopped.clone();
        let feeder = thread::Builder::new()
            .name("mischpult-cpal-feed".into())
            .spawn(move || feeder.run(&flag));

        let feeder = match feeder {
            Ok(handle) => handle,
            Err(err) => {
                stopped.store(true, Ordering::Release);
                output.unpark();
                return Err(err.into());
            }
        };

        tracing::info!(device = %self.name, "cpal output started");
        Ok(Box::new(CpalPlayer {
            stopped,
            threads: [output, feeder.thread().clone()],
        }))
    }
}

/// Start the thread owning the CPAL stream and wait until it plays.
///
/// `cpal::Stream` is not `Send` everywhere, so it lives and dies on that
/// thread.
fn spawn_output(
    device: cpal::Device,
    config: SupportedStreamConfig,
    callback: Callback,
    stopped: Arc<AtomicBool>,
) -> Result<Thread> {
    let (ready_tx, ready_rx) = mpsc::sync_channel(1);

    let handle = thread::Builder::new()
        .name("mischpult-cpal".into())
        .spawn(move || {
            let stream = match build_stream(&device, &config, callback) {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            while !stopped.load(Ordering::Acquire) {
                thread::park();
            }
            drop(stream);
        })?;

    ready_rx
        .recv()
        .map_err(|_| MixerError::Transport("output thread exited".into()))??;
    Ok(handle.thread().clone())
}

struct CpalPlayer {
    stopped: Arc<AtomicBool>,
    threads: [Thread; 2],
}

impl Player for CpalPlayer {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        for thread in &self.threads {
            thread.unpark();
        }
    }
}

/// Keeps the sample ring topped up from the mixer.
struct Feeder {
    stream: MixedStream,
    samples: Producer<i16>,
    errors: Consumer<String>,
    had_underrun: Arc<AtomicBool>,
}

impl Feeder {
    fn run(mut self, stopped: &AtomicBool) {
        // Wake up a few times per frame so the ring never runs dry.
        let nap = FRAME_DURATION / 4;

        while !stopped.load(Ordering::Acquire) && !self.samples.is_abandoned() {
            while let Ok(cause) = self.errors.pop() {
                self.stream.report_error(cause);
            }
            if self.had_underrun.swap(false, Ordering::Relaxed) {
                tracing::debug!("cpal output underrun");
            }

            if self.samples.slots() < FRAME_SAMPLES {
                thread::park_timeout(nap);
                continue;
            }

            let Some(frame) = self.stream.next_frame() else {
                break;
            };
            if let Ok(chunk) = self.samples.write_chunk_uninit(FRAME_SAMPLES) {
                chunk.fill_from_iter(frame.samples());
            }
        }

        tracing::debug!("cpal feeder finished");
    }
}

/// State owned by the real-time callback. Nothing in here blocks.
struct Callback {
    samples: Consumer<i16>,
    errors: Producer<String>,
    had_underrun: Arc<AtomicBool>,
}

fn build_stream(
    device: &cpal::Device,
    config: &SupportedStreamConfig,
    callback: Callback,
) -> Result<cpal::Stream> {
    let stream = match config.sample_format() {
        SampleFormat::F32 => build_typed::<f32>(device, config, callback),
        SampleFormat::I16 => build_typed::<i16>(device, config, callback),
        SampleFormat::U16 => build_typed::<u16>(device, config, callback),
        other => {
            return Err(MixerError::Transport(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    }?;

    stream
        .play()
        .map_err(|e| MixerError::Transport(format!("failed to start stream: {}", e)))?;
    Ok(stream)
}

fn build_typed<T>(
    device: &cpal::Device,
    config: &SupportedStreamConfig,
    callback: Callback,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let Callback {
        mut samples,
        mut errors,
        had_underrun,
    } = callback;

    device
        .build_output_stream(
            &config.config(),
            move |data: &mut [T], _| {
                let mut underrun = false;
                for sample in data.iter_mut() {
                    let s = samples.pop().unwrap_or_else(|_| {
                        underrun = true;
                        0
                    });
                    *sample = T::from_sample(s);
                }
                if underrun {
                    had_underrun.store(true, Ordering::Relaxed);
                }
            },
            move |err| {
                tracing::error!(%err, "cpal stream error");
                let _ = errors.push(err.to_string());
            },
            None,
        )
        .map_err(|e| MixerError::Transport(format!("failed to build output stream: {}", e)))
}
