//! Pull scheduler - turns one downstream pull into one mixed frame

use core::hash::Hash;

use alloc::vec::Vec;

use crate::error::DecodeError;
use crate::frame::Frame;
use crate::mix::mix_frame;
use crate::registry::SourceRegistry;
use crate::stream::StreamRead;

/// Whether a pull is currently being served.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the sink to ask for the next frame.
    Idle,
    /// Assembling a frame.
    Producing,
}

/// Why a source left the mix during a tick.
#[derive(Clone, Debug, PartialEq)]
pub enum Finish {
    Ended,
    Failed(DecodeError),
}

/// Output of one pull.
#[derive(Debug)]
pub struct Tick<K> {
    pub frame: Frame,
    /// Sources whose streams ended or failed this tick. They are still
    /// registered; removing them is up to the caller.
    pub finished: Vec<(K, Finish)>,
    /// Number of sources that had no full frame buffered.
    pub stalled: usize,
}

/// Demand-driven frame producer.
///
/// There is no clock in here: each [`pull`](Self::pull) produces exactly one
/// frame, so output cadence is whatever cadence the sink pulls at.
#[derive(Debug)]
pub struct PullScheduler {
    state: SchedulerState,
    frames_produced: u64,
}

impl PullScheduler {
    /// An idle scheduler that has produced nothing yet.
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            frames_produced: 0,
        }
    }

    /// Current state; `Idle` whenever no pull is running.
    #[inline]
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Frames produced so far.
    #[inline]
    pub fn frames_produced(&self) -> u64 {
        self.frames_produced
    }

    /// Serve one pull against the current registry contents.
    ///
    /// Each source is asked for up to one frame without blocking. Sources
    /// with nothing ready are skipped for this tick and stay registered.
    pub fn pull<K: Eq + Hash + Clone>(&mut self, registry: &mut SourceRegistry<K>) -> Tick<K> {
        debug_assert_eq!(self.state, SchedulerState::Idle);
        self.state = SchedulerState::Producing;

        let mut chunks: Vec<&[u8]> = Vec::with_capacity(registry.len());
        let mut gains = Vec::with_capacity(registry.len());
        let mut finished = Vec::new();
        let mut stalled = 0;

        for (key, source) in registry.iter_mut() {
            let gain = source.gain;
            match source.stream.read_frame() {
                StreamRead::Chunk(bytes) => {
                    chunks.push(bytes);
                    gains.push(gain);
                }
                StreamRead::Pending => stalled += 1,
                StreamRead::Ended => finished.push((key.clone(), Finish::Ended)),
                StreamRead::Failed(error) => finished.push((key.clone(), Finish::Failed(error))),
            }
        }

        let frame = mix_frame(&chunks, &gains);
        tracing::trace!(
            frame = self.frames_produced,
            mixed = chunks.len(),
            stalled,
            finished = finished.len(),
            "produced frame"
        );

        self.frames_produced += 1;
        self.state = SchedulerState::Idle;

        Tick {
            frame,
            finished,
            stalled,
        }
    }
}

impl Default for PullScheduler {
    fn default() -> Self {
        Self::new()
    }
}
