//! The shared mixing core.
//!
//! Registry mutation (from [`Mixer`](crate::Mixer) on the caller's thread)
//! and registry iteration (from the sink's thread, through
//! [`MixedStream`](crate::MixedStream)) are serialized by one mutex around
//! [`Engine`]. Nothing inside the lock blocks.

use core::fmt::Debug;
use core::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use alloc::string::String;

use crate::event::{EventBus, MixerEvent};
use crate::frame::Frame;
use crate::output::FrameSource;
use crate::registry::SourceRegistry;
use crate::scheduler::{Finish, PullScheduler};

/// Bound on what keys must support to be used across the engine.
pub trait SourceKey: Clone + Eq + Hash + Debug + Send + 'static {}

impl<K: Clone + Eq + Hash + Debug + Send + 'static> SourceKey for K {}

pub(crate) struct Engine<K> {
    pub registry: SourceRegistry<K>,
    pub events: EventBus<K>,
    scheduler: PullScheduler,
    /// Generation of the output stream currently allowed to pull.
    output: Option<u64>,
    next_generation: u64,
}

impl<K: SourceKey> Engine<K> {
    pub fn new(event_capacity: usize) -> Self {
        Self {
            registry: SourceRegistry::new(),
            events: EventBus::new(event_capacity),
            scheduler: PullScheduler::new(),
            output: None,
            next_generation: 0,
        }
    }

    pub fn frames_produced(&self) -> u64 {
        self.scheduler.frames_produced()
    }

    /// Produce the next frame for output stream `generation`.
    pub fn produce(&mut self, generation: u64) -> Option<Frame> {
        if self.output != Some(generation) {
            return None;
        }

        let tick = self.scheduler.pull(&mut self.registry);

        for (key, finish) in tick.finished {
            // Dropping the source releases its stream.
            drop(self.registry.remove(&key));
            let event = match finish {
                Finish::Ended => MixerEvent::End(key),
                Finish::Failed(cause) => MixerEvent::Error { key, cause },
            };
            self.events.emit(event);
        }

        Some(tick.frame)
    }

    /// Publish a failure of the connection playing output `generation`.
    pub fn player_error(&mut self, generation: u64, cause: String) {
        if self.output == Some(generation) {
            self.events.emit(MixerEvent::PlayerError { cause });
        } else {
            tracing::debug!(generation, %cause, "player error from a closed output");
        }
    }
}

impl<K> Engine<K> {
    /// Start a new output stream generation, invalidating any older one.
    pub fn open_output(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.output = Some(generation);
        generation
    }

    /// End the current output stream. Its next pull returns `None`.
    pub fn close_output(&mut self) {
        self.output = None;
    }
}

pub(crate) fn lock<K>(engine: &Mutex<Engine<K>>) -> MutexGuard<'_, Engine<K>> {
    // Engine state is consistent between calls, so a panic elsewhere does
    // not invalidate it.
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K: SourceKey> FrameSource for Mutex<Engine<K>> {
    fn produce(&self, generation: u64) -> Option<Frame> {
        lock(self).produce(generation)
    }

    fn player_error(&self, generation: u64, cause: String) {
        lock(self).player_error(generation, cause)
    }
}
