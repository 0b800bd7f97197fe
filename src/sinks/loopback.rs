//! Loopback connection - the caller pulls frames itself

use std::sync::{Mutex, MutexGuard, PoisonError};

use alloc::boxed::Box;
use alloc::sync::Arc;

use crate::error::Result;
use crate::frame::Frame;
use crate::output::MixedStream;
use crate::sinks::{Connection, Player};

type Slot = Arc<Mutex<Option<MixedStream>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<MixedStream>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connection that parks the mixed stream where a [`LoopbackTap`] can
/// reach it.
///
/// Useful when the host already has its own clock (a game loop, a network
/// tick) or for driving a mixer deterministically in tests.
///
/// ```
/// use mischpult::{Mixer, sinks::Loopback};
///
/// let (connection, tap) = Loopback::new();
/// let mut mixer: Mixer<&str> = Mixer::new();
/// mixer.attach(connection).unwrap();
///
/// let frame = tap.pull().unwrap();
/// assert!(frame.is_silent());
/// ```
pub struct Loopback {
    slot: Slot,
}

/// Pulling end of a [`Loopback`] connection.
#[derive(Clone)]
pub struct LoopbackTap {
    slot: Slot,
}

impl Loopback {
    /// A connection and the tap that pulls from it.
    pub fn new() -> (Loopback, LoopbackTap) {
        let slot = Slot::default();
        (Loopback { slot: slot.clone() }, LoopbackTap { slot })
    }
}

impl LoopbackTap {
    /// Pull one frame. `None` while nothing is attached.
    pub fn pull(&self) -> Option<Frame> {
        lock(&self.slot).as_mut()?.next_frame()
    }

    /// Whether a mixed stream is currently subscribed.
    pub fn is_playing(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

impl Connection for Loopback {
    fn subscribe(&mut self, stream: MixedStream) -> Result<Box<dyn Player>> {
        *lock(&self.slot) = Some(stream);
        Ok(Box::new(LoopbackPlayer {
            slot: self.slot.clone(),
        }))
    }
}

struct LoopbackPlayer {
    slot: Slot,
}

impl Player for LoopbackPlayer {
    fn stop(&mut self) {
        lock(&self.slot).take();
    }
}
