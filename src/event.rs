//! Mixer notifications.
//!
//! Events are advisory: they are traced, then copied into every live
//! subscriber's lock-free queue. A subscriber that falls behind loses
//! events rather than stalling the mix.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::error::DecodeError;

/// Something that happened to the mixer or one of its sources.
#[derive(Clone, Debug, PartialEq)]
pub enum MixerEvent<K> {
    /// A connection was attached and the mixed stream is playing.
    Attached,
    /// The connection was detached.
    Detached,
    /// A source started playing.
    Play(K),
    /// A source's stream completed normally.
    End(K),
    /// A source's stream failed and the source was removed.
    Error { key: K, cause: DecodeError },
    /// A source was stopped by the caller (or replaced, or reset).
    Stop(K),
    /// A source's gain changed.
    Volume { key: K, gain: f64 },
    /// The attached connection failed while playing. The mixer stays
    /// attached; call [`Mixer::detach`](crate::Mixer::detach) to give up on it.
    PlayerError { cause: String },
    /// Every source was stopped and the session torn down.
    Reset,
}

/// Receiving end of a [`Mixer::subscribe`](crate::Mixer::subscribe) queue.
pub struct EventReceiver<K> {
    queue: Consumer<MixerEvent<K>>,
}

impl<K> EventReceiver<K> {
    /// Pop the next pending event, if any.
    pub fn try_recv(&mut self) -> Option<MixerEvent<K>> {
        self.queue.pop().ok()
    }

    /// Drain every pending event.
    pub fn drain(&mut self) -> impl Iterator<Item = MixerEvent<K>> + '_ {
        core::iter::from_fn(move || self.queue.pop().ok())
    }

    /// Whether no event is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Fan-out of events to subscriber queues.
pub(crate) struct EventBus<K> {
    subscribers: Vec<Producer<MixerEvent<K>>>,
    capacity: usize,
}

impl<K: Clone + Debug> EventBus<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Queue size for subscribers created from now on.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
    }

    pub fn subscribe(&mut self) -> EventReceiver<K> {
        let (producer, consumer) = RingBuffer::new(self.capacity);
        self.subscribers.push(producer);
        EventReceiver { queue: consumer }
    }

    pub fn emit(&mut self, event: MixerEvent<K>) {
        trace_event(&event);

        self.subscribers.retain(|queue| !queue.is_abandoned());
        for queue in self.subscribers.iter_mut() {
            if queue.push(event.clone()).is_err() {
                tracing::warn!(?event, "event queue full, dropping event");
            }
        }
    }
}

fn trace_event<K: Debug>(event: &MixerEvent<K>) {
    match event {
        MixerEvent::Attached | MixerEvent::Detached | MixerEvent::Reset => {
            tracing::info!(?event, "mixer event")
        }
        MixerEvent::Error { key, cause } => {
            tracing::warn!(?key, %cause, "source failed")
        }
        MixerEvent::PlayerError { cause } => tracing::warn!(%cause, "player failed"),
        _ => tracing::debug!(?event, "mixer event"),
    }
}
