//! Source registry - the live sources of a mixer, keyed by caller id

use core::hash::Hash;

use alloc::vec::Vec;
use hashbrown::HashMap;

use crate::stream::PcmStream;

/// One live source: its decoded stream and its gain.
#[derive(Debug)]
pub struct Source {
    pub(crate) stream: PcmStream,
    pub(crate) gain: f64,
    /// Registration sequence number, for insertion-ordered iteration.
    order: u64,
}

impl Source {
    /// A source playing `stream` at `gain`.
    pub fn new(stream: PcmStream, gain: f64) -> Self {
        Self {
            stream,
            gain,
            order: 0,
        }
    }

    /// Linear gain applied to this source's samples.
    #[inline]
    pub fn gain(&self) -> f64 {
        self.gain
    }

    /// The decoded stream feeding this source.
    #[inline]
    pub fn stream(&self) -> &PcmStream {
        &self.stream
    }

    /// Give up the source, keeping its stream alive.
    pub fn into_stream(self) -> PcmStream {
        self.stream
    }
}

/// Mapping from a caller-chosen key to a live [`Source`].
///
/// Keys are unique. Iteration follows registration order; a source
/// registered again under a taken key counts as new and moves to the end.
/// None of the operations block.
#[derive(Debug)]
pub struct SourceRegistry<K> {
    sources: HashMap<K, Source>,
    next_order: u64,
}

impl<K: Eq + Hash> SourceRegistry<K> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            next_order: 0,
        }
    }

    /// Insert `stream` under `key`, returning whatever was registered there
    /// before. The caller decides what to do with the previous stream.
    pub fn register(&mut self, key: K, stream: PcmStream, gain: f64) -> Option<Source> {
        let mut source = Source::new(stream, gain);
        source.order = self.next_order;
        self.next_order += 1;
        self.sources.insert(key, source)
    }

    /// Remove the entry at `key`; `None` if there was none.
    pub fn remove(&mut self, key: &K) -> Option<Source> {
        self.sources.remove(key)
    }

    /// Update the gain of `key` in place. Returns `false` if absent.
    pub fn set_gain(&mut self, key: &K, gain: f64) -> bool {
        match self.sources.get_mut(key) {
            Some(source) => {
                source.gain = gain;
                true
            }
            None => false,
        }
    }

    /// Gain of `key`, or `None` if absent.
    pub fn gain(&self, key: &K) -> Option<f64> {
        self.sources.get(key).map(Source::gain)
    }

    /// Whether a source is registered under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.sources.contains_key(key)
    }

    /// Remove and return every entry, oldest first.
    pub fn clear(&mut self) -> Vec<(K, Source)> {
        let mut drained: Vec<(K, Source)> = self.sources.drain().collect();
        drained.sort_unstable_by_key(|(_, source)| source.order);
        drained
    }

    /// Keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        let mut keys: Vec<(&K, u64)> = self
            .sources
            .iter()
            .map(|(key, source)| (key, source.order))
            .collect();
        keys.sort_unstable_by_key(|&(_, order)| order);
        keys.into_iter().map(|(key, _)| key)
    }

    /// Entries in registration order, so mixing sums in a stable order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&K, &mut Source)> {
        let mut entries: Vec<(&K, &mut Source)> = self.sources.iter_mut().collect();
        entries.sort_unstable_by_key(|(_, source)| source.order);
        entries.into_iter()
    }

    /// Number of live sources.
    #[inline]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl<K: Eq + Hash> Default for SourceRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}
