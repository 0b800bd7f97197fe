//! Mixer session - attach/detach and playback control

use std::path::Path;
use std::sync::Mutex;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::decoders::{Decoder, FfmpegDecoder};
use crate::engine::{lock, Engine, SourceKey};
use crate::error::{MixerError, Result};
use crate::event::{EventReceiver, MixerEvent};
use crate::output::MixedStream;
use crate::sinks::{Connection, Player};
use crate::stream::PcmStream;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// A connection together with the player pulling the mix into it.
struct Attachment {
    _connection: Box<dyn Connection>,
    player: Box<dyn Player>,
}

/// The mixing engine: live sources keyed by `K`, mixed into one stream of
/// 20 ms frames for whichever connection is attached.
///
/// `Mixer` is the control side. It starts and stops sources, changes their
/// gain, and attaches the output to a [`Connection`]. The connection pulls
/// frames on its own schedule through a [`MixedStream`]; the mixer itself
/// has no clock.
///
/// # Example
///
/// ```no_run
/// use mischpult::{Mixer, sinks::PacedWriter};
///
/// let mut mixer = Mixer::new();
/// mixer.attach(PacedWriter::new(std::io::stdout()))?;
///
/// mixer.play_sound("music", "music.ogg", 0.6)?;
/// mixer.play_sound("door", "door.wav", 1.0)?;
///
/// mixer.set_volume(&"music", 0.3);
/// mixer.stop_sound(&"door");
/// # Ok::<(), mischpult::MixerError>(())
/// ```
///
/// # Teardown order
///
/// [`detach`](Self::detach) closes the output stream, stops the player and
/// drops the connection, but leaves sources registered; they stall on a
/// full buffer until the next [`attach`](Self::attach).
/// [`reset_all`](Self::reset_all) destroys every source first, then tears
/// down the output the same way.
pub struct Mixer<K> {
    engine: Arc<Mutex<Engine<K>>>,
    decoder: Box<dyn Decoder>,
    attachment: Option<Attachment>,
}

impl<K: SourceKey> Mixer<K> {
    /// Create a detached mixer decoding inputs with ffmpeg.
    pub fn new() -> Self {
        Self {
            engine: Arc::new(Mutex::new(Engine::new(DEFAULT_EVENT_CAPACITY))),
            decoder: Box::new(FfmpegDecoder::default()),
            attachment: None,
        }
    }

    /// Use `decoder` for [`play_sound`](Self::play_sound).
    pub fn with_decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Queue size of subscribers created after this call.
    pub fn with_event_capacity(self, capacity: usize) -> Self {
        lock(&self.engine).events.set_capacity(capacity);
        self
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> EventReceiver<K> {
        lock(&self.engine).events.subscribe()
    }

    /// Whether a connection is attached.
    pub fn is_attached(&self) -> bool {
        self.attachment.is_some()
    }

    /// Start playing the mix on `connection`.
    ///
    /// Does nothing if already attached.
    pub fn attach(&mut self, connection: impl Connection + 'static) -> Result<()> {
        if self.attachment.is_some() {
            tracing::debug!("already attached, ignoring attach");
            return Ok(());
        }

        let mut connection: Box<dyn Connection> = Box::new(connection);
        let generation = lock(&self.engine).open_output();
        let stream = MixedStream::new(self.engine.clone(), generation);

        // The engine lock must not be held here: a connection may start
        // pulling (and locking) before subscribe returns.
        let player = match connection.subscribe(stream) {
            Ok(player) => player,
            Err(err) => {
                lock(&self.engine).close_output();
                return Err(err);
            }
        };

        self.attachment = Some(Attachment {
            _connection: connection,
            player,
        });
        lock(&self.engine).events.emit(MixerEvent::Attached);
        Ok(())
    }

    /// Stop the player, close the output stream and drop the connection.
    /// Active sources are kept.
    pub fn detach(&mut self) {
        self.teardown_output();
        lock(&self.engine).events.emit(MixerEvent::Detached);
    }

    fn teardown_output(&mut self) {
        lock(&self.engine).close_output();
        if let Some(mut attachment) = self.attachment.take() {
            attachment.player.stop();
        }
    }

    /// Decode `input` and mix it in under `key` at `gain`.
    ///
    /// Returns as soon as the decoder is running. A source already playing
    /// under `key` is stopped and replaced. The source leaves the mix on its
    /// own when its stream ends ([`MixerEvent::End`]) or fails
    /// ([`MixerEvent::Error`]).
    pub fn play_sound(&mut self, key: K, input: impl AsRef<Path>, gain: f64) -> Result<()> {
        if !self.is_attached() {
            return Err(MixerError::NotAttached);
        }
        let stream = self.decoder.open(input.as_ref())?;
        self.insert(key, stream, gain);
        Ok(())
    }

    /// Mix in an already decoded stream under `key`. Same semantics as
    /// [`play_sound`](Self::play_sound) otherwise.
    pub fn play_stream(&mut self, key: K, stream: PcmStream, gain: f64) -> Result<()> {
        if !self.is_attached() {
            return Err(MixerError::NotAttached);
        }
        self.insert(key, stream, gain);
        Ok(())
    }

    fn insert(&mut self, key: K, stream: PcmStream, gain: f64) {
        let mut engine = lock(&self.engine);
        tracing::debug!(?key, stream = stream.name(), gain, "registering source");

        if let Some(previous) = engine.registry.register(key.clone(), stream, gain) {
            drop(previous);
            engine.events.emit(MixerEvent::Stop(key.clone()));
        }
        engine.events.emit(MixerEvent::Play(key));
    }

    /// Destroy the source under `key`. Returns `false` if there was none.
    pub fn stop_sound(&mut self, key: &K) -> bool {
        let mut engine = lock(&self.engine);
        match engine.registry.remove(key) {
            Some(source) => {
                drop(source);
                engine.events.emit(MixerEvent::Stop(key.clone()));
                true
            }
            None => false,
        }
    }

    /// Change the gain of `key`, effective from the next frame. Returns
    /// `false` if there is no such source.
    ///
    /// Gain is not bounded; negative values invert, values above 1
    /// amplify. Output samples are clamped either way.
    pub fn set_volume(&mut self, key: &K, gain: f64) -> bool {
        let mut engine = lock(&self.engine);
        let found = engine.registry.set_gain(key, gain);
        if found {
            engine.events.emit(MixerEvent::Volume {
                key: key.clone(),
                gain,
            });
        }
        found
    }

    /// Current gain of `key`, or `None` if it is not playing.
    pub fn volume(&self, key: &K) -> Option<f64> {
        lock(&self.engine).registry.gain(key)
    }

    /// Destroy every source, then stop the player, close the output stream
    /// and drop the connection. Safe to call in any state.
    pub fn reset_all(&mut self) {
        {
            let mut engine = lock(&self.engine);
            for (key, source) in engine.registry.clear() {
                drop(source);
                engine.events.emit(MixerEvent::Stop(key));
            }
        }
        self.teardown_output();
        lock(&self.engine).events.emit(MixerEvent::Reset);
    }

    /// Keys of all live sources, in no particular order.
    pub fn active_sources(&self) -> Vec<K> {
        lock(&self.engine).registry.keys().cloned().collect()
    }

    /// Number of live sources.
    pub fn len(&self) -> usize {
        lock(&self.engine).registry.len()
    }

    /// Whether no source is playing.
    pub fn is_empty(&self) -> bool {
        lock(&self.engine).registry.is_empty()
    }

    /// Frames produced since the mixer was created.
    pub fn frames_produced(&self) -> u64 {
        lock(&self.engine).frames_produced()
    }
}

impl<K: SourceKey> Default for Mixer<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for Mixer<K> {
    fn drop(&mut self) {
        lock(&self.engine).close_output();
        if let Some(mut attachment) = self.attachment.take() {
            attachment.player.stop();
        }
    }
}
