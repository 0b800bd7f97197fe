//! Mix audio files into raw PCM on stdout, paced in real time.
//!
//! Run with: cargo run --example mix_to_stdout -- a.mp3 b.ogg | ffplay -f s16le -ar 48000 -ch_layout stereo -
//!
//! Needs `ffmpeg` on PATH. Set `RUST_LOG=mischpult=debug` to watch sources
//! come and go on stderr.

use std::thread::sleep;
use std::time::Duration;

use mischpult::sinks::PacedWriter;
use mischpult::{Mixer, MixerEvent};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let inputs: Vec<String> = std::env::args().skip(1).collect();
    if inputs.is_empty() {
        eprintln!("usage: mix_to_stdout <input>...");
        return;
    }

    let mut mixer = Mixer::new();
    let mut events = mixer.subscribe();
    mixer
        .attach(PacedWriter::new(std::io::stdout()))
        .expect("stdout sink");

    // Stagger the inputs a little so overlaps are audible.
    let gain = 1.0 / inputs.len() as f64;
    for (i, input) in inputs.iter().enumerate() {
        if let Err(err) = mixer.play_sound(i, input, gain) {
            eprintln!("skipping {}: {}", input, err);
        }
        sleep(Duration::from_millis(500));
    }

    while !mixer.is_empty() {
        for event in events.drain() {
            match event {
                MixerEvent::End(i) => eprintln!("finished {}", inputs[i]),
                MixerEvent::Error { key, cause } => eprintln!("{} failed: {}", inputs[key], cause),
                _ => {}
            }
        }
        sleep(Duration::from_millis(100));
    }

    mixer.reset_all();
}
