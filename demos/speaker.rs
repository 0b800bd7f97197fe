//! Play audio files through the default output device.
//!
//! Run with: cargo run --example speaker --features cpal_sink -- a.mp3 b.wav
//!
//! While playing, type `<index> <gain>` to change a source's volume,
//! `stop <index>` to stop one, or an empty line to quit.

use std::io::{self, BufRead};

use mischpult::sinks::CpalSink;
use mischpult::Mixer;

fn main() {
    tracing_subscriber::fmt::init();

    let inputs: Vec<String> = std::env::args().skip(1).collect();

    let sink = CpalSink::default_output().expect("No default device");
    println!("Using: {}", sink.name());

    let mut mixer = Mixer::new();
    mixer.attach(sink).expect("failed to start playback");

    for (i, input) in inputs.iter().enumerate() {
        match mixer.play_sound(i, input, 0.8) {
            Ok(()) => println!("  [{}] {}", i, input),
            Err(err) => eprintln!("  [{}] {}: {}", i, input, err),
        }
    }

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        let words: Vec<&str> = line.split_whitespace().collect();

        match words.as_slice() {
            [] => break,
            ["stop", index] => {
                if let Ok(index) = index.parse() {
                    println!("stopped: {}", mixer.stop_sound(&index));
                }
            }
            [index, gain] => {
                if let (Ok(index), Ok(gain)) = (index.parse(), gain.parse()) {
                    println!("updated: {}", mixer.set_volume(&index, gain));
                }
            }
            _ => println!("?"),
        }

        if mixer.is_empty() {
            println!("nothing left to play");
            break;
        }
    }

    mixer.reset_all();
}
