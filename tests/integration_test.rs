use std::io::{Read, Write};
use std::thread::sleep;
use std::time::{Duration, Instant};

use mischpult::decoders::{FfmpegDecoder, RawPcmDecoder};
use mischpult::sinks::{Loopback, LoopbackTap};
use mischpult::{
    pcm_channel, DecodeError, Frame, MixedStream, Mixer, MixerError, MixerEvent, PcmWriter,
    FRAME_SAMPLES, FRAME_SIZE,
};

fn constant(sample: i16, samples: usize) -> Vec<u8> {
    sample.to_le_bytes().repeat(samples)
}

fn attached() -> (Mixer<&'static str>, LoopbackTap) {
    let (connection, tap) = Loopback::new();
    let mut mixer = Mixer::new().with_decoder(RawPcmDecoder::new());
    mixer.attach(connection).unwrap();
    (mixer, tap)
}

/// Register an in-memory source holding `frames` frames of `sample`.
fn play_constant(
    mixer: &mut Mixer<&'static str>,
    key: &'static str,
    sample: i16,
    frames: usize,
    gain: f64,
) -> PcmWriter {
    let (mut writer, stream) = pcm_channel(key, FRAME_SIZE * (frames + 1));
    writer.write_all(&constant(sample, FRAME_SAMPLES * frames)).unwrap();
    mixer.play_stream(key, stream, gain).unwrap();
    writer
}

fn assert_all(frame: &Frame, expected: i16) {
    assert_eq!(frame.len(), FRAME_SIZE);
    assert!(
        frame.samples().all(|s| s == expected),
        "expected every sample to be {}",
        expected
    );
}

/// Pull until `done` holds or give up after two seconds (decoders run on
/// their own threads).
fn pull_until(tap: &LoopbackTap, mut done: impl FnMut(&Frame) -> bool) -> Option<Frame> {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let frame = tap.pull()?;
        if done(&frame) {
            return Some(frame);
        }
        sleep(Duration::from_millis(1));
    }
    None
}

#[test]
fn play_requires_attachment() {
    let mut mixer: Mixer<&str> = Mixer::new();
    let (_writer, stream) = pcm_channel("a", FRAME_SIZE);

    assert!(matches!(
        mixer.play_stream("a", stream, 1.0),
        Err(MixerError::NotAttached)
    ));
    assert!(matches!(
        mixer.play_sound("a", "whatever.mp3", 1.0),
        Err(MixerError::NotAttached)
    ));
}

#[test]
fn idle_mixer_pulls_silence() {
    let (mixer, tap) = attached();

    assert_eq!(tap.pull(), Some(Frame::silence()));
    assert_eq!(tap.pull(), Some(Frame::silence()));
    assert_eq!(mixer.frames_produced(), 2);
}

#[test]
fn two_sources_sum_without_clamping() {
    let (mut mixer, tap) = attached();
    let _a = play_constant(&mut mixer, "A", 10_000, 1, 1.0);
    let _b = play_constant(&mut mixer, "B", 10_000, 1, 1.0);

    assert_all(&tap.pull().unwrap(), 20_000);
}

#[test]
fn hot_mix_clamps_to_i16_max() {
    let (mut mixer, tap) = attached();
    let _a = play_constant(&mut mixer, "A", 10_000, 1, 1.0);
    let _c = play_constant(&mut mixer, "C", 30_000, 1, 1.0);

    assert_all(&tap.pull().unwrap(), i16::MAX);
}

#[test]
fn stalled_source_keeps_output_flowing() {
    let (mut mixer, tap) = attached();
    let _ready = play_constant(&mut mixer, "ready", 1_200, 2, 1.0);
    let (mut slow, stream) = pcm_channel("slow", FRAME_SIZE * 2);
    slow.write_all(&constant(9_000, 100)).unwrap();
    mixer.play_stream("slow", stream, 1.0).unwrap();

    assert_all(&tap.pull().unwrap(), 1_200);
    assert_eq!(mixer.len(), 2);

    // Once the rest arrives it joins the mix.
    slow.write_all(&constant(9_000, FRAME_SAMPLES - 100)).unwrap();
    assert_all(&tap.pull().unwrap(), 10_200);
}

#[test]
fn stop_sound_reports_presence() {
    let (mut mixer, tap) = attached();
    let mut events = mixer.subscribe();
    let _a = play_constant(&mut mixer, "A", 500, 3, 1.0);

    assert!(mixer.stop_sound(&"A"));
    assert!(!mixer.stop_sound(&"A"));
    assert!(!mixer.stop_sound(&"never"));
    assert!(tap.pull().unwrap().is_silent());

    let seen: Vec<_> = events.drain().collect();
    assert_eq!(seen, [MixerEvent::Play("A"), MixerEvent::Stop("A")]);
}

#[test]
fn stopped_stream_closes_its_writer() {
    let (mut mixer, _tap) = attached();
    let writer = play_constant(&mut mixer, "A", 1, 1, 1.0);

    mixer.stop_sound(&"A");
    assert!(writer.is_closed());
}

#[test]
fn set_volume_applies_on_next_tick() {
    let (mut mixer, tap) = attached();
    let _a = play_constant(&mut mixer, "A", 8_000, 2, 1.0);

    assert!(!mixer.set_volume(&"missing", 0.5));
    assert!(mixer.set_volume(&"A", 0.5));
    assert_eq!(mixer.volume(&"A"), Some(0.5));

    assert_all(&tap.pull().unwrap(), 4_000);
}

#[test]
fn negative_gain_inverts() {
    let (mut mixer, tap) = attached();
    let _a = play_constant(&mut mixer, "A", 3_000, 1, -2.0);

    assert_all(&tap.pull().unwrap(), -6_000);
}

#[test]
fn duplicate_key_replaces_previous_source() {
    let (mut mixer, tap) = attached();
    let mut events = mixer.subscribe();
    let first = play_constant(&mut mixer, "A", 1_000, 1, 1.0);
    let _second = play_constant(&mut mixer, "A", 2_000, 1, 1.0);

    assert_eq!(mixer.active_sources(), ["A"]);
    assert!(first.is_closed());
    assert_all(&tap.pull().unwrap(), 2_000);

    let seen: Vec<_> = events.drain().collect();
    assert_eq!(
        seen,
        [
            MixerEvent::Play("A"),
            MixerEvent::Stop("A"),
            MixerEvent::Play("A")
        ]
    );
}

#[test]
fn ended_stream_drains_tail_then_leaves() {
    let (mut mixer, tap) = attached();
    let mut events = mixer.subscribe();
    let (mut writer, stream) = pcm_channel("A", FRAME_SIZE * 2);
    writer.write_all(&constant(700, FRAME_SAMPLES + 4)).unwrap();
    writer.finish();
    mixer.play_stream("A", stream, 1.0).unwrap();

    assert_all(&tap.pull().unwrap(), 700);

    let tail = tap.pull().unwrap();
    let samples: Vec<i16> = tail.samples().collect();
    assert_eq!(samples[..4], [700; 4]);
    assert!(samples[4..].iter().all(|&s| s == 0));

    assert!(tap.pull().unwrap().is_silent());
    assert!(mixer.is_empty());
    assert!(events.drain().any(|e| e == MixerEvent::End("A")));
}

#[test]
fn failing_source_is_isolated() {
    let (mut mixer, tap) = attached();
    let mut events = mixer.subscribe();
    let _good = play_constant(&mut mixer, "good", 2_500, 3, 1.0);
    let bad = play_constant(&mut mixer, "bad", 100, 3, 1.0);
    bad.fail(DecodeError::new("corrupt packet"));

    assert_all(&tap.pull().unwrap(), 2_500);
    assert_all(&tap.pull().unwrap(), 2_500);
    assert_eq!(mixer.active_sources(), ["good"]);

    let seen: Vec<_> = events.drain().collect();
    assert!(seen.contains(&MixerEvent::Error {
        key: "bad",
        cause: DecodeError::new("corrupt packet"),
    }));
}

#[test]
fn reset_all_clears_everything() {
    let (mut mixer, tap) = attached();
    let mut events = mixer.subscribe();
    let _a = play_constant(&mut mixer, "A", 1_000, 2, 1.0);
    let _b = play_constant(&mut mixer, "B", 1_000, 2, 1.0);

    mixer.reset_all();

    assert!(mixer.is_empty());
    assert!(!mixer.is_attached());
    assert!(!tap.is_playing());
    assert_eq!(tap.pull(), None);

    let seen: Vec<_> = events.drain().collect();
    assert_eq!(seen.last(), Some(&MixerEvent::Reset));
    assert_eq!(
        seen.iter().filter(|e| matches!(e, MixerEvent::Stop(_))).count(),
        2
    );

    // Resetting an empty, detached mixer is fine too.
    mixer.reset_all();
}

#[test]
fn reattach_after_reset_pulls_silence() {
    let (mut mixer, _tap) = attached();
    let _a = play_constant(&mut mixer, "A", 1_000, 2, 1.0);
    mixer.reset_all();

    let (connection, tap) = Loopback::new();
    mixer.attach(connection).unwrap();
    assert_eq!(tap.pull(), Some(Frame::silence()));
}

#[test]
fn attach_is_idempotent() {
    let (mut mixer, tap) = attached();
    let mut events = mixer.subscribe();
    let (second, second_tap) = Loopback::new();

    mixer.attach(second).unwrap();

    assert!(tap.is_playing());
    assert!(!second_tap.is_playing());
    assert!(events.drain().next().is_none());
}

#[test]
fn detach_ends_output_but_keeps_sources() {
    let (mut mixer, tap) = attached();
    let _a = play_constant(&mut mixer, "A", 1_000, 2, 1.0);
    let mut events = mixer.subscribe();

    mixer.detach();

    assert_eq!(tap.pull(), None);
    assert_eq!(mixer.active_sources(), ["A"]);
    assert_eq!(events.try_recv(), Some(MixerEvent::Detached));

    let (connection, tap) = Loopback::new();
    mixer.attach(connection).unwrap();
    assert_all(&tap.pull().unwrap(), 1_000);
    assert_eq!(events.try_recv(), Some(MixerEvent::Attached));
}

#[derive(Default)]
struct Capture {
    stream: Option<MixedStream>,
}

struct NoopPlayer;

impl mischpult::sinks::Player for NoopPlayer {
    fn stop(&mut self) {}
}

#[test]
fn stale_stream_ends_after_detach() {
    use std::sync::{Arc, Mutex};

    struct Grab(Arc<Mutex<Capture>>);
    impl mischpult::sinks::Connection for Grab {
        fn subscribe(
            &mut self,
            stream: MixedStream,
        ) -> mischpult::Result<Box<dyn mischpult::sinks::Player>> {
            self.0.lock().unwrap().stream = Some(stream);
            Ok(Box::new(NoopPlayer))
        }
    }

    let capture = Arc::new(Mutex::new(Capture::default()));
    let mut mixer: Mixer<u32> = Mixer::new();
    mixer.attach(Grab(capture.clone())).unwrap();
    let mut stream = capture.lock().unwrap().stream.take().unwrap();

    let mut bytes = vec![0u8; FRAME_SIZE + 10];
    stream.read_exact(&mut bytes).unwrap();

    mixer.detach();
    // The rest of the frame that was already produced, then EOF.
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert_eq!(rest.len(), FRAME_SIZE - 10);
    assert!(stream.next_frame().is_none());
}

#[test]
fn raw_decoder_plays_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&constant(1_500, FRAME_SAMPLES * 3)).unwrap();
    file.flush().unwrap();

    let (mut mixer, tap) = attached();
    let mut events = mixer.subscribe();
    mixer.play_sound("clip", file.path(), 2.0).unwrap();

    let frame = pull_until(&tap, |f| !f.is_silent()).expect("clip never started");
    assert_all(&frame, 3_000);

    pull_until(&tap, |_| mixer.is_empty()).expect("clip never ended");
    assert!(events.drain().any(|e| e == MixerEvent::End("clip")));
}

#[test]
fn missing_file_is_unavailable() {
    let (mut mixer, _tap) = attached();

    let err = mixer
        .play_sound("ghost", "/no/such/file.pcm", 1.0)
        .unwrap_err();
    assert!(matches!(err, MixerError::SourceUnavailable { .. }));
    assert!(mixer.is_empty());
}

#[test]
fn missing_decoder_binary_is_unavailable() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let (connection, _tap) = Loopback::new();
    let mut mixer = Mixer::new()
        .with_decoder(FfmpegDecoder::new().with_program("/nonexistent/bin/ffmpeg"));
    mixer.attach(connection).unwrap();

    let err = mixer.play_sound("x", file.path(), 1.0).unwrap_err();
    assert!(matches!(err, MixerError::SourceUnavailable { .. }));
}

/// Attach a mixer decoding through `program` and play an empty input file
/// under "x", returning everything the source reported once it left.
#[cfg(unix)]
fn run_decoder(program: &str) -> Vec<MixerEvent<&'static str>> {
    let input = tempfile::NamedTempFile::new().unwrap();
    let (connection, tap) = Loopback::new();
    let mut mixer = Mixer::new().with_decoder(FfmpegDecoder::new().with_program(program));
    mixer.attach(connection).unwrap();
    let mut events = mixer.subscribe();

    mixer.play_sound("x", input.path(), 1.0).unwrap();
    pull_until(&tap, |_| mixer.is_empty()).expect("decoder never finished");
    events.drain().collect()
}

#[cfg(unix)]
#[test]
fn clean_decoder_exit_ends_source() {
    let seen = run_decoder("true");
    assert_eq!(seen, [MixerEvent::Play("x"), MixerEvent::End("x")]);
}

#[cfg(unix)]
#[test]
fn failing_decoder_exit_is_a_source_error() {
    let seen = run_decoder("false");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], MixerEvent::Play("x"));
    match &seen[1] {
        MixerEvent::Error { key, cause } => {
            assert_eq!(*key, "x");
            assert!(cause.reason().contains("exit status"), "{}", cause);
        }
        other => panic!("expected an error event, got {:?}", other),
    }
}

#[cfg(unix)]
#[test]
fn stopping_a_source_kills_and_reaps_its_decoder() {
    use std::os::unix::fs::PermissionsExt;
    use std::process::Command;

    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("pid");
    let script = dir.path().join("fake-ffmpeg");
    std::fs::write(
        &script,
        format!("#!/bin/sh\necho $$ > {}\nexec sleep 30\n", pid_file.display()),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    let input = tempfile::NamedTempFile::new().unwrap();

    let (connection, _tap) = Loopback::new();
    let mut mixer = Mixer::new().with_decoder(FfmpegDecoder::new().with_program(&script));
    mixer.attach(connection).unwrap();

    // Exec of a just-written script can briefly fail with ETXTBSY while
    // other test threads fork.
    let mut attempts = 0;
    while let Err(err) = mixer.play_sound("x", input.path(), 1.0) {
        attempts += 1;
        assert!(attempts < 20, "{}", err);
        sleep(Duration::from_millis(20));
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    let pid = loop {
        if let Ok(pid) = std::fs::read_to_string(&pid_file) {
            if pid.ends_with('\n') {
                break pid.trim().to_string();
            }
        }
        assert!(Instant::now() < deadline, "decoder never started");
        sleep(Duration::from_millis(5));
    };

    // `kill -0` succeeds for live and zombie processes alike, so it only
    // fails once the child was killed and reaped.
    let exists = |pid: &str| {
        Command::new("kill")
            .args(["-0", pid])
            .stderr(std::process::Stdio::null())
            .status()
            .unwrap()
            .success()
    };
    assert!(exists(&pid));

    assert!(mixer.stop_sound(&"x"));

    let deadline = Instant::now() + Duration::from_secs(5);
    while exists(&pid) {
        assert!(Instant::now() < deadline, "decoder {} still around", pid);
        sleep(Duration::from_millis(10));
    }
}

#[test]
fn active_sources_follow_play_order() {
    let (mut mixer, _tap) = attached();
    let _c = play_constant(&mut mixer, "C", 1, 1, 1.0);
    let _a = play_constant(&mut mixer, "A", 1, 1, 1.0);
    let _b = play_constant(&mut mixer, "B", 1, 1, 1.0);
    let _d = play_constant(&mut mixer, "D", 1, 1, 1.0);

    assert_eq!(mixer.active_sources(), ["C", "A", "B", "D"]);
}

#[test]
fn fractional_gains_match_exact_arithmetic() {
    let (mut mixer, tap) = attached();
    let _a = play_constant(&mut mixer, "A", -31_200, 1, 0.13);

    assert_all(&tap.pull().unwrap(), -4_056);
}
