//! Integration tests for the speaker lifecycle.
//!
//! Idle -> Started -> Stopping -> Idle, repeated, with the guarantees that
//! each start reopens the device and nothing from a stopped session leaks
//! into the next one.

mod common;

use std::time::Duration;

use common::*;

#[test]
fn test_restart_reopens_device_without_replay() {
    let sink = MemorySink::new().with_write_delay(Duration::from_millis(10));
    let mut speaker = Speaker::new(test_config(), sink.clone()).unwrap();

    speaker.start().unwrap();
    for n in 0..20 {
        speaker.play(labeled(&format!("old{n}"))).unwrap();
    }
    let first = speaker.stop().unwrap().unwrap();
    assert_eq!(first.exit, WorkerExit::Stopped);
    assert!(first.discarded > 0);
    assert_eq!(speaker.state(), SpeakerState::Idle);

    let played_before_restart = sink.writes().len();

    speaker.start().unwrap();
    speaker.play(labeled("new")).unwrap();
    speaker.finish().unwrap();

    let labels = written_labels(&sink);
    assert_eq!(labels.len(), played_before_restart + 1);
    assert_eq!(labels.last().map(String::as_str), Some("new"));
    assert_eq!(sink.opens(), 2);
    assert_eq!(sink.closes(), 2);

    // Open, writes, close, open, write, close
    let events = sink.events();
    assert!(matches!(events[0], SinkEvent::Open(_)));
    assert!(matches!(events[played_before_restart + 1], SinkEvent::Close));
    assert!(matches!(events[played_before_restart + 2], SinkEvent::Open(_)));
}

#[test]
fn test_double_stop_is_noop() {
    let sink = MemorySink::new();
    let mut speaker = Speaker::new(test_config(), sink.clone()).unwrap();

    speaker.start().unwrap();
    assert!(speaker.stop().unwrap().is_some());
    assert!(speaker.stop().unwrap().is_none());
    assert!(speaker.abort().unwrap().is_none());

    assert_eq!(sink.closes(), 1);
    assert_eq!(speaker.state(), SpeakerState::Idle);
}

#[test]
fn test_start_while_started_is_rejected() {
    let sink = MemorySink::new();
    let mut speaker = Speaker::new(test_config(), sink.clone()).unwrap();

    speaker.start().unwrap();
    assert!(matches!(speaker.start(), Err(SpeakerError::AlreadyStarted)));
    assert!(speaker.is_worker_alive());
    assert_eq!(sink.opens(), 1);

    speaker.stop().unwrap();
}

/// The worker dies on a write error. The speaker stops claiming to run,
/// refuses more audio, and the next start reaps the dead worker and
/// reopens the device.
#[test]
fn test_restart_after_worker_write_failure() {
    let sink = MemorySink::new();
    let mut speaker = Speaker::new(test_config(), FailingSink::new(sink.clone(), 1)).unwrap();

    speaker.start().unwrap();
    speaker.play(labeled("ok")).unwrap();
    speaker.play(labeled("fails")).unwrap();

    assert!(matches!(
        speaker.wait_until_drained(),
        Err(SpeakerError::NotDrained)
    ));
    assert!(!speaker.is_worker_alive());
    assert_eq!(speaker.state(), SpeakerState::Stopping);
    assert!(!speaker.is_started());
    assert!(!speaker.is_idle());
    assert!(matches!(
        speaker.play(labeled("lost")),
        Err(SpeakerError::WorkerExited)
    ));

    speaker.start().unwrap();
    assert_eq!(speaker.state(), SpeakerState::Started);
    assert_eq!(sink.opens(), 2);
    assert_eq!(sink.closes(), 1);

    speaker.play(labeled("again")).unwrap();
    let report = speaker.finish().unwrap().unwrap();
    assert_eq!(report.exit, WorkerExit::EndOfStream);
    assert_eq!(written_labels(&sink), vec!["ok", "again"]);
}

/// A worker that drained to the end-of-stream sentinel on its own does not
/// block the next start.
#[test]
fn test_restart_after_worker_drained() {
    let sink = MemorySink::new();
    let mut speaker = Speaker::new(test_config(), sink.clone()).unwrap();

    speaker.start().unwrap();
    speaker.play(labeled("first")).unwrap();
    speaker.queue().put_end();
    speaker.wait_until_drained().unwrap();
    assert!(wait_for(Duration::from_secs(2), || !speaker.is_worker_alive()));
    assert_eq!(speaker.state(), SpeakerState::Stopping);

    speaker.start().unwrap();
    speaker.play(labeled("second")).unwrap();
    speaker.finish().unwrap();

    assert_eq!(written_labels(&sink), vec!["first", "second"]);
    assert_eq!(sink.opens(), 2);
    assert_eq!(sink.closes(), 2);
}

#[test]
fn test_play_while_idle_plays_after_start() {
    let sink = MemorySink::new();
    let mut speaker = Speaker::new(test_config(), sink.clone()).unwrap();

    speaker.play(labeled("early")).unwrap();
    assert!(sink.writes().is_empty());

    speaker.start().unwrap();
    speaker.play(labeled("late")).unwrap();
    speaker.finish().unwrap();

    assert_eq!(written_labels(&sink), vec!["early", "late"]);
}

#[test]
fn test_is_idle_tracks_queue() {
    let sink = MemorySink::new().with_write_delay(Duration::from_millis(30));
    let mut speaker = Speaker::new(test_config(), sink.clone()).unwrap();
    assert!(!speaker.is_idle());

    speaker.start().unwrap();
    for n in 0..3 {
        speaker.play(labeled(&n.to_string())).unwrap();
    }
    assert!(!speaker.is_idle());

    assert!(wait_for(Duration::from_secs(2), || speaker.is_idle()));
    speaker.finish().unwrap();
    assert!(!speaker.is_idle());
}

#[test]
fn test_cancelled_session_returns_to_idle() {
    let sink = MemorySink::new().with_write_delay(Duration::from_millis(10));
    let mut speaker = Speaker::new(test_config(), sink.clone()).unwrap();
    let mut synth = StubSynth::new();

    let session = Session::new(&mut speaker);
    let canceller = session.canceller();
    let source = ScriptedSource::new((0..50).map(|n| n.to_string()))
        .with_pause(Duration::from_millis(5), Duration::from_millis(5));

    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(60));
        canceller.stop();
    });

    let result = session.speak(&mut synth, source);
    handle.join().unwrap();

    assert!(matches!(result, Err(SpeakerError::Cancelled)));
    assert_eq!(synth.flushes, 0);
    assert_eq!(speaker.state(), SpeakerState::Idle);
    assert!(!speaker.is_worker_alive());
    assert!(speaker.queue().is_empty());
    assert_eq!(sink.closes(), 1);
    assert!(written_labels(&sink).len() < 100);
}

#[tokio::test]
async fn test_session_on_blocking_thread() {
    let sink = MemorySink::new();
    let device_log = sink.clone();

    let report = tokio::task::spawn_blocking(move || {
        let mut speaker = Speaker::new(test_config(), sink).unwrap();
        let mut synth = StubSynth::new();
        let spoken = Session::new(&mut speaker).speak(&mut synth, ScriptedSource::new(["async"]));
        spoken
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.bridge.fragments, 1);
    assert_eq!(written_labels(&device_log), vec!["async.0", "async.1", "flush"]);
}
