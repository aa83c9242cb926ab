//! Session notifications flowing through the status reporter.

mod common;

use bridge_traits::SessionEvent;
use common::{eventually, track, tracks, Harness, SessionCommand};
use core_playback::{FailureReason, LoadOutcome, PlaybackState, PlaybackStatus, RepeatMode};
use core_runtime::events::{CoreEvent, PlaybackEvent};
use std::time::Duration;

#[tokio::test]
async fn repeat_one_replays_without_reacquiring() {
    let h = Harness::new();
    h.transport.set_queue(vec![track("a")], 0).await.unwrap();
    h.transport.cycle_repeat();
    assert_eq!(h.transport.cycle_repeat(), RepeatMode::One);

    assert!(h.backend.tick(179.0, 180.0, true));
    h.wait_for_status(|s| s.position_seconds == 179.0).await;
    h.backend.clear_commands();

    assert!(h.backend.finish().await);
    h.wait_for_status(|s| s.position_seconds == 0.0 && s.is_playing)
        .await;

    assert_eq!(
        h.backend.commands(),
        vec![SessionCommand::Seek(Duration::ZERO), SessionCommand::Play]
    );
    assert_eq!(h.backend.acquisitions(), 1);
    assert_eq!(h.transport.current_index(), Some(0));
    assert_eq!(h.status().state, PlaybackState::Playing);
}

#[tokio::test]
async fn completion_advances_queue() {
    let h = Harness::new();
    h.transport.set_queue(tracks(&["a", "b"]), 0).await.unwrap();

    assert!(h.backend.finish().await);
    eventually(|| h.backend.acquisitions() == 2).await;
    h.wait_for_status(|s| s.state == PlaybackState::Playing).await;

    assert_eq!(h.transport.current_index(), Some(1));
    assert_eq!(h.transport.current_track().unwrap().id, "b");
    assert_eq!(h.backend.live(), 1);
}

#[tokio::test]
async fn completion_with_repeat_all_wraps() {
    let h = Harness::new();
    h.transport.set_queue(tracks(&["a", "b"]), 1).await.unwrap();
    h.transport.cycle_repeat();

    assert!(h.backend.finish().await);
    eventually(|| h.backend.acquisitions() == 2).await;

    assert_eq!(h.transport.current_index(), Some(0));
    assert_eq!(h.transport.current_track().unwrap().id, "a");
}

#[tokio::test]
async fn completion_at_end_of_queue_settles_paused() {
    let h = Harness::new();
    h.transport.set_queue(vec![track("a")], 0).await.unwrap();

    assert!(h.backend.tick(178.5, 180.0, true));
    assert!(h.backend.finish().await);

    let status = h
        .wait_for_status(|s| s.state == PlaybackState::Paused)
        .await;
    assert_eq!(status.position_seconds, 180.0);
    assert!(!status.is_playing);
    assert_eq!(h.transport.current_index(), Some(0));
    assert_eq!(h.backend.acquisitions(), 1);
    assert_eq!(h.backend.live(), 1);
}

#[tokio::test]
async fn ticks_are_clamped_and_announced() {
    let h = Harness::new();
    let mut rx = h.events.subscribe();
    h.transport.set_queue(vec![track("a")], 0).await.unwrap();

    assert!(h.backend.tick(500.0, 180.0, true));
    let status = h
        .wait_for_status(|s| s.position_seconds == 180.0)
        .await;
    assert_eq!(status.duration_seconds, 180.0);

    let position = loop {
        match rx.recv().await.unwrap() {
            CoreEvent::Playback(PlaybackEvent::PositionChanged {
                track_id,
                position_ms,
                duration_ms,
            }) => break (track_id, position_ms, duration_ms),
            _ => continue,
        }
    };
    assert_eq!(position, ("a".to_string(), 180_000, 180_000));
}

#[tokio::test]
async fn stale_session_notifications_are_ignored() {
    let h = Harness::new();
    h.transport.set_queue(tracks(&["a", "b", "c"]), 0).await.unwrap();
    let stale = h.backend.sink(0);
    h.transport.next().await.unwrap();

    assert!(stale.notify(SessionEvent::Status {
        position: Duration::from_secs(50),
        duration: Some(Duration::from_secs(180)),
        is_playing: true,
    }));
    assert!(h.backend.tick(7.0, 180.0, true));
    h.wait_for_status(|s| s.position_seconds == 7.0).await;

    assert!(stale.deliver(SessionEvent::Finished).await);
    assert!(
        stale
            .deliver(SessionEvent::Failed {
                message: "gone".into()
            })
            .await
    );
    assert!(h.backend.tick(8.0, 180.0, true));
    h.wait_for_status(|s| s.position_seconds == 8.0).await;

    assert_eq!(h.transport.current_index(), Some(1));
    assert_eq!(h.backend.acquisitions(), 2);
    assert_eq!(h.status().state, PlaybackState::Playing);
}

#[tokio::test]
async fn stream_failure_interrupts_playback() {
    let h = Harness::new();
    let mut rx = h.events.subscribe();
    h.transport.set_queue(tracks(&["a", "b"]), 0).await.unwrap();

    assert!(h.backend.break_stream("decoder crashed").await);
    let status = h
        .wait_for_status(|s| matches!(s.state, PlaybackState::Error(_)))
        .await;

    assert_eq!(
        status.state,
        PlaybackState::Error(FailureReason::StreamInterrupted)
    );
    assert!(!status.is_playing);
    assert_eq!(h.backend.live(), 0);
    assert_eq!(h.transport.current_index(), Some(0));

    let (reason, message) = loop {
        if let CoreEvent::Playback(PlaybackEvent::Error {
            reason, message, ..
        }) = rx.recv().await.unwrap()
        {
            break (reason, message);
        }
    };
    assert_eq!(reason, "stream_interrupted");
    assert_eq!(message, "decoder crashed");

    // The user can start again from the same entry.
    h.transport.skip_to(0).await.unwrap();
    assert_eq!(h.status().state, PlaybackState::Playing);
    assert_eq!(h.backend.live(), 1);
}

#[tokio::test]
async fn completion_decided_before_stop_does_not_reload() {
    let h = Harness::new();
    h.transport.set_queue(tracks(&["a", "b"]), 0).await.unwrap();
    let session = h.backend.requests()[0].session;
    let epoch = h.transport.engine().completion_epoch(session).unwrap();

    h.transport.stop().await;
    assert_eq!(h.transport.engine().completion_epoch(session), None);

    let outcome = h.transport.advance_after_completion(epoch).await.unwrap();
    assert_eq!(outcome, Some(LoadOutcome::Superseded));
    assert_eq!(h.backend.live(), 0);
    assert_eq!(h.backend.acquisitions(), 1);
    assert_eq!(h.transport.current_index(), Some(0));
    assert_eq!(h.status(), PlaybackStatus::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_racing_completion_leaves_nothing_live() {
    for _ in 0..20 {
        let h = Harness::new();
        h.transport.set_queue(tracks(&["a", "b"]), 0).await.unwrap();

        assert!(h.backend.finish().await);
        h.transport.stop().await;

        // Any advance still in flight must observe the stop.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.backend.live(), 0);
        assert_eq!(h.status(), PlaybackStatus::default());
    }
}
