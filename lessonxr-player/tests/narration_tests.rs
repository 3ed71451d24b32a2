//! Integration tests for narration sequencing
//!
//! Audio events are sent by hand through FakeAudio and reach the controller
//! through the player's event pump, as they would from a real resource.

mod helpers;

use helpers::*;
use lessonxr_common::events::{NarrationSection, NarrationState, PlayerEvent};
use lessonxr_player::narration::AudioEventKind;
use lessonxr_player::Error;

async fn current_index(t: &TestPlayer) -> Option<usize> {
    t.player.narration().snapshot().await.current_index
}

async fn wait_for_index(t: &TestPlayer, index: usize) -> bool {
    wait_until(|| async { current_index(t).await == Some(index) && t.audio.current_token().is_some() })
        .await
}

#[tokio::test]
async fn test_segments_auto_advance_and_skip_on_last_is_noop() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let narration = t.player.narration();

    narration.play().await.unwrap();
    let snapshot = narration.snapshot().await;
    assert_eq!(snapshot.state, NarrationState::Playing);
    assert_eq!(snapshot.current_index, Some(0));
    assert_eq!(snapshot.segments[0].section, NarrationSection::Intro);

    t.audio.finish_current().unwrap();
    assert!(wait_until(|| async { current_index(&t).await == Some(1) }).await);

    t.audio.finish_current().unwrap();
    assert!(wait_until(|| async { current_index(&t).await == Some(2) }).await);
    assert_eq!(
        t.audio.sources(),
        vec!["audio/intro.mp3", "audio/explanation.mp3", "audio/outro.mp3"]
    );

    // Outro is last: skipping changes nothing
    let token = t.audio.current_token();
    assert!(!narration.skip_to_next().await);
    let snapshot = narration.snapshot().await;
    assert_eq!(snapshot.current_index, Some(2));
    assert_eq!(snapshot.state, NarrationState::Playing);
    assert_eq!(t.audio.current_token(), token);
    assert_eq!(t.audio.sources().len(), 3);

    t.player.unmount().await;
}

#[tokio::test]
async fn test_last_segment_end_stops_and_reports_finished() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let mut rx = t.player.subscribe();
    let narration = t.player.narration();

    narration.play().await.unwrap();
    for index in 1..3 {
        t.audio.finish_current().unwrap();
        assert!(wait_for_index(&t, index).await);
    }
    t.audio.finish_current().unwrap();

    assert!(
        wait_until(|| async { narration.snapshot().await.state == NarrationState::Stopped }).await
    );

    let mut started = Vec::new();
    let mut finished = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            PlayerEvent::NarrationSegmentStarted { section, total, .. } => {
                assert_eq!(total, 3);
                started.push(section);
            }
            PlayerEvent::NarrationFinished { .. } => finished = true,
            _ => {}
        }
    }
    assert_eq!(started, NarrationSection::ORDER.to_vec());
    assert!(finished);

    // Finished narration is rewound the same way stop() rewinds it
    assert_eq!(current_index(&t).await, Some(0));
    narration.play().await.unwrap();
    assert_eq!(current_index(&t).await, Some(0));
    assert_eq!(t.audio.sources().last().map(String::as_str), Some("audio/intro.mp3"));

    t.player.unmount().await;
}

#[tokio::test]
async fn test_events_from_superseded_source_are_ignored() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let narration = t.player.narration();

    narration.play().await.unwrap();
    let intro_token = t.audio.current_token().unwrap();
    assert!(narration.skip_to_next().await);
    assert_eq!(current_index(&t).await, Some(1));

    // A late "ended" from the intro source must not advance past explanation
    t.audio.send(intro_token, AudioEventKind::Ended);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(current_index(&t).await, Some(1));
    assert_eq!(narration.snapshot().await.state, NarrationState::Playing);

    t.player.unmount().await;
}

#[tokio::test]
async fn test_caption_only_segment_holds_until_skipped() {
    let mut record = full_record();
    if let Some(narration) = record.topic.as_mut().and_then(|t| t.narration.as_mut()) {
        narration.explanation = Some(entry(None, Some("Read along: four chambers.")));
    }
    let t = TestPlayer::builder().record(record).build();
    t.player.mount(Some(ids())).await.unwrap();
    let narration = t.player.narration();

    narration.play().await.unwrap();
    t.audio.finish_current().unwrap();
    assert!(wait_until(|| async { current_index(&t).await == Some(1) }).await);

    let snapshot = narration.snapshot().await;
    assert_eq!(snapshot.state, NarrationState::Playing);
    assert_eq!(snapshot.segments[1].text, "Read along: four chambers.");
    assert!(snapshot.segments[1].audio_ref.is_none());
    assert!(t.audio.current_token().is_none());
    assert_eq!(t.audio.sources(), vec!["audio/intro.mp3"]);

    assert!(narration.skip_to_next().await);
    assert_eq!(current_index(&t).await, Some(2));
    assert_eq!(t.audio.sources(), vec!["audio/intro.mp3", "audio/outro.mp3"]);

    t.player.unmount().await;
}

#[tokio::test]
async fn test_audio_error_moves_to_next_segment() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let narration = t.player.narration();

    narration.play().await.unwrap();
    t.audio.fail_current("decoder crashed").unwrap();

    assert!(wait_until(|| async { current_index(&t).await == Some(1) }).await);
    let snapshot = narration.snapshot().await;
    assert!(!snapshot.segments[0].loaded);
    assert_eq!(snapshot.state, NarrationState::Playing);

    t.player.unmount().await;
}

#[tokio::test]
async fn test_pause_resume_and_stop_rewinds() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    let narration = t.player.narration();

    narration.play().await.unwrap();
    assert!(narration.skip_to_next().await);

    narration.pause().await.unwrap();
    assert_eq!(narration.snapshot().await.state, NarrationState::Paused);
    narration.play().await.unwrap();
    let snapshot = narration.snapshot().await;
    assert_eq!(snapshot.state, NarrationState::Playing);
    assert_eq!(snapshot.current_index, Some(1));

    narration.stop().await;
    let snapshot = narration.snapshot().await;
    assert_eq!(snapshot.state, NarrationState::Stopped);
    assert_eq!(snapshot.current_index, Some(0));
    assert!(t.audio.current_token().is_none());

    t.player.unmount().await;
}

#[tokio::test]
async fn test_play_without_narration_is_invalid_state() {
    let t = TestPlayer::builder()
        .record(environment_only("env/classroom.jpg"))
        .build();
    t.player.mount(Some(ids())).await.unwrap();

    let result = t.player.narration().play().await;

    assert!(matches!(result, Err(Error::InvalidState(_))));
    let snapshot = t.player.narration().snapshot().await;
    assert_eq!(snapshot.current_index, None);
    assert!(!t.player.narration().skip_to_next().await);

    t.player.unmount().await;
}

#[tokio::test]
async fn test_autoplay_starts_first_segment() {
    let settings = lessonxr_player::config::PlayerSettings {
        narration_autoplay: true,
        ..Default::default()
    };
    let t = TestPlayer::builder().settings(settings).build();

    t.player.mount(Some(ids())).await.unwrap();

    let snapshot = t.player.narration().snapshot().await;
    assert_eq!(snapshot.state, NarrationState::Playing);
    assert_eq!(snapshot.current_index, Some(0));
    assert_eq!(t.audio.sources(), vec!["audio/intro.mp3"]);

    t.player.unmount().await;
}

#[tokio::test]
async fn test_unmount_stops_narration() {
    let t = TestPlayer::builder().build();
    t.player.mount(Some(ids())).await.unwrap();
    t.player.narration().play().await.unwrap();

    t.player.unmount().await;

    assert_eq!(
        t.player.narration().snapshot().await.state,
        NarrationState::Stopped
    );
    assert!(t.audio.current_token().is_none());
}
