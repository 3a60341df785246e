//! End-to-end transport tests: a real `SpeechPlayer` engine driven against a
//! scripted synthesizer and a recording output.
//!
//! Every synthesis call parks until the test answers it, so completion order
//! is chosen by the test. Assertions synchronise on playback events, which
//! are only sent after the state they describe has been published.

use agrispeak::audio::output::{MockOutput, OutputEvent};
use agrispeak::chunker::ChunkerConfig;
use agrispeak::error::ErrorKind;
use agrispeak::player::controller::{PlayerConfig, SpeechPlayer};
use agrispeak::player::state::{PlaybackEvent, SpeechPreferences};
use agrispeak::synth::scripted::{PendingSynthesis, ScriptedSynthesizer, SynthesisQueue};
use agrispeak::synth::voice::Language;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(5);

fn spawn_player(output: MockOutput) -> (SpeechPlayer, SynthesisQueue) {
    let (synth, queue) = ScriptedSynthesizer::new();
    let config = PlayerConfig {
        chunker: ChunkerConfig { min_chunk_chars: 1 },
        ..PlayerConfig::default()
    };
    let player = SpeechPlayer::spawn(Arc::new(synth), Arc::new(output), config);
    (player, queue)
}

async fn next_call(queue: &mut SynthesisQueue) -> PendingSynthesis {
    tokio::time::timeout(WAIT, queue.next())
        .await
        .expect("timed out waiting for a synthesis call")
        .expect("synthesizer dropped")
}

async fn next_event(events: &mut broadcast::Receiver<PlaybackEvent>) -> PlaybackEvent {
    tokio::time::timeout(WAIT, events.recv())
        .await
        .expect("timed out waiting for a playback event")
        .expect("event channel closed")
}

/// Skip events until one matches.
async fn wait_for(
    events: &mut broadcast::Receiver<PlaybackEvent>,
    pred: impl Fn(&PlaybackEvent) -> bool,
) -> PlaybackEvent {
    loop {
        let event = next_event(events).await;
        if pred(&event) {
            return event;
        }
    }
}

/// Let the engine and any spawned fetches run.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Play `text` and bring chunk `target` to the playing state.
async fn play_until(
    player: &SpeechPlayer,
    queue: &mut SynthesisQueue,
    output: &MockOutput,
    events: &mut broadcast::Receiver<PlaybackEvent>,
    text: &str,
    target: usize,
) {
    player.play_text(text);
    for index in 0..=target {
        next_call(queue).await.respond_with_frames(240, 1000);
        wait_for(events, |e| *e == PlaybackEvent::ChunkStarted { index }).await;
        if index < target {
            assert!(output.finish_active());
        }
    }
}

#[tokio::test]
async fn chunks_play_in_order_one_fetch_at_a_time() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.play_text("One. Two. Three.");

    for (index, expected) in ["One.", "Two.", "Three."].iter().enumerate() {
        let call = next_call(&mut queue).await;
        assert_eq!(call.text, *expected);

        // Nothing is prefetched while a chunk is loading.
        settle().await;
        assert!(queue.try_next().is_none());

        call.respond_with_frames(240, 1000);
        wait_for(&mut events, |e| *e == PlaybackEvent::ChunkStarted { index }).await;
        assert!(player.is_playing());
        assert_eq!(player.state().current_index, Some(index));
        assert_eq!(output.live_count(), 1);

        // Nor while it is playing.
        settle().await;
        assert!(queue.try_next().is_none());

        assert!(output.finish_active());
        wait_for(&mut events, |e| *e == PlaybackEvent::ChunkFinished { index }).await;
    }

    wait_for(&mut events, |e| *e == PlaybackEvent::Finished).await;
    assert!(!player.is_playing());
    assert!(!player.is_loading());
    assert!(player.has_audio());
    assert_eq!(output.started_count(), 3);
    assert_eq!(output.open_count(), 1);

    player.shutdown().await;
}

#[tokio::test]
async fn stop_while_loading_discards_late_result() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.play_text("Cow has fever.");
    let call = next_call(&mut queue).await;

    player.stop();
    wait_for(&mut events, |e| *e == PlaybackEvent::Stopped).await;
    assert!(!player.is_loading());

    call.respond_with_frames(240, 1000);
    wait_for(&mut events, |e| {
        *e == PlaybackEvent::StaleResultDiscarded { index: 0 }
    })
    .await;

    assert_eq!(output.started_count(), 0);
    assert_eq!(output.open_count(), 0);
    assert!(!player.is_playing());
    assert!(player.has_audio());

    player.shutdown().await;
}

#[tokio::test]
async fn restart_plays_only_the_new_text_when_old_result_is_late() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.play_text("Old advice.");
    let old = next_call(&mut queue).await;
    player.play_text("New advice.");
    let new = next_call(&mut queue).await;
    assert_eq!(new.text, "New advice.");

    new.respond_with_frames(200, 1000);
    wait_for(&mut events, |e| *e == PlaybackEvent::ChunkStarted { index: 0 }).await;

    old.respond_with_frames(100, 1000);
    wait_for(&mut events, |e| {
        *e == PlaybackEvent::StaleResultDiscarded { index: 0 }
    })
    .await;

    let started: Vec<usize> = output
        .events()
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Started { frames, .. } => Some(*frames),
            _ => None,
        })
        .collect();
    assert_eq!(started, vec![200]);
    assert_eq!(output.live_count(), 1);

    player.shutdown().await;
}

#[tokio::test]
async fn restart_plays_only_the_new_text_when_old_result_is_early() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.play_text("Old advice.");
    let old = next_call(&mut queue).await;
    player.play_text("New advice.");
    let new = next_call(&mut queue).await;

    old.respond_with_frames(100, 1000);
    wait_for(&mut events, |e| {
        *e == PlaybackEvent::StaleResultDiscarded { index: 0 }
    })
    .await;
    assert!(player.is_loading());
    assert_eq!(output.started_count(), 0);

    new.respond_with_frames(200, 1000);
    wait_for(&mut events, |e| *e == PlaybackEvent::ChunkStarted { index: 0 }).await;
    assert_eq!(output.started_count(), 1);

    player.shutdown().await;
}

#[tokio::test]
async fn stop_while_playing_silences_output() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    play_until(&player, &mut queue, &output, &mut events, "One. Two.", 0).await;

    player.stop();
    wait_for(&mut events, |e| *e == PlaybackEvent::Stopped).await;

    assert_eq!(output.live_count(), 0);
    assert!(output.events().contains(&OutputEvent::Stopped { source: 0 }));
    assert!(!output.finish_active());
    assert!(player.state().is_idle());

    settle().await;
    assert!(queue.try_next().is_none());

    player.shutdown().await;
}

#[tokio::test]
async fn stop_is_idempotent() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    // Idle: nothing to report.
    player.stop();
    player.stop();

    play_until(&player, &mut queue, &output, &mut events, "One.", 0).await;
    player.stop();
    player.stop();
    let state_after_first = {
        wait_for(&mut events, |e| *e == PlaybackEvent::Stopped).await;
        player.state()
    };

    // Anything after the single Stopped comes from the next command.
    player.play_text("Two.");
    assert_eq!(
        next_event(&mut events).await,
        PlaybackEvent::ChunkLoading {
            index: 0,
            text: "Two.".to_string()
        }
    );
    assert!(state_after_first.is_idle());
    assert!(state_after_first.has_audio);
    assert_eq!(output.live_count(), 0);

    player.shutdown().await;
}

#[tokio::test]
async fn repeat_after_finish_replays_the_same_chunk() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    play_until(&player, &mut queue, &output, &mut events, "Cow has fever.", 0).await;
    assert!(output.finish_active());
    wait_for(&mut events, |e| *e == PlaybackEvent::Finished).await;

    for _ in 0..2 {
        player.repeat_current_chunk();
        let call = next_call(&mut queue).await;
        assert_eq!(call.text, "Cow has fever.");
        call.respond_with_frames(240, 1000);
        wait_for(&mut events, |e| *e == PlaybackEvent::ChunkStarted { index: 0 }).await;
        assert!(output.finish_active());
        wait_for(&mut events, |e| *e == PlaybackEvent::Finished).await;
    }

    assert_eq!(output.started_count(), 3);
    player.shutdown().await;
}

#[tokio::test]
async fn repeat_twice_while_playing_keeps_the_index() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    play_until(&player, &mut queue, &output, &mut events, "One. Two. Three.", 1).await;

    player.repeat_current_chunk();
    let first = next_call(&mut queue).await;
    assert_eq!(first.text, "Two.");
    assert_eq!(output.live_count(), 0);

    player.repeat_current_chunk();
    let second = next_call(&mut queue).await;
    assert_eq!(second.text, "Two.");

    first.respond_with_frames(240, 1000);
    wait_for(&mut events, |e| {
        *e == PlaybackEvent::StaleResultDiscarded { index: 1 }
    })
    .await;

    second.respond_with_frames(240, 1000);
    wait_for(&mut events, |e| *e == PlaybackEvent::ChunkStarted { index: 1 }).await;
    assert_eq!(player.state().current_index, Some(1));
    assert_eq!(output.live_count(), 1);

    player.shutdown().await;
}

#[tokio::test]
async fn replay_all_restarts_from_the_first_chunk() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    play_until(&player, &mut queue, &output, &mut events, "One. Two. Three.", 2).await;

    player.replay_all();
    let call = next_call(&mut queue).await;
    assert_eq!(call.text, "One.");
    assert_eq!(output.live_count(), 0);
    assert_eq!(player.state().current_index, Some(0));
    assert!(player.is_loading());

    call.respond_with_frames(240, 1000);
    wait_for(&mut events, |e| *e == PlaybackEvent::ChunkStarted { index: 0 }).await;

    player.shutdown().await;
}

#[tokio::test]
async fn repeat_and_replay_without_text_do_nothing() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.repeat_current_chunk();
    player.replay_all();
    player.play_text("   ");
    player.repeat_current_chunk();
    player.play_text("Cow has fever.");

    assert_eq!(
        next_event(&mut events).await,
        PlaybackEvent::ChunkLoading {
            index: 0,
            text: "Cow has fever.".to_string()
        }
    );
    assert_eq!(next_call(&mut queue).await.text, "Cow has fever.");
    settle().await;
    assert!(queue.try_next().is_none());
    assert_eq!(output.open_count(), 0);

    player.shutdown().await;
}

#[tokio::test]
async fn synthesis_failure_stops_without_advancing() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.play_text("One. Two.");
    next_call(&mut queue).await.fail("service unavailable");

    let failed = wait_for(&mut events, |e| {
        matches!(e, PlaybackEvent::ChunkFailed { .. })
    })
    .await;
    match failed {
        PlaybackEvent::ChunkFailed {
            index,
            kind,
            message,
        } => {
            assert_eq!(index, 0);
            assert_eq!(kind, ErrorKind::Synthesis);
            assert!(message.contains("service unavailable"));
        }
        other => panic!("Expected ChunkFailed, got {:?}", other),
    }

    assert!(player.state().is_idle());
    assert!(player.has_audio());
    settle().await;
    assert!(queue.try_next().is_none());

    // The failed chunk is still the current one.
    player.repeat_current_chunk();
    assert_eq!(next_call(&mut queue).await.text, "One.");

    player.shutdown().await;
}

#[tokio::test]
async fn odd_length_audio_is_a_decode_failure() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.play_text("Cow has fever.");
    next_call(&mut queue).await.respond(vec![0x01, 0x02, 0x03]);

    let failed = wait_for(&mut events, |e| {
        matches!(e, PlaybackEvent::ChunkFailed { .. })
    })
    .await;
    assert!(matches!(
        failed,
        PlaybackEvent::ChunkFailed {
            kind: ErrorKind::Decode,
            ..
        }
    ));
    assert_eq!(output.started_count(), 0);
    assert!(!player.is_playing());

    player.shutdown().await;
}

#[tokio::test]
async fn device_failure_is_reported() {
    let output = MockOutput::new().with_open_failure("no sound card");
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.play_text("Cow has fever.");
    next_call(&mut queue).await.respond_with_frames(240, 1000);

    let failed = wait_for(&mut events, |e| {
        matches!(e, PlaybackEvent::ChunkFailed { .. })
    })
    .await;
    assert!(matches!(
        failed,
        PlaybackEvent::ChunkFailed {
            kind: ErrorKind::Device,
            ..
        }
    ));
    assert!(player.state().is_idle());

    player.shutdown().await;
}

#[tokio::test]
async fn preferences_apply_to_the_next_fetch() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    player.set_preferences(SpeechPreferences {
        voice: "Puck".to_string(),
        language: Language::Hi,
        volume: 0.5,
    });
    player.play_text("गाय को बुखार है।");

    let call = next_call(&mut queue).await;
    assert_eq!(call.voice, "Kore");
    assert_eq!(call.language, Language::Hi);

    call.respond_with_frames(240, 1000);
    wait_for(&mut events, |e| *e == PlaybackEvent::ChunkStarted { index: 0 }).await;
    assert_eq!(output.gains(), vec![0.5]);

    player.shutdown().await;
}

#[tokio::test]
async fn shutdown_silences_and_reports_stop() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    play_until(&player, &mut queue, &output, &mut events, "One. Two.", 0).await;
    player.shutdown().await;

    assert_eq!(output.live_count(), 0);
    assert_eq!(
        wait_for(&mut events, |e| *e == PlaybackEvent::Stopped).await,
        PlaybackEvent::Stopped
    );
}

#[tokio::test]
async fn dropping_the_player_silences_output() {
    let output = MockOutput::new();
    let (player, mut queue) = spawn_player(output.clone());
    let mut events = player.subscribe_events();

    play_until(&player, &mut queue, &output, &mut events, "One. Two.", 0).await;
    drop(player);

    tokio::time::timeout(WAIT, async {
        while output.live_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("output still live after drop");

    let stops = output
        .events()
        .iter()
        .filter(|e| matches!(e, OutputEvent::Stopped { .. }))
        .count();
    assert_eq!(stops, 1);
}
