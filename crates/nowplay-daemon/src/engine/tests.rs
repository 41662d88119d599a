//! Engine scenarios against a scripted player and a recording sink.

use super::*;
use nowplay_proto::protocol::PlayerStatus;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

#[derive(Clone, Default)]
struct MockPlayer {
    status: Arc<Mutex<PlayerStatus>>,
    status_queries: Arc<AtomicUsize>,
    frontmost: Arc<AtomicBool>,
    activations: Arc<AtomicUsize>,
    skips: Arc<AtomicUsize>,
}

impl MockPlayer {
    fn set_status(&self, status: PlayerStatus) {
        *self.status.lock().unwrap() = status;
    }
}

impl Player for MockPlayer {
    async fn status(&self) -> anyhow::Result<PlayerStatus> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.status.lock().unwrap().clone())
    }

    async fn is_frontmost(&self) -> anyhow::Result<bool> {
        Ok(self.frontmost.load(Ordering::SeqCst))
    }

    async fn activate(&self) -> anyhow::Result<()> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_track(&self) -> anyhow::Result<()> {
        self.skips.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct MockSink {
    delivered: Arc<Mutex<Vec<NotificationPayload>>>,
    purges: Arc<AtomicUsize>,
}

impl MockSink {
    fn delivered(&self) -> Vec<NotificationPayload> {
        self.delivered.lock().unwrap().clone()
    }

    fn purges(&self) -> usize {
        self.purges.load(Ordering::SeqCst)
    }
}

impl NotificationSink for MockSink {
    async fn deliver(&self, payload: &NotificationPayload) -> anyhow::Result<()> {
        self.delivered.lock().unwrap().push(payload.clone());
        Ok(())
    }

    async fn remove_all_delivered(&self) {
        self.purges.fetch_add(1, Ordering::SeqCst);
    }
}

fn track(id: &str, name: &str, album: Option<&str>) -> Track {
    Track {
        id: id.to_string(),
        name: name.to_string(),
        artist: Some("Artist".to_string()),
        album: album.map(str::to_string),
        artwork_url: None,
    }
}

fn playing(track: Track) -> PlayerStatus {
    PlayerStatus {
        running: true,
        state: PlaybackState::Playing,
        track: Some(track),
    }
}

fn paused(track: Track) -> PlayerStatus {
    PlayerStatus {
        running: true,
        state: PlaybackState::Paused,
        track: Some(track),
    }
}

fn engine_with(
    settings: Settings,
    player: MockPlayer,
    sink: MockSink,
) -> (
    NotificationEngine<MockPlayer, MockSink>,
    mpsc::Receiver<EngineEvent>,
) {
    let (tx, rx) = mpsc::channel(32);
    (NotificationEngine::new(settings, player, sink, tx), rx)
}

fn no_art_settings() -> Settings {
    let mut settings = Settings::default();
    settings.notifications.include_album_art = false;
    settings
}

#[tokio::test]
async fn test_stopped_broadcast_skips_query_and_purges() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(Settings::default(), player.clone(), sink.clone());
    engine.actions_enabled = true;

    engine
        .on_state_changed(Some(STOPPED_MARKER.to_string()))
        .await;

    assert_eq!(player.status_queries.load(Ordering::SeqCst), 0);
    assert_eq!(sink.purges(), 1);
    assert!(!engine.actions_enabled);
    assert_eq!(engine.status_line, StatusLine::NotPlaying);
}

#[tokio::test]
async fn test_playing_broadcast_delivers_new_track() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(no_art_settings(), player.clone(), sink.clone());

    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "Song One");
    assert_eq!(delivered[0].subtitle.as_deref(), Some("Artist — Album"));
    assert!(delivered[0].skip_action);
    assert!(!delivered[0].advertisement);
    assert!(engine.actions_enabled);
    assert_eq!(engine.status_line, StatusLine::Playing);
}

#[tokio::test]
async fn test_featured_artists_appended_to_artist_line() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(no_art_settings(), player.clone(), sink.clone());

    player.set_status(playing(track(
        "t1",
        "Song One (feat. A & B)",
        Some("Album"),
    )));
    engine.on_state_changed(None).await;

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    // the credit stays in the title, the names join the artist line
    assert_eq!(delivered[0].title, "Song One (feat. A & B)");
    assert_eq!(
        delivered[0].subtitle.as_deref(),
        Some("Artist, A, B — Album")
    );
}

#[tokio::test]
async fn test_advertisement_delivers_minimal_payload_without_fetch() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    // album art enabled on purpose: the ad path must not fetch anyway
    let (mut engine, mut rx) = engine_with(Settings::default(), player.clone(), sink.clone());

    let mut ad = track("ad:992", "Advertisement", None);
    ad.artwork_url = Some("https://img.example/ad.jpg".to_string());
    player.set_status(playing(ad));
    engine.on_state_changed(None).await;

    assert!(engine.art_task.is_none());
    assert!(engine.pending.is_none());
    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].advertisement);
    assert_eq!(delivered[0].title, "No Song Playing");
    assert!(delivered[0].image.is_none());

    sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_same_track_repeat_suppressed_without_play_pause() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(no_art_settings(), player.clone(), sink.clone());

    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;
    engine.on_state_changed(None).await;

    assert_eq!(sink.delivered().len(), 1);
}

#[tokio::test]
async fn test_same_track_repeat_delivered_with_play_pause() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let mut settings = no_art_settings();
    settings.notifications.play_pause = true;
    let (mut engine, _rx) = engine_with(settings, player.clone(), sink.clone());

    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;
    engine.on_state_changed(None).await;

    assert_eq!(sink.delivered().len(), 2);
}

#[tokio::test]
async fn test_focus_suppresses_even_forced_delivery() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(no_art_settings(), player.clone(), sink.clone());

    player.frontmost.store(true, Ordering::SeqCst);
    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.startup().await;

    assert!(sink.delivered().is_empty());
    // the track was still adopted as current
    assert_eq!(engine.history.current().unwrap().id, "t1");
}

#[tokio::test]
async fn test_startup_forces_delivery_past_preferences() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let mut settings = no_art_settings();
    settings.notifications.enabled = false;
    let (mut engine, _rx) = engine_with(settings, player.clone(), sink.clone());

    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.startup().await;

    assert_eq!(sink.delivered().len(), 1);
    assert_eq!(engine.status_line, StatusLine::Playing);
}

#[tokio::test]
async fn test_startup_paused_adopts_track_without_notifying() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(no_art_settings(), player.clone(), sink.clone());

    player.set_status(paused(track("t1", "Song One", Some("Album"))));
    engine.startup().await;

    assert!(sink.delivered().is_empty());
    assert!(engine.actions_enabled);
    assert_eq!(engine.history.current().unwrap().id, "t1");
    assert_eq!(engine.status_line, StatusLine::NotPlaying);
}

#[tokio::test]
async fn test_artwork_attached_when_still_current() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(Settings::default(), player.clone(), sink.clone());

    let t1 = track("t1", "Song One", Some("Album"));
    player.set_status(playing(t1.clone()));
    engine.on_state_changed(None).await;

    // composed but parked on the fetch
    assert!(sink.delivered().is_empty());
    assert!(engine.pending.is_some());
    assert_eq!(engine.art_task.as_ref().unwrap().track_id, "t1");

    let art = DynamicImage::new_rgb8(2, 2);
    engine.on_artwork_resolved(t1, Some(art)).await;

    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert!(delivered[0].image.is_some());
    assert!(engine.art_task.is_none());
    assert!(engine.pending.is_none());
}

#[tokio::test]
async fn test_album_change_race_never_attaches_stale_artwork() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(Settings::default(), player.clone(), sink.clone());

    let t1 = track("t1", "Song One", Some("Album A"));
    player.set_status(playing(t1.clone()));
    engine.on_state_changed(None).await;
    assert_eq!(engine.art_task.as_ref().unwrap().track_id, "t1");

    // new track on a different album supersedes the t1 fetch
    let t2 = track("t2", "Song Two", Some("Album B"));
    player.set_status(playing(t2.clone()));
    engine.on_state_changed(None).await;
    assert_eq!(engine.art_task.as_ref().unwrap().track_id, "t2");

    // t1's completion lost the cancellation race and arrives anyway
    let stale = DynamicImage::new_rgb8(2, 2);
    engine.on_artwork_resolved(t1, Some(stale)).await;
    assert!(sink.delivered().is_empty());
    assert!(engine.pending.is_some());

    engine.on_artwork_resolved(t2, None).await;
    let delivered = sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].title, "Song Two");
    assert!(delivered[0].image.is_none());
}

#[tokio::test]
async fn test_paused_with_only_current_song_runs_not_playing() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let mut settings = no_art_settings();
    settings.notifications.only_current_song = true;
    let (mut engine, _rx) = engine_with(settings, player.clone(), sink.clone());

    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;
    assert_eq!(sink.delivered().len(), 1);

    player.set_status(paused(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;

    assert!(sink.purges() >= 1);
    assert!(engine.history.current().is_none());
    assert_eq!(engine.status_line, StatusLine::NotPlaying);
}

#[tokio::test]
async fn test_paused_without_only_current_song_is_noop() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(no_art_settings(), player.clone(), sink.clone());

    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;

    player.set_status(paused(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;

    assert_eq!(sink.delivered().len(), 1);
    assert_eq!(sink.purges(), 0);
    assert_eq!(engine.history.current().unwrap().id, "t1");
}

#[tokio::test]
async fn test_only_current_song_purges_before_each_delivery() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let mut settings = no_art_settings();
    settings.notifications.only_current_song = true;
    let (mut engine, _rx) = engine_with(settings, player.clone(), sink.clone());

    player.set_status(playing(track("t1", "Song One", Some("Album"))));
    engine.on_state_changed(None).await;
    player.set_status(playing(track("t2", "Song Two", Some("Album"))));
    engine.on_state_changed(None).await;

    assert_eq!(sink.delivered().len(), 2);
    assert_eq!(sink.purges(), 2);
}

#[tokio::test]
async fn test_activation_routing() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (mut engine, _rx) = engine_with(no_art_settings(), player.clone(), sink.clone());

    engine.on_activated(Activation::Clicked).await;
    assert_eq!(player.activations.load(Ordering::SeqCst), 1);

    // skip is ignored while secondary actions are disabled
    player.set_status(playing(track("t1", "Song One", None)));
    engine.on_activated(Activation::SkipRequested).await;
    assert_eq!(player.skips.load(Ordering::SeqCst), 0);

    // ... and while paused
    engine.actions_enabled = true;
    player.set_status(paused(track("t1", "Song One", None)));
    engine.on_activated(Activation::SkipRequested).await;
    assert_eq!(player.skips.load(Ordering::SeqCst), 0);

    player.set_status(playing(track("t1", "Song One", None)));
    engine.on_activated(Activation::SkipRequested).await;
    assert_eq!(player.skips.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_run_loop_dispatches_events() {
    let player = MockPlayer::default();
    let sink = MockSink::default();
    let (engine, rx) = engine_with(no_art_settings(), player.clone(), sink.clone());
    let tx = engine.events.clone();

    // The engine keeps its own sender alive, so the loop only ends when the
    // surrounding task is dropped — as in the daemon's shutdown select.
    tokio::select! {
        res = engine.run(rx) => panic!("engine loop exited early: {res:?}"),
        _ = async {
            tx.send(EngineEvent::StateChanged {
                player_state: Some(STOPPED_MARKER.to_string()),
            })
            .await
            .unwrap();
            sleep(Duration::from_millis(100)).await;
        } => {}
    }

    assert_eq!(sink.purges(), 1);
    assert_eq!(player.status_queries.load(Ordering::SeqCst), 0);
}
