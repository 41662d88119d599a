//! Notification engine: reacts to player state broadcasts, drives the track
//! history, featured-artist parser, artwork fetch, and delivery gate, and
//! hands composed notifications to the sink.
//!
//! All orchestration happens on a single task consuming [`EngineEvent`]s;
//! the bridge reader, artwork fetches, and sink waiters only ever *send*
//! into that channel, so no two engine steps run concurrently.

use image::DynamicImage;
use nowplay_proto::config::Settings;
use nowplay_proto::protocol::STOPPED_MARKER;
use nowplay_proto::track::{PlaybackState, Track};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::artwork::{ArtworkFetcher, ArtworkTask};
use crate::bridge::Player;
use crate::featuring;
use crate::gate;
use crate::history::TrackHistory;
use crate::notify::{NotificationPayload, NotificationSink};

#[cfg(test)]
mod tests;

/// Everything that can wake the engine.
#[derive(Debug)]
pub enum EngineEvent {
    /// State-change broadcast relayed by the bridge.
    StateChanged { player_state: Option<String> },
    /// Artwork fetch completion.  Never sent by a cancelled fetch.
    ArtworkResolved {
        track: Track,
        image: Option<DynamicImage>,
    },
    /// Notification activation reported by the sink.
    Activated(Activation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Notification body clicked — bring the player to the foreground.
    Clicked,
    /// "Skip" action button.
    SkipRequested,
}

/// Status line consumed by the (out of scope) status-bar shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLine {
    Playing,
    NotPlaying,
}

impl StatusLine {
    pub fn label(self) -> &'static str {
        match self {
            StatusLine::Playing => "Open Player (Playing)",
            StatusLine::NotPlaying => "Open Player (Not Playing)",
        }
    }
}

/// A composed notification waiting for its artwork fetch to settle.
struct PendingDelivery {
    payload: NotificationPayload,
    force_delivery: bool,
}

pub struct NotificationEngine<P, S> {
    settings: Settings,
    player: P,
    sink: S,
    history: TrackHistory,
    artwork: ArtworkFetcher,
    /// The single in-flight fetch handle.  A new build pass cancels it.
    art_task: Option<ArtworkTask>,
    pending: Option<PendingDelivery>,
    /// Whether secondary player actions (skip, external-site links) apply.
    actions_enabled: bool,
    status_line: StatusLine,
    events: mpsc::Sender<EngineEvent>,
}

impl<P: Player, S: NotificationSink> NotificationEngine<P, S> {
    pub fn new(settings: Settings, player: P, sink: S, events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            settings,
            player,
            sink,
            history: TrackHistory::default(),
            artwork: ArtworkFetcher::new(),
            art_task: None,
            pending: None,
            actions_enabled: false,
            status_line: StatusLine::NotPlaying,
            events,
        }
    }

    /// The player may already be running when the daemon comes up: adopt its
    /// current track without notifying, and force one notification through
    /// if it is actively playing.
    pub async fn startup(&mut self) {
        let status = match self.player.status().await {
            Ok(s) => s,
            Err(e) => {
                warn!("startup status query failed: {e:#}");
                return;
            }
        };
        if !status.running {
            return;
        }

        if matches!(status.state, PlaybackState::Playing | PlaybackState::Paused) {
            if let Some(track) = status.track {
                self.history.record_new_current(track);
                self.actions_enabled = true;
            }
            if status.state == PlaybackState::Playing {
                self.set_status_line(StatusLine::Playing);
                self.build_and_deliver(true).await;
            }
        }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<EngineEvent>) -> anyhow::Result<()> {
        info!("engine: running");
        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::StateChanged { player_state } => {
                    self.on_state_changed(player_state).await;
                }
                EngineEvent::ArtworkResolved { track, image } => {
                    self.on_artwork_resolved(track, image).await;
                }
                EngineEvent::Activated(kind) => {
                    self.on_activated(kind).await;
                }
            }
        }

        // Event sources are gone; abandon whatever fetch is still out.
        if let Some(task) = self.art_task.take() {
            task.cancel();
        }
        info!("engine: event channel closed, exiting");
        Ok(())
    }

    async fn on_state_changed(&mut self, player_state: Option<String>) {
        // The stop marker is acted on as-is: querying a player that has
        // fully stopped can relaunch it.
        if player_state.as_deref() == Some(STOPPED_MARKER) {
            self.not_playing().await;
            return;
        }

        let status = match self.player.status().await {
            Ok(s) => s,
            Err(e) => {
                warn!("status query after broadcast failed: {e:#}");
                return;
            }
        };

        match status.state {
            PlaybackState::Playing => {
                let Some(track) = status.track else {
                    debug!("playing with no current track, ignoring broadcast");
                    return;
                };
                self.set_status_line(StatusLine::Playing);
                self.history.record_new_current(track);

                // A different album makes the in-flight artwork useless.
                if self.album_changed() {
                    if let Some(task) = self.art_task.take() {
                        task.cancel();
                        self.pending = None;
                    }
                }

                self.actions_enabled = true;
                self.build_and_deliver(false).await;
            }
            PlaybackState::Paused | PlaybackState::Stopped
                if self.settings.notifications.only_current_song =>
            {
                self.not_playing().await;
            }
            _ => {}
        }
    }

    fn album_changed(&self) -> bool {
        match (self.history.previous(), self.history.current()) {
            (Some(prev), Some(cur)) => prev.album != cur.album,
            _ => false,
        }
    }

    fn set_status_line(&mut self, line: StatusLine) {
        if self.status_line != line {
            self.status_line = line;
            debug!(status = line.label(), "status line updated");
        }
    }

    async fn not_playing(&mut self) {
        self.set_status_line(StatusLine::NotPlaying);
        self.actions_enabled = false;
        if let Some(task) = self.art_task.take() {
            task.cancel();
        }
        self.pending = None;
        self.sink.remove_all_delivered().await;
        if self.settings.notifications.only_current_song {
            self.history.clear();
        }
    }

    async fn build_and_deliver(&mut self, force_delivery: bool) {
        // Starting a new pass supersedes whatever fetch is still out.
        if let Some(task) = self.art_task.take() {
            task.cancel();
        }
        self.pending = None;

        let Some(track) = self.history.current().cloned() else {
            return;
        };

        let sound = self.settings.notifications.sound;

        if track.is_advertisement() {
            let payload = NotificationPayload::advertisement(sound);
            self.decide_and_deliver(payload, force_delivery).await;
            return;
        }

        let mut artists = track.artist.clone().unwrap_or_default();
        if let Some(credit) = featuring::featured_artists(&track.name) {
            // The credit stays in the displayed title; only the artist line
            // picks up the parsed names.
            let joined = credit.artists.join(", ");
            if artists.is_empty() {
                artists = joined;
            } else {
                artists.push_str(", ");
                artists.push_str(&joined);
            }
        }

        let subtitle = format!("{} — {}", artists, track.album.clone().unwrap_or_default());
        let payload = NotificationPayload {
            title: track.name.clone(),
            subtitle: Some(subtitle),
            sound,
            image: None,
            skip_action: true,
            advertisement: false,
        };

        if !self.settings.notifications.include_album_art {
            self.decide_and_deliver(payload, force_delivery).await;
            return;
        }

        self.pending = Some(PendingDelivery {
            payload,
            force_delivery,
        });
        self.art_task = Some(self.artwork.spawn(track, self.events.clone()));
    }

    async fn on_artwork_resolved(&mut self, track: Track, image: Option<DynamicImage>) {
        // Only the fetch the engine still owns may complete the pending
        // delivery; completions from superseded fetches are dropped.
        let owned = self
            .art_task
            .as_ref()
            .is_some_and(|task| task.track_id == track.id);
        if !owned {
            debug!(track_id = %track.id, "stale artwork completion ignored");
            return;
        }
        let Some(mut pending) = self.pending.take() else {
            debug!(track_id = %track.id, "artwork completion with nothing pending");
            return;
        };

        // Attach only when the fetch still matches the live current track;
        // deliver either way.
        let still_current = self
            .history
            .current()
            .is_some_and(|current| current.id == track.id);
        if still_current {
            pending.payload.image = image;
        }

        self.decide_and_deliver(pending.payload, pending.force_delivery)
            .await;
    }

    async fn decide_and_deliver(&mut self, payload: NotificationPayload, force_delivery: bool) {
        let frontmost = match self.player.is_frontmost().await {
            Ok(f) => f,
            Err(e) => {
                debug!("frontmost query failed, assuming not frontmost: {e:#}");
                false
            }
        };

        let decision = gate::decide(
            force_delivery,
            frontmost,
            &self.history,
            &self.settings.notifications,
        );

        if decision.clear_existing {
            self.sink.remove_all_delivered().await;
        }

        if decision.deliver {
            // The fetch handle is spent once delivery is committed.
            self.art_task = None;
            self.pending = None;
            if let Err(e) = self.sink.deliver(&payload).await {
                warn!("notification delivery failed: {e:#}");
            }
        } else {
            debug!("notification suppressed by delivery gate");
        }
    }

    async fn on_activated(&mut self, kind: Activation) {
        match kind {
            Activation::Clicked => {
                if let Err(e) = self.player.activate().await {
                    warn!("player activate failed: {e:#}");
                }
            }
            Activation::SkipRequested => {
                // Skip is a secondary action and only applies while the
                // player is actually playing.
                if !self.actions_enabled {
                    return;
                }
                let playing = self
                    .player
                    .status()
                    .await
                    .map(|s| s.state == PlaybackState::Playing)
                    .unwrap_or(false);
                if playing {
                    if let Err(e) = self.player.next_track().await {
                        warn!("skip failed: {e:#}");
                    }
                }
            }
        }
    }
}
