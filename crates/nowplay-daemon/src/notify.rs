//! Notification payload, sink interface, and the desktop (libnotify) sink.

use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::engine::{Activation, EngineEvent};

/// Composed notification, handed to the sink as-is.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub title: String,
    /// "<artists> — <album>" line.  Absent for advertisement placeholders.
    pub subtitle: Option<String>,
    pub sound: bool,
    pub image: Option<DynamicImage>,
    /// Offer a "Skip" action button.
    pub skip_action: bool,
    pub advertisement: bool,
}

impl NotificationPayload {
    /// Minimal placeholder shown for sponsored slots.
    pub fn advertisement(sound: bool) -> Self {
        Self {
            title: "No Song Playing".to_string(),
            subtitle: None,
            sound,
            image: None,
            skip_action: false,
            advertisement: true,
        }
    }
}

/// Where composed notifications end up.  Delivery is fire-and-forget from
/// the engine's perspective; presentation policy belongs to the sink.
pub trait NotificationSink {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<()>;
    /// Purge every notification this sink has delivered so far.
    async fn remove_all_delivered(&self);
}

/// Desktop sink driving `notify-send`.
///
/// The posted notification id is read back from stdout (`--print-id`) so
/// [`NotificationSink::remove_all_delivered`] can close it later via
/// `gdbus`.  For payloads with a skip action the process is kept alive with
/// `--wait`; on activation it prints the invoked action key, which is routed
/// back into the engine's event channel.
pub struct DesktopNotifier {
    notify_send: Option<PathBuf>,
    gdbus: Option<PathBuf>,
    data_dir: PathBuf,
    delivered: Arc<Mutex<Vec<u32>>>,
    events: mpsc::Sender<EngineEvent>,
}

impl DesktopNotifier {
    pub fn new(data_dir: PathBuf, events: mpsc::Sender<EngineEvent>) -> Self {
        let notify_send = nowplay_proto::platform::find_notify_send();
        if notify_send.is_none() {
            warn!("notify-send not found, notifications will not be shown");
        }
        Self {
            notify_send,
            gdbus: nowplay_proto::platform::find_gdbus(),
            data_dir,
            delivered: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }
}

impl NotificationSink for DesktopNotifier {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<()> {
        let notify_send = self
            .notify_send
            .as_ref()
            .context("notify-send not available")?;

        let mut cmd = Command::new(notify_send);
        cmd.arg("--app-name=nowplay").arg("--print-id");

        if let Some(img) = &payload.image {
            let icon_path = self.data_dir.join("artwork.png");
            img.save(&icon_path).context("failed to write artwork icon")?;
            cmd.arg(format!("--icon={}", icon_path.display()));
        }

        if payload.sound {
            cmd.arg("--hint=string:sound-name:message-new-instant");
        }

        if payload.skip_action {
            cmd.arg("--action=default=Open")
                .arg("--action=skip=Skip")
                .arg("--wait");
        }

        cmd.arg(&payload.title);
        if let Some(subtitle) = &payload.subtitle {
            cmd.arg(subtitle);
        }

        cmd.stdout(Stdio::piped()).stderr(Stdio::null());
        let mut child = cmd.spawn().context("failed to spawn notify-send")?;
        let stdout = child.stdout.take().context("notify-send stdout missing")?;

        let delivered = self.delivered.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut posted_id = None;

            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim();
                if posted_id.is_none() {
                    if let Ok(id) = line.parse::<u32>() {
                        posted_id = Some(id);
                        delivered.lock().await.push(id);
                        continue;
                    }
                }
                match line {
                    "default" => {
                        let _ = events.send(EngineEvent::Activated(Activation::Clicked)).await;
                    }
                    "skip" => {
                        let _ = events
                            .send(EngineEvent::Activated(Activation::SkipRequested))
                            .await;
                    }
                    other => debug!("notify-send: unrecognised output line {other:?}"),
                }
            }

            let _ = child.wait().await;
        });

        Ok(())
    }

    async fn remove_all_delivered(&self) {
        let ids: Vec<u32> = self.delivered.lock().await.drain(..).collect();
        if ids.is_empty() {
            return;
        }

        let Some(gdbus) = &self.gdbus else {
            debug!("gdbus not found, dropping {} delivered ids", ids.len());
            return;
        };

        for id in ids {
            let result = Command::new(gdbus)
                .args([
                    "call",
                    "--session",
                    "--dest",
                    "org.freedesktop.Notifications",
                    "--object-path",
                    "/org/freedesktop/Notifications",
                    "--method",
                    "org.freedesktop.Notifications.CloseNotification",
                ])
                .arg(id.to_string())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = result {
                warn!("failed to close notification {id}: {e}");
            }
        }
    }
}
