//! Cancellable artwork fetch for the notification icon.

use image::DynamicImage;
use nowplay_proto::track::Track;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::EngineEvent;

#[derive(Debug, Error)]
enum ArtworkError {
    #[error("artwork request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("artwork decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Handle to the single in-flight fetch, owned by the engine.  Cancellation
/// is synchronous and idempotent; a cancelled fetch's completion never
/// reaches the engine channel.
#[derive(Debug)]
pub struct ArtworkTask {
    pub track_id: String,
    token: CancellationToken,
}

impl ArtworkTask {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

pub struct ArtworkFetcher {
    client: reqwest::Client,
}

impl ArtworkFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Spawn a fetch for `track`'s artwork.  Exactly one
    /// [`EngineEvent::ArtworkResolved`] is sent unless the task is cancelled
    /// first.  Transport and decode failures collapse to `None` — callers
    /// cannot tell "failed" from "absent" at this layer, and they must
    /// correlate the completion's track id against whatever is current
    /// before acting on the image.
    pub fn spawn(&self, track: Track, events: mpsc::Sender<EngineEvent>) -> ArtworkTask {
        let token = CancellationToken::new();
        let task = ArtworkTask {
            track_id: track.id.clone(),
            token: token.clone(),
        };
        let client = self.client.clone();

        tokio::spawn(async move {
            let image = match track.artwork_url.as_deref() {
                Some(url) => {
                    let url = secure_url(url);
                    tokio::select! {
                        _ = token.cancelled() => return,
                        res = fetch_and_decode(&client, &url) => match res {
                            Ok(img) => Some(img),
                            Err(e) => {
                                debug!(%url, "artwork fetch failed: {e}");
                                None
                            }
                        },
                    }
                }
                None => None,
            };

            // cancel() may have raced past the select arm
            if token.is_cancelled() {
                return;
            }
            let _ = events.send(EngineEvent::ArtworkResolved { track, image }).await;
        });

        task
    }
}

/// Players sometimes hand out artwork URLs with a plain-http scheme.
fn secure_url(url: &str) -> String {
    match url.strip_prefix("http:") {
        Some(rest) => format!("https:{rest}"),
        None => url.to_string(),
    }
}

async fn fetch_and_decode(
    client: &reqwest::Client,
    url: &str,
) -> Result<DynamicImage, ArtworkError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    Ok(image::load_from_memory(&bytes)?)
}
