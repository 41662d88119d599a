use serde::{Deserialize, Serialize};

/// Identifier prefix a bridge uses to mark a sponsored slot instead of a song.
pub const AD_MARKER_PREFIX: &str = "ad:";

/// Immutable snapshot of a playable item at a point in time.
///
/// Two values with equal `id` represent the same logical item even if the
/// other fields differ — bridges may report partial data on some events and
/// enriched data on others.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    /// Display title.  May embed a "(feat. X & Y)" credit substring.
    pub name: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub artwork_url: Option<String>,
}

impl Track {
    /// True when the identifier marks an advertisement placeholder.
    pub fn is_advertisement(&self) -> bool {
        self.id.starts_with(AD_MARKER_PREFIX)
    }
}

/// Normalised external player status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
}
