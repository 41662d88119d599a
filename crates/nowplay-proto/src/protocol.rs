use serde::{Deserialize, Serialize};

use crate::track::{PlaybackState, Track};

/// Current protocol version.  Bump this when the wire format changes in a
/// breaking way.  A bridge checks this on connect and can refuse to talk to
/// an incompatible daemon.
pub const PROTOCOL_VERSION: u32 = 1;

/// State marker a bridge embeds in its change broadcasts.  Only this value
/// is trusted without a follow-up status query: querying a player that has
/// fully stopped can relaunch it, so the daemon must act on the marker alone.
pub const STOPPED_MARKER: &str = "Stopped";

/// Daemon → bridge request, correlated with its reply by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub op: RequestOp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op")]
pub enum RequestOp {
    /// Authoritative player state: running flag, playback state, current track.
    GetStatus,
    /// Whether the player is the frontmost application right now.
    Frontmost,
    /// Bring the player to the foreground.
    Activate,
    /// Skip to the next track.
    NextTrack,
}

/// Bridge → daemon reply to a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub request_id: u64,
    #[serde(flatten)]
    pub body: ReplyBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "reply")]
pub enum ReplyBody {
    Status(PlayerStatus),
    Frontmost { frontmost: bool },
    Ack,
    Error { message: String },
}

/// Authoritative snapshot of the external player, as answered to `GetStatus`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerStatus {
    pub running: bool,
    pub state: PlaybackState,
    #[serde(default)]
    pub track: Option<Track>,
}

/// Unsolicited bridge → daemon broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    /// Playback state changed.  `player_state` is the raw marker string from
    /// the player's own broadcast; anything other than [`STOPPED_MARKER`]
    /// (including absence) is only a trigger to re-query.
    StateChanged {
        #[serde(default)]
        player_state: Option<String>,
    },
}

/// One newline-delimited JSON message on the bridge socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Request(Request),
    Reply(Reply),
    Event(Event),
}

impl Message {
    pub fn encode_line(&self) -> anyhow::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode_line(line: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}
