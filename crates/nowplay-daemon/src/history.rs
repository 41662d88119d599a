//! Previous/current track pair for change detection.

use nowplay_proto::track::Track;

/// The last two "now playing" snapshots the engine has observed.  Mutated
/// only by the engine, exactly once per observed transition; never on a
/// Stopped broadcast (other than [`TrackHistory::clear`]).
#[derive(Debug, Default)]
pub struct TrackHistory {
    previous: Option<Track>,
    current: Option<Track>,
}

impl TrackHistory {
    /// Shift current → previous and install the newly observed track.
    pub fn record_new_current(&mut self, track: Track) {
        self.previous = self.current.take();
        self.current = Some(track);
    }

    /// True when there is no previous track, or the ids differ.  Fields other
    /// than the id are ignored: the same id can reappear with enriched or
    /// partial fields across events.
    pub fn is_different_from_previous(&self) -> bool {
        match (&self.previous, &self.current) {
            (Some(prev), Some(cur)) => prev.id != cur.id,
            _ => true,
        }
    }

    /// Forget both snapshots.  Used on the Stopped transition under
    /// only-current-song semantics.
    pub fn clear(&mut self) {
        self.previous = None;
        self.current = None;
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    pub fn previous(&self) -> Option<&Track> {
        self.previous.as_ref()
    }
}
