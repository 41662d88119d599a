//! Delivery policy: whether a composed notification is actually shown.

use nowplay_proto::config::NotificationSettings;

use crate::history::TrackHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    pub deliver: bool,
    /// Purge everything already delivered before showing this one.
    pub clear_existing: bool,
}

/// Decision table, evaluated in order:
/// 1. Player frontmost + suppress-on-focus vetoes everything, even forced
///    delivery — an initial-launch notification still respects focus.
/// 2. Forced delivery passes.
/// 3. Otherwise deliver when notifications are enabled and the track is new,
///    or play/pause notifications are on.
/// 4. Under only-current-song, a delivered notification first clears the
///    sink so at most one stays visible.
pub fn decide(
    force_delivery: bool,
    player_frontmost: bool,
    history: &TrackHistory,
    settings: &NotificationSettings,
) -> Delivery {
    if player_frontmost && settings.suppress_when_player_focused {
        return Delivery::default();
    }

    if force_delivery {
        return Delivery {
            deliver: true,
            clear_existing: false,
        };
    }

    let is_new_track = history.is_different_from_previous();
    if settings.enabled && (is_new_track || settings.play_pause) {
        return Delivery {
            deliver: true,
            clear_existing: settings.only_current_song,
        };
    }

    Delivery::default()
}
