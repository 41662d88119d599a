use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub player: PlayerSettings,
    #[serde(default)]
    pub launch: LaunchSettings,
    #[serde(default)]
    pub icon: IconSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Notify on every play/pause transition, not only on track changes.
    #[serde(default)]
    pub play_pause: bool,
    /// Keep at most one notification visible — the current song's.
    #[serde(default)]
    pub only_current_song: bool,
    #[serde(default = "default_true")]
    pub include_album_art: bool,
    /// Never notify while the player itself is the frontmost application.
    #[serde(default = "default_true")]
    pub suppress_when_player_focused: bool,
    #[serde(default = "default_true")]
    pub sound: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Socket the OS-side player bridge listens on.
    #[serde(default = "default_bridge_socket")]
    pub bridge_socket: PathBuf,
}

/// Consumed by the login-item registration shell, not by the daemon itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LaunchSettings {
    #[serde(default)]
    pub at_login: bool,
}

/// Consumed by the status-bar shell, not by the daemon itself.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IconSettings {
    #[serde(default)]
    pub style: IconStyle,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum IconStyle {
    #[default]
    Colour,
    Monochrome,
    Hidden,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            notifications: NotificationSettings::default(),
            player: PlayerSettings::default(),
            launch: LaunchSettings::default(),
            icon: IconSettings::default(),
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            play_pause: false,
            only_current_song: false,
            include_album_art: default_true(),
            suppress_when_player_focused: default_true(),
            sound: default_true(),
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            bridge_socket: default_bridge_socket(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_bridge_socket() -> PathBuf {
    platform::bridge_socket_path()
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let settings = Self::default();
            settings.save()?;
            return Ok(settings);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
