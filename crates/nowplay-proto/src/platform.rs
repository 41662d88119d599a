use std::path::PathBuf;

/// Socket the OS-side player bridge listens on.
pub fn bridge_socket_path() -> PathBuf {
    std::env::temp_dir().join("nowplay-bridge.sock")
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("nowplay")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".local")
        .join("share")
        .join("nowplay")
}

fn find_beside_exe(name: &str) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    let p = dir.join(name);
    if p.exists() {
        return Some(p);
    }
    let p = dir.join("external").join(name);
    if p.exists() {
        return Some(p);
    }
    None
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    for dir in path.split(':') {
        let p = PathBuf::from(dir).join(name);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

/// Find the notify-send binary used for notification delivery.
///
/// Searches in order:
/// 1. NOTIFY_SEND_PATH environment variable
/// 2. Beside current executable
/// 3. PATH
pub fn find_notify_send() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("NOTIFY_SEND_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(p) = find_beside_exe("notify-send") {
        return Some(p);
    }

    find_on_path("notify-send")
}

/// Find the gdbus binary used to close delivered notifications.
pub fn find_gdbus() -> Option<PathBuf> {
    find_on_path("gdbus")
}
