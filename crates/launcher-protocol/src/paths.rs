use std::path::PathBuf;

/// Returns the socket the session provider listens on.
///
/// Checks `$LAUNCHER_PROVIDER_SOCKET`, then `$XDG_RUNTIME_DIR/launcher/provider.sock`,
/// then `/tmp/launcher-$UID/provider.sock`.
pub fn default_provider_socket_path() -> PathBuf {
    if let Ok(p) = std::env::var("LAUNCHER_PROVIDER_SOCKET") {
        return PathBuf::from(p);
    }
    runtime_dir().join("provider.sock")
}

/// Returns the socket the launcher node exposes its command surface on.
///
/// Checks `$LAUNCHER_SOCKET` before falling back to the runtime directory.
pub fn default_command_socket_path() -> PathBuf {
    if let Ok(p) = std::env::var("LAUNCHER_SOCKET") {
        return PathBuf::from(p);
    }
    runtime_dir().join("launcher.sock")
}

fn runtime_dir() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        PathBuf::from(runtime_dir).join("launcher")
    } else {
        // SAFETY: getuid() is always safe to call and has no preconditions
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/launcher-{uid}"))
    }
}

/// Returns the config directory for the launcher.
pub fn dirs_path() -> PathBuf {
    if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(config_dir).join("launcher")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("launcher")
    } else {
        PathBuf::from("/tmp/launcher")
    }
}

/// Returns the config file path for the launcher node.
pub fn config_path() -> PathBuf {
    dirs_path().join("config.toml")
}
