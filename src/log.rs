//! Opt-in file log. Off unless `HKCU\{LOG_SETTINGS_SUBKEY}\{LOGGING_VALUE_NAME}`
//! is a non-zero DWORD; the installer flips that flag.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Log from inside the DLL. Never fails the caller.
pub fn log(message: impl AsRef<str>) {
    let _ = log_desktop(message);
}

pub fn log_cli(message: impl Into<String>) {
    let text = message.into();
    if let Err(err) = log_desktop(&text) {
        eprintln!("[log] cannot write '{}': {}", text, err);
    }
}

/// Logs and echoes to the console.
pub fn log_ui(message: impl AsRef<str>) {
    let msg = message.as_ref();
    log_cli(msg);
    println!("{msg}");
}

/// `%LOCALAPPDATA%\flif-shell-win\flif-shell-win.log`.
pub fn log_file_path() -> Option<PathBuf> {
    let base = std::env::var_os("LOCALAPPDATA")?;
    Some(
        PathBuf::from(base)
            .join("flif-shell-win")
            .join("flif-shell-win.log"),
    )
}

pub fn log_desktop(message: impl AsRef<str>) -> Result<(), String> {
    if !log_enabled() {
        return Ok(());
    }
    use chrono::Local;

    let path = log_file_path().ok_or_else(|| "LOCALAPPDATA is not set".to_string())?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("failed to open {}: {}", path.display(), e))?;

    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    writeln!(file, "[{}] {}", timestamp, message.as_ref())
        .map_err(|e| format!("failed to write to {}: {}", path.display(), e))?;

    Ok(())
}

#[cfg(windows)]
pub fn log_enabled() -> bool {
    use crate::keys;
    use winreg::RegKey;
    use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};

    fn read_from(hive: RegKey) -> Option<bool> {
        let key = hive.open_subkey(keys::LOG_SETTINGS_SUBKEY).ok()?;
        let value = key.get_value::<u32, _>(keys::LOGGING_VALUE_NAME).ok()?;
        Some(value != 0)
    }

    read_from(RegKey::predef(HKEY_CURRENT_USER))
        .or_else(|| read_from(RegKey::predef(HKEY_LOCAL_MACHINE)))
        .unwrap_or(false)
}

/// There is no settings store off Windows.
#[cfg(not(windows))]
pub fn log_enabled() -> bool {
    false
}
