use flif_shell_win::keys::{LOG_SETTINGS_SUBKEY, LOGGING_VALUE_NAME};
use flif_shell_win::log::{log_enabled, log_file_path, log_ui};
use std::{fs, io};
use winreg::RegKey;
use winreg::enums::HKEY_CURRENT_USER;

const ERROR_ACCESS_DENIED: i32 = 5;

fn state(on: bool) -> &'static str {
    if on { "enabled" } else { "disabled" }
}

/// Flips the per-user log flag. Turning it off also removes the log file.
pub fn toggle_logging() -> io::Result<()> {
    let target = !log_enabled();
    log_ui(format!("Logging: switching to {}", state(target)));

    let (key, _) = RegKey::predef(HKEY_CURRENT_USER).create_subkey(LOG_SETTINGS_SUBKEY)?;
    let value = u32::from(target);
    if let Err(err) = key.set_value(LOGGING_VALUE_NAME, &value) {
        if err.raw_os_error() == Some(ERROR_ACCESS_DENIED) {
            log_ui(format!(
                r"Access denied writing HKCU\{LOG_SETTINGS_SUBKEY}\{LOGGING_VALUE_NAME}"
            ));
        }
        return Err(err);
    }

    if !target {
        match log_file_path() {
            Some(path) => match fs::remove_file(&path) {
                Ok(()) => log_ui(format!("Removed {}", path.display())),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => log_ui(format!("Cannot remove {}: {err}", path.display())),
            },
            None => log_ui("LOCALAPPDATA is not set; no log file to remove."),
        }
    }

    log_ui(format!("Logging is now {}.", state(target)));
    Ok(())
}
