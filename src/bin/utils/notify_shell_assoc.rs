use flif_shell_win::log::log_cli;
use windows::Win32::UI::Shell::{SHChangeNotify, SHCNE_ASSOCCHANGED, SHCNF_IDLIST};

/// Tells Explorer that file associations changed.
pub fn notify_shell_assoc(reason: &str) {
    log_cli(format!("Shell notify ({reason}): SHChangeNotify(SHCNE_ASSOCCHANGED)"));
    unsafe {
        SHChangeNotify(SHCNE_ASSOCCHANGED, SHCNF_IDLIST, None, None);
    }
}
