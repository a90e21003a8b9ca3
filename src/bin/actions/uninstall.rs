use crate::utils::notify_shell_assoc::notify_shell_assoc;
use crate::utils::shell_cache::clear_shell_ext_cache_scope;
use flif_shell_win::log::log_cli;
use flif_shell_win::registration::{RegistryScope, registration_plan, remove_plan};
use std::io;

/// Removes our keys from both hives. The DLL file stays until Explorer
/// lets go of it.
pub fn uninstall() -> io::Result<()> {
    log_cli("Uninstall: start");
    // Removal does not depend on the DLL path.
    let plan = registration_plan("");
    for scope in [RegistryScope::LocalMachine, RegistryScope::CurrentUser] {
        remove_plan(scope, &plan);
        if let Err(err) = clear_shell_ext_cache_scope(scope) {
            log_cli(format!("Uninstall: {} cache not cleared ({err})", scope.name()));
        }
    }
    notify_shell_assoc("uninstall");
    println!("Uninstalled from HKLM and HKCU.");
    Ok(())
}
