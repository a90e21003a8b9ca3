use flif_shell_win::log::log_cli;
use flif_shell_win::registration::{RegistryScope, Role};
use std::io;
use winreg::enums::{KEY_READ, KEY_SET_VALUE};

const CACHED_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Shell Extensions\Cached";

/// Drops Explorer's cached verdicts about our CLSIDs so it loads the DLL
/// afresh. Returns the number of values removed.
pub fn clear_shell_ext_cache_scope(scope: RegistryScope) -> io::Result<usize> {
    let key = match scope
        .root()
        .open_subkey_with_flags(CACHED_KEY, KEY_READ | KEY_SET_VALUE)
    {
        Ok(k) => k,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log_cli(format!("{}: shell extension cache key missing", scope.name()));
            return Ok(0);
        }
        Err(err) => return Err(err),
    };

    let needles: Vec<String> = Role::ALL
        .iter()
        .map(|role| role.clsid().trim_matches(['{', '}']).to_ascii_uppercase())
        .collect();
    let to_delete: Vec<String> = key
        .enum_values()
        .filter_map(Result::ok)
        .map(|(name, _)| name)
        .filter(|name| {
            let upper = name.to_ascii_uppercase();
            needles.iter().any(|n| upper.contains(n))
        })
        .collect();

    let removed = to_delete
        .iter()
        .filter(|name| key.delete_value(name).is_ok())
        .count();
    log_cli(format!(
        "{}: cleared {} entries from Shell Extensions\\Cached",
        scope.name(),
        removed
    ));
    Ok(removed)
}
