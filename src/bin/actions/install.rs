use crate::utils::notify_shell_assoc::notify_shell_assoc;
use crate::utils::shell_cache::clear_shell_ext_cache_scope;
use flif_shell_win::log::log_cli;
use flif_shell_win::registration::{RegistryScope, apply_plan, registration_plan, remove_plan};
use std::path::{Path, PathBuf};
use std::{env, fs, io};

const DLL_NAME: &str = "flif_shell_win.dll";
const INSTALL_DIR: &str = "flif-shell-win";

/// The DLL shipped next to the installer executable.
fn bundled_dll() -> io::Result<PathBuf> {
    let exe = env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| io::Error::other("installer path has no parent directory"))?;
    let path = dir.join(DLL_NAME);
    if !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found next to the installer", path.display()),
        ));
    }
    Ok(path)
}

fn install_dir(scope: RegistryScope) -> PathBuf {
    let (var, fallback) = match scope {
        RegistryScope::LocalMachine => ("PROGRAMFILES", r"C:\Program Files"),
        RegistryScope::CurrentUser => ("LOCALAPPDATA", r"C:\Users\Default\AppData\Local"),
    };
    env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(fallback))
        .join(INSTALL_DIR)
}

fn materialize(source: &Path, scope: RegistryScope) -> io::Result<PathBuf> {
    let dir = install_dir(scope);
    fs::create_dir_all(&dir)?;
    let target = dir.join(DLL_NAME);
    log_cli(format!(
        "Install [{}]: copying {} -> {}",
        scope.name(),
        source.display(),
        target.display()
    ));
    fs::copy(source, &target)?;
    Ok(target)
}

fn install_scope(source: &Path, scope: RegistryScope) -> io::Result<PathBuf> {
    let target = materialize(source, scope)?;
    let plan = registration_plan(&target.to_string_lossy());
    if let Err(err) = apply_plan(scope, &plan) {
        remove_plan(scope, &plan);
        return Err(err);
    }
    Ok(target)
}

/// Machine-wide when elevated, per-user otherwise.
pub fn install() -> io::Result<()> {
    log_cli("Install: start");
    let source = bundled_dll()?;

    let (scope, target) = match install_scope(&source, RegistryScope::LocalMachine) {
        Ok(target) => (RegistryScope::LocalMachine, target),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            log_cli(format!("Install: machine-wide denied ({err}); installing for this user"));
            let target = install_scope(&source, RegistryScope::CurrentUser)?;
            (RegistryScope::CurrentUser, target)
        }
        Err(err) => return Err(err),
    };

    for cached in [RegistryScope::CurrentUser, scope] {
        if let Err(err) = clear_shell_ext_cache_scope(cached) {
            log_cli(format!("Install: {} cache not cleared ({err})", cached.name()));
        }
    }
    notify_shell_assoc("install");

    println!(
        "Installed in {} from {}. Use 'Restart Explorer' to refresh thumbnails.",
        scope.name(),
        target.display()
    );
    Ok(())
}
