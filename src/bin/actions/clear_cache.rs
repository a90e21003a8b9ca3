use flif_shell_win::log::log_cli;
use std::path::PathBuf;
use std::{env, fs, io};

/// Deletes Explorer's `thumbcache_*.db` files for the current user.
pub fn clear_cache() -> io::Result<()> {
    log_cli("Clear cache: start");
    let Some(local) = env::var_os("LOCALAPPDATA") else {
        println!("LOCALAPPDATA is not set.");
        log_cli("Clear cache: LOCALAPPDATA not set");
        return Ok(());
    };
    let dir = PathBuf::from(local).join(r"Microsoft\Windows\Explorer");
    if !dir.is_dir() {
        println!("No thumbnail cache dir: {}", dir.display());
        return Ok(());
    }

    let mut removed = 0usize;
    let mut busy = 0usize;
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_cache = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|name| name.starts_with("thumbcache_"));
        if !path.is_file() || !is_cache {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(_) => busy += 1,
        }
    }

    println!("Removed {} files in {}", removed, dir.display());
    if busy > 0 {
        println!("{busy} files are in use; restart Explorer and try again.");
    }
    log_cli(format!(
        "Clear cache: removed {removed}, skipped {busy} in {}",
        dir.display()
    ));
    Ok(())
}
