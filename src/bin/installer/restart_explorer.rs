use flif_shell_win::log::log_cli;
use std::io;
use std::process::{Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

const EXIT_TIMEOUT: Duration = Duration::from_secs(5);
const START_TIMEOUT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(250);

fn quiet(cmd: &mut Command) -> &mut Command {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
}

fn explorer_count() -> usize {
    let output = Command::new("tasklist")
        .args(["/FI", "IMAGENAME eq explorer.exe", "/FO", "CSV", "/NH"])
        .stderr(Stdio::null())
        .output();
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .filter(|line| line.contains("explorer.exe"))
            .count(),
        _ => 0,
    }
}

/// Polls until `done` holds or `timeout` passes. Returns whether it held.
fn wait_until(timeout: Duration, done: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if done() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        sleep(POLL);
    }
}

fn launch() -> io::Result<()> {
    if let Err(err) = quiet(&mut Command::new("explorer.exe")).spawn() {
        log_cli(format!("Restart Explorer: direct spawn failed ({err}), trying cmd"));
        quiet(Command::new("cmd").args(["/C", "start", "", "explorer.exe"]))
            .spawn()
            .map_err(|e| io::Error::other(format!("cannot launch explorer.exe: {e}")))?;
    }
    Ok(())
}

/// Kills and relaunches Explorer so it drops cached handler instances.
pub fn restart_explorer() -> io::Result<()> {
    log_cli(format!(
        "Restart Explorer: {} instance(s) running",
        explorer_count()
    ));

    match quiet(Command::new("taskkill").args(["/F", "/IM", "explorer.exe"])).status() {
        Ok(status) if status.success() => {}
        Ok(status) => log_cli(format!("Restart Explorer: taskkill exit {:?}", status.code())),
        Err(err) => log_cli(format!("Restart Explorer: taskkill failed: {err}")),
    }

    if !wait_until(EXIT_TIMEOUT, || explorer_count() == 0) {
        log_cli("Restart Explorer: explorer.exe still running, continuing");
    }

    launch()?;

    if wait_until(START_TIMEOUT, || explorer_count() > 0) {
        log_cli("Restart Explorer: explorer.exe is back");
    } else {
        log_cli("Restart Explorer: explorer.exe did not reappear in time");
    }
    println!("Explorer restarted.");
    Ok(())
}
