#[cfg(windows)]
#[path = "actions/mod.rs"]
mod actions;
#[cfg(windows)]
#[path = "installer/restart_explorer.rs"]
mod restart_explorer;
#[cfg(windows)]
#[path = "utils/mod.rs"]
mod utils;

#[cfg(windows)]
fn main() -> std::io::Result<()> {
    menu::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("flif-shell-win-installer only runs on Windows.");
    std::process::exit(1);
}

#[cfg(windows)]
mod menu {
    use crate::actions::{
        clear_cache::clear_cache, install::install, status::status,
        toggle_logging::toggle_logging, uninstall::uninstall,
    };
    use crate::restart_explorer::restart_explorer;
    use dialoguer::console::{Term, style};
    use dialoguer::theme::ColorfulTheme;
    use dialoguer::Select;
    use flif_shell_win::log::log_cli;
    use std::io::{self, Write};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Action {
        Install,
        Uninstall,
        Status,
        ToggleLogging,
        ClearThumbCache,
        RestartExplorer,
        Exit,
    }

    impl Action {
        const ALL: [Action; 7] = [
            Action::Install,
            Action::Uninstall,
            Action::Status,
            Action::ToggleLogging,
            Action::ClearThumbCache,
            Action::RestartExplorer,
            Action::Exit,
        ];

        fn title(self) -> &'static str {
            match self {
                Action::Install => "Install",
                Action::Uninstall => "Uninstall",
                Action::Status => "Status",
                Action::ToggleLogging => "Toggle logging",
                Action::ClearThumbCache => "Clear thumbnail cache",
                Action::RestartExplorer => "Restart Explorer",
                Action::Exit => "Exit",
            }
        }

        fn execute(self) -> io::Result<()> {
            match self {
                Action::Install => install(),
                Action::Uninstall => uninstall(),
                Action::Status => status(),
                Action::ToggleLogging => toggle_logging(),
                Action::ClearThumbCache => clear_cache(),
                Action::RestartExplorer => restart_explorer(),
                Action::Exit => Ok(()),
            }
        }
    }

    fn menu_theme() -> ColorfulTheme {
        let mut t = ColorfulTheme::default();
        t.active_item_prefix = style(">".to_string());
        t.inactive_item_prefix = style(" ".to_string());
        t.picked_item_prefix = style(">".to_string());
        t.unpicked_item_prefix = style(" ".to_string());
        t.prompt_prefix = style("$".to_string());
        t.success_prefix = style(">".to_string());
        t.error_prefix = style("!".to_string());
        t
    }

    fn choose_action() -> io::Result<Action> {
        let items: Vec<&str> = Action::ALL.iter().map(|a| a.title()).collect();
        let idx = Select::with_theme(&menu_theme())
            .with_prompt("FLIF shell extension installer")
            .items(&items)
            .default(0)
            .interact_on(&Term::stdout())
            .map_err(|err| io::Error::other(err.to_string()))?;
        Ok(Action::ALL.get(idx).copied().unwrap_or(Action::Exit))
    }

    fn pause(msg: &str) {
        print!("{msg}");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        let _ = io::stdin().read_line(&mut buf);
    }

    pub fn run() -> io::Result<()> {
        log_cli("Installer started");
        loop {
            let action = choose_action()?;
            log_cli(format!("Menu selection: {}", action.title()));

            if action == Action::Exit {
                log_cli("Installer exiting");
                break;
            }

            match action.execute() {
                Ok(()) => log_cli(format!("Action '{}' completed", action.title())),
                Err(err) => {
                    log_cli(format!("Action '{}' failed: {}", action.title(), err));
                    println!("{} failed: {}", action.title(), err);
                }
            }

            pause("\nPress Enter to return to the menu...");
        }
        Ok(())
    }
}
