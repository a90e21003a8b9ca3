pub mod clear_cache;
pub mod install;
pub mod status;
pub mod toggle_logging;
pub mod uninstall;
