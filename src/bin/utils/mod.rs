pub mod notify_shell_assoc;
pub mod shell_cache;
