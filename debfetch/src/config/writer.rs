//! INI serialization logic for converting `ConfigFile` → INI string.

use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[methods]
; Directory holding one executable per method name (http, ftp, file, ...)
directory = {}
; Comma separated key=value items sent to methods that ask for configuration.
; Empty sends Dir=/
config_items = {}
; Longest status block accepted from a method, in bytes
max_block_len = {}

[logging]
; 0 = quiet, 1 = info, 2 = protocol chatter, 3 = debug, 4+ = trace
verbosity = {}
directory = {}
file = {}
"#,
        path_to_string(&config.methods.directory),
        config.methods.config_items.join(", "),
        config.methods.max_block_len,
        config.logging.verbosity,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Convert a path to a string, replacing the home directory with `~`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
