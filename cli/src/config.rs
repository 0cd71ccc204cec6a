use std::path::{Path, PathBuf};

use freeze::FreezeOptions;
use serde::Deserialize;

pub const CONFIG_FILE: &str = "mdfreeze.toml";

/// Contents of `mdfreeze.toml`.
///
/// ```toml
/// vault = "notes"
///
/// [freeze]
/// max-passes = 50
/// context = "outline"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory embed targets are looked up in. Relative to the config file.
    pub vault: Option<PathBuf>,
    pub freeze: FreezeOptions,
}

impl Config {
    pub fn parse(text: &str, base: &Path) -> Result<Config, String> {
        let mut config: Config =
            toml::from_str(text).map_err(|e| format!("TOML parse error: {}", e))?;
        if let Some(vault) = &config.vault {
            if vault.is_relative() {
                config.vault = Some(base.join(vault));
            }
        }
        Ok(config)
    }

    /// Load `explicit` if given, otherwise `mdfreeze.toml` next to `input`
    /// when it exists. A missing implicit file is not an error.
    pub fn load(explicit: Option<&Path>, input: &Path) -> Result<Config, String> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (input_dir(input).join(CONFIG_FILE), false),
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Config::default());
            }
            Err(e) => return Err(format!("cannot read '{}': {}", path.display(), e)),
        };

        let base = path.parent().unwrap_or(Path::new("."));
        Config::parse(&text, base).map_err(|e| format!("{}: {}", path.display(), e))
    }
}

/// Directory containing `input`, `.` for a bare file name.
pub fn input_dir(input: &Path) -> PathBuf {
    match input.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
