//! Load hook rules from file and environment.

use std::path::{Path, PathBuf};

use hookabi_core::GuestConfig;
use tracing::{debug, info};

/// Rule file path override.
pub const CONFIG_ENV: &str = "HOOKABI_CONFIG";
/// Comma-separated entry point names to leave unexported.
pub const DISABLED_ENV: &str = "HOOKABI_DISABLED";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Load config: defaults, then rule file, then env.
///
/// File: `explicit`, else `$HOOKABI_CONFIG`, else the first of
/// `~/.config/hookabi/hooks.toml` and `/etc/hookabi/hooks.toml` that exists.
/// An explicit or env path must exist; a searched one may be missing.
pub fn load(explicit: Option<&Path>) -> Result<GuestConfig, ConfigError> {
    let chosen = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let mut c = match chosen {
        Some(p) => load_file(&p)?,
        None => search()?.unwrap_or_default(),
    };
    if let Ok(list) = std::env::var(DISABLED_ENV) {
        apply_disabled(&mut c, &list);
    }
    Ok(c)
}

/// Parse a rule file.
pub fn load_file(path: &Path) -> Result<GuestConfig, ConfigError> {
    let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let c = parse(&s, path)?;
    info!(path = %path.display(), hooks = c.hooks.len(), "hook rules loaded");
    Ok(c)
}

pub fn parse(s: &str, path: &Path) -> Result<GuestConfig, ConfigError> {
    toml::from_str::<GuestConfig>(s).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge a comma-separated disable list into `c`, skipping blanks and repeats.
pub fn apply_disabled(c: &mut GuestConfig, list: &str) {
    for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if !c.is_disabled(name) {
            c.disabled.push(name.to_string());
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/hookabi/hooks.toml"));
    }
    out.push(PathBuf::from("/etc/hookabi/hooks.toml"));
    out
}

fn search() -> Result<Option<GuestConfig>, ConfigError> {
    match config_paths().into_iter().find(|p| p.exists()) {
        Some(p) => load_file(&p).map(Some),
        None => {
            debug!("no rule file found, using built-in rules");
            Ok(None)
        }
    }
}
