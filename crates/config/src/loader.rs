use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::debug,
};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::LinkdropConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "linkdrop.toml",
    "linkdrop.yaml",
    "linkdrop.yml",
    "linkdrop.json",
];

/// Environment variable that overrides the configured bot token.
pub const TOKEN_ENV: &str = "LINKDROP_TELEGRAM_TOKEN";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<LinkdropConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./linkdrop.{toml,yaml,yml,json}`
/// 2. `~/.config/linkdrop/linkdrop.{toml,yaml,yml,json}`
///
/// Returns `Ok(None)` if no file is found. A file that exists but cannot be
/// read or parsed is an error, never a silent fall back to defaults.
pub fn try_discover_and_load() -> Result<Option<(PathBuf, LinkdropConfig)>> {
    discover_in(&search_dirs())
}

/// Load the explicit file (or the discovered one, or defaults when there is
/// none), then apply environment overrides and the token file.
///
/// Returns the path the config came from alongside it.
pub fn load_resolved(explicit: Option<&Path>) -> Result<(Option<PathBuf>, LinkdropConfig)> {
    let (path, mut config) = match explicit {
        Some(path) => (Some(path.to_path_buf()), load_config(path)?),
        None => match try_discover_and_load()? {
            Some((path, config)) => (Some(path), config),
            None => {
                debug!("no config file found, using defaults");
                (None, LinkdropConfig::default())
            },
        },
    };
    apply_env_overrides(&mut config);
    resolve_token_file(&mut config)?;
    Ok((path, config))
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    find_in(&search_dirs())
}

fn search_dirs() -> Vec<PathBuf> {
    // An empty path joins to a bare file name, i.e. the working directory.
    std::iter::once(PathBuf::new()).chain(config_dir()).collect()
}

fn find_in(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

fn discover_in(dirs: &[PathBuf]) -> Result<Option<(PathBuf, LinkdropConfig)>> {
    let Some(path) = find_in(dirs) else {
        return Ok(None);
    };
    debug!(path = %path.display(), "loading config");
    let config = load_config(&path)?;
    Ok(Some((path, config)))
}

/// Returns the user-global config directory (`~/.config/linkdrop/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "linkdrop").map(|d| d.config_dir().to_path_buf())
}

/// Apply environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut LinkdropConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(
    config: &mut LinkdropConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        debug!(env = TOKEN_ENV, "telegram token taken from environment");
        config.telegram.token = Secret::new(token.trim().to_string());
    }
}

/// Fill the bot token from `telegram.token_file` when no token is set inline.
pub fn resolve_token_file(config: &mut LinkdropConfig) -> Result<()> {
    if config.telegram.has_token() {
        return Ok(());
    }
    let Some(path) = config.telegram.token_file.clone() else {
        return Ok(());
    };
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read token file {}", path.display()))?;
    config.telegram.token = Secret::new(raw.trim().to_string());
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> Result<LinkdropConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
