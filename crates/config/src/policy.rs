//! Allow/block lists of URL fragments, read once at startup.

use std::path::Path;

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    schema::PolicyConfig,
};

/// Substring policy applied to every admitted URL.
///
/// An empty allow-list admits everything; the block-list always applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitePolicy {
    pub allowed: Vec<String>,
    pub blocked: Vec<String>,
}

impl SitePolicy {
    #[must_use]
    pub fn new(allowed: Vec<String>, blocked: Vec<String>) -> Self {
        Self { allowed, blocked }
    }

    /// Load both lists from the paths named in `config`. A missing file is an
    /// empty list; any other read error is returned.
    pub fn load(config: &PolicyConfig) -> Result<Self> {
        let allowed = load_site_list(&config.allowed_sites_file)?;
        let blocked = load_site_list(&config.blocked_sites_file)?;
        info!(
            allowed = allowed.len(),
            blocked = blocked.len(),
            "site policy loaded"
        );
        Ok(Self { allowed, blocked })
    }

    #[must_use]
    pub fn is_allowed(&self, url: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|site| url.contains(site.as_str()))
    }

    #[must_use]
    pub fn is_blocked(&self, url: &str) -> bool {
        self.blocked.iter().any(|site| url.contains(site.as_str()))
    }
}

/// Read a newline-delimited list of URL fragments.
///
/// Lines are trimmed; blank lines and `#` comments are skipped.
pub fn load_site_list(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(parse_site_list(&raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "site list not found, treating as empty");
            Ok(Vec::new())
        },
        Err(e) => Err(Error::read(path, e)),
    }
}

fn parse_site_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
