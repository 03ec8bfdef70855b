//! Semantic checks on a loaded configuration.

use std::path::{Path, PathBuf};

use crate::{
    loader::{find_config_file, load_resolved},
    schema::LinkdropConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "queue.dispatch_interval_ms"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    /// The file that was checked; `None` when only defaults were validated.
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Check a config for values the bot cannot run with.
#[must_use]
pub fn validate(config: &LinkdropConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    if !config.telegram.has_token() && config.telegram.token_file.is_none() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "telegram.token",
            "no bot token configured (set telegram.token, telegram.token_file or LINKDROP_TELEGRAM_TOKEN)",
        ));
    }
    if config.telegram.poll_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "telegram.poll_timeout_secs",
            "0 disables long polling and hammers the Bot API",
        ));
    }
    if config.queue.dispatch_interval_ms == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "queue.dispatch_interval_ms",
            "dispatch interval must be greater than zero",
        ));
    }
    if config.queue.max_in_flight == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            "queue.max_in_flight",
            "concurrent pipelines are unbounded",
        ));
    }
    if config.pipeline.max_video_duration_secs == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "pipeline.max_video_duration_secs",
            "every video with a known duration will be refused",
        ));
    }
    let container = config.pipeline.video_container.trim();
    if container.is_empty() || container.contains('.') {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "pipeline.video_container",
            "expected a bare extension such as \"mp4\"",
        ));
    }
    if config.policy.audio_flag.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "policy.audio_flag",
            "audio flag must not be empty",
        ));
    } else if config.policy.audio_flag.split_whitespace().count() > 1 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "policy.audio_flag",
            "audio flag must be a single token",
        ));
    }
    if let Some(ref cookies) = config.extractor.cookies_file
        && !cookies.exists()
    {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "extractor.cookies_file",
            format!("{} does not exist", cookies.display()),
        ));
    }
    if config.metrics.enabled
        && config
            .metrics
            .bind
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "metrics.bind",
            format!("invalid socket address: {}", config.metrics.bind),
        ));
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Load the explicit (or discovered) config file exactly as the bot does at
/// startup and validate it.
///
/// Read, parse and token-file failures become a single `Error` diagnostic.
pub fn validate_file(explicit: Option<&Path>) -> ValidationResult {
    match load_resolved(explicit) {
        Ok((config_path, config)) => ValidationResult {
            config_path,
            ..validate(&config)
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::new(Severity::Error, "", e.to_string())],
            config_path: explicit.map(Path::to_path_buf).or_else(find_config_file),
        },
    }
}
