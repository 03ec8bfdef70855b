//! Configuration loading, validation, env substitution, and site policy lists.
//!
//! Config files: `linkdrop.toml`, `linkdrop.yaml`, or `linkdrop.json`
//! Searched in `./` then `~/.config/linkdrop/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod policy;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        TOKEN_ENV, apply_env_overrides, config_dir, find_config_file, load_config,
        load_resolved, resolve_token_file, try_discover_and_load,
    },
    policy::{SitePolicy, load_site_list},
    schema::{
        ExtractorConfig, LinkdropConfig, LoggingConfig, MetricsConfig, PipelineConfig,
        PolicyConfig, QueueConfig, TelegramConfig, TranscoderConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_file},
};
