mod config_commands;
mod doctor_commands;
mod run;

use std::path::{Path, PathBuf};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    linkdrop_config::LinkdropConfig,
    tracing::info,
    tracing_appender::non_blocking::WorkerGuard,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "linkdrop", about = "linkdrop: send a link, get the video back", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./linkdrop.toml, then ~/.config/linkdrop/).
    #[arg(long, global = true, env = "LINKDROP_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the bot (default when no subcommand is provided).
    Run,
    /// Validate the configuration file and report errors/warnings.
    CheckConfig {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Check that yt-dlp, ffmpeg and the scratch directory are usable.
    Doctor,
}

/// Initialise tracing: stdout (human or JSON) plus an optional plain-text
/// log file. The returned guard flushes the file writer on drop.
fn init_telemetry(cli: &Cli, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let (file_writer, guard) = match log_file.and_then(file_appender) {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
    });

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
    guard
}

fn file_appender(path: &Path) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path.file_name()?;
    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!("cannot create log directory {}: {e}", dir.display());
        return None;
    }
    let appender = tracing_appender::rolling::never(dir, name);
    Some(tracing_appender::non_blocking(appender))
}

/// Load the explicit config file or discover one, then apply environment
/// overrides and the token file. A file that exists but does not parse is an
/// error, never a silent fall back to defaults.
fn load_config(cli: &Cli) -> anyhow::Result<(Option<PathBuf>, LinkdropConfig)> {
    linkdrop_config::load_resolved(cli.config.as_deref())
        .context("failed to load configuration (run `linkdrop check-config` for details)")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // check-config reports load failures as diagnostics, so it loads the
    // file itself instead of bailing here.
    if let Some(Commands::CheckConfig { verbose }) = cli.command {
        let _log_guard = init_telemetry(&cli, None);
        return config_commands::check(cli.config.as_deref(), verbose);
    }

    let (config_path, config) = load_config(&cli)?;
    let log_file = match cli.command {
        None | Some(Commands::Run) => config.logging.file.as_deref(),
        _ => None,
    };
    let _log_guard = init_telemetry(&cli, log_file);
    match &config_path {
        Some(path) => info!(path = %path.display(), "config loaded"),
        None => info!("no config file found, using defaults"),
    }

    match cli.command {
        None | Some(Commands::Run) => {
            info!(version = env!("CARGO_PKG_VERSION"), "linkdrop starting");
            run::run(config).await
        },
        Some(Commands::Doctor) => doctor_commands::handle_doctor(&config).await,
        Some(Commands::CheckConfig { .. }) => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_runs_the_bot() {
        let cli = Cli::try_parse_from(["linkdrop"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_logs);
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from([
            "linkdrop",
            "check-config",
            "--verbose",
            "--config",
            "/etc/linkdrop.toml",
            "--json-logs",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Commands::CheckConfig { verbose: true }));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/linkdrop.toml")));
        assert!(cli.json_logs);
    }

    #[test]
    fn malformed_config_refuses_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkdrop.toml");
        std::fs::write(&path, "[queue\nmax_in_flight = \"lots\"").unwrap();
        let cli = Cli::try_parse_from(["linkdrop", "--config", path.to_str().unwrap()]).unwrap();
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn explicit_config_values_are_used() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkdrop.toml");
        std::fs::write(&path, "[queue]\nmax_in_flight = 7\n").unwrap();
        let cli = Cli::try_parse_from(["linkdrop", "--config", path.to_str().unwrap()]).unwrap();
        let (source, config) = load_config(&cli).unwrap();
        assert_eq!(source, Some(path));
        assert_eq!(config.queue.max_in_flight, 7);
    }

    #[test]
    fn explicit_config_must_exist() {
        let cli = Cli::try_parse_from(["linkdrop", "--config", "/nonexistent/linkdrop.toml"]).unwrap();
        assert!(load_config(&cli).is_err());
    }
}
