//! `linkdrop doctor`: check the external tools, the credentials and the
//! scratch directory before starting the bot.
//!
//! Prints a structured report with `[ok]`, `[warn]`, `[fail]`, `[skip]`, or
//! `[info]` status indicators per item.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    anyhow::Result,
    linkdrop_config::{LinkdropConfig, TOKEN_ENV, validate::Severity},
    linkdrop_media::process::run_tool,
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-check result used to build the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Skip,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Skip => DIM,
            Self::Info => CYAN,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }
}

// ── Printing ────────────────────────────────────────────────────────────────

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub async fn handle_doctor(config: &LinkdropConfig) -> Result<()> {
    eprintln!("{BOLD}linkdrop doctor{RESET}");
    eprintln!("{BOLD}==============={RESET}\n");

    let sections = vec![
        check_config(config),
        check_tools(config).await,
        check_directories(config),
        check_policy(config),
    ];

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

// ── Config ──────────────────────────────────────────────────────────────────

fn check_config(config: &LinkdropConfig) -> Section {
    let label = linkdrop_config::find_config_file()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "default config".into());
    let mut section = Section::new(format!("Config ({label})"));

    if config.telegram.has_token() {
        let source = if std::env::var_os(TOKEN_ENV).is_some() {
            TOKEN_ENV.to_string()
        } else if let Some(ref file) = config.telegram.token_file {
            file.display().to_string()
        } else {
            "config file".to_string()
        };
        section.push(Status::Ok, format!("Bot token present (from {source})"));
    } else {
        section.push(
            Status::Fail,
            format!("No bot token (set telegram.token, telegram.token_file or {TOKEN_ENV})"),
        );
    }

    let result = linkdrop_config::validate(config);
    let mut clean = true;
    for d in result
        .diagnostics
        .iter()
        .filter(|d| d.path != "telegram.token")
    {
        let status = match d.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
            Severity::Info => Status::Info,
        };
        clean &= status == Status::Info;
        section.push(status, format!("{}: {}", d.path, d.message));
    }
    if clean {
        section.push(Status::Ok, "Configuration values are valid");
    }

    section
}

// ── External tools ──────────────────────────────────────────────────────────

async fn check_tools(config: &LinkdropConfig) -> Section {
    let mut section = Section::new("External tools");
    check_tool(&mut section, "yt-dlp", &config.extractor.binary, "--version").await;
    check_tool(&mut section, "ffmpeg", &config.transcoder.binary, "-version").await;

    match &config.extractor.cookies_file {
        Some(path) if path.is_file() => {
            section.push(Status::Ok, format!("Cookies file: {}", path.display()));
        },
        Some(path) => {
            section.push(
                Status::Warn,
                format!("Cookies file missing: {}", path.display()),
            );
        },
        None => section.push(Status::Skip, "No cookies file configured"),
    }

    section
}

async fn check_tool(section: &mut Section, name: &str, binary: &str, version_flag: &str) {
    let Some(path) = locate_binary(binary) else {
        section.push(
            Status::Fail,
            format!("{name}: \"{binary}\" not found in PATH"),
        );
        return;
    };

    let program = path.to_string_lossy();
    match run_tool(&program, [version_flag], VERSION_TIMEOUT).await {
        Ok(out) if out.success() => {
            let version = first_line(&out.stdout).unwrap_or("unknown version");
            section.push(
                Status::Ok,
                format!("{name}: {} ({version})", path.display()),
            );
        },
        Ok(out) => section.push(
            Status::Warn,
            format!(
                "{name}: {} exited with status {} on {version_flag}",
                path.display(),
                out.exit_code
            ),
        ),
        Err(e) => section.push(Status::Fail, format!("{name}: {e}")),
    }
}

/// Absolute paths are checked directly; bare names are looked up on `PATH`.
fn locate_binary(binary: &str) -> Option<PathBuf> {
    let candidate = PathBuf::from(binary);
    if candidate.is_absolute() {
        return candidate.is_file().then_some(candidate);
    }
    which::which(binary).ok()
}

fn first_line(output: &str) -> Option<&str> {
    output.lines().map(str::trim).find(|l| !l.is_empty())
}

// ── Directories ─────────────────────────────────────────────────────────────

fn check_directories(config: &LinkdropConfig) -> Section {
    let mut section = Section::new("Directories");

    let tmp = &config.pipeline.tmp_dir;
    if tmp.is_dir() {
        section.push(Status::Ok, format!("Scratch directory: {}", tmp.display()));
        check_writable(&mut section, tmp, "Scratch directory");
    } else {
        section.push(
            Status::Info,
            format!(
                "Scratch directory {} not found (created on start)",
                tmp.display()
            ),
        );
    }

    if let Some(ref log) = config.logging.file {
        let dir = log
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if dir.is_dir() {
            check_writable(&mut section, dir, "Log directory");
            section.push(Status::Ok, format!("Log file: {}", log.display()));
        } else {
            section.push(
                Status::Info,
                format!("Log directory {} not found (created on start)", dir.display()),
            );
        }
    } else {
        section.push(Status::Skip, "File logging disabled");
    }

    section
}

fn check_writable(section: &mut Section, dir: &Path, label: &str) {
    let probe = dir.join(".linkdrop-doctor-probe");
    match std::fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = std::fs::remove_file(&probe);
        },
        Err(e) => {
            section.push(Status::Fail, format!("{label} is not writable: {e}"));
        },
    }
}

// ── Site policy ─────────────────────────────────────────────────────────────

fn check_policy(config: &LinkdropConfig) -> Section {
    let mut section = Section::new("Site policy");
    check_site_list(
        &mut section,
        &config.policy.allowed_sites_file,
        "Allow-list",
        "every site is allowed",
    );
    check_site_list(
        &mut section,
        &config.policy.blocked_sites_file,
        "Block-list",
        "nothing is blocked",
    );
    section
}

fn check_site_list(section: &mut Section, path: &Path, label: &str, when_empty: &str) {
    match linkdrop_config::load_site_list(path) {
        Ok(sites) if sites.is_empty() => {
            section.push(
                Status::Info,
                format!("{label} {} is empty ({when_empty})", path.display()),
            );
        },
        Ok(sites) => {
            section.push(
                Status::Ok,
                format!("{label} {}: {} entries", path.display(), sites.len()),
            );
        },
        Err(e) => section.push(Status::Fail, format!("{label}: {e}")),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
