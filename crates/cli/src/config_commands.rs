use std::path::Path;

use {
    anyhow::Result,
    linkdrop_config::validate::{Diagnostic, Severity, ValidationResult, validate_file},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

pub fn check(explicit: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate_file(explicit);
    for line in report(&result, verbose) {
        eprintln!("{line}");
    }
    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

/// Full `check-config` output: the file header, one line per shown
/// diagnostic and the summary.
fn report(result: &ValidationResult, verbose: bool) -> Vec<String> {
    let mut out = vec![match &result.config_path {
        Some(path) => format!("Checking {}\n", path.display()),
        None => "No config file found; checking defaults.\n".to_string(),
    }];
    let lines = render(result, verbose);
    let shown = !lines.is_empty();
    out.extend(lines);
    if shown {
        out.push(String::new());
    }
    out.push(summary(result));
    out
}

fn render(result: &ValidationResult, verbose: bool) -> Vec<String> {
    result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .map(render_one)
        .collect()
}

fn render_one(d: &Diagnostic) -> String {
    let color = match d.severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
        Severity::Info => CYAN,
    };
    if d.path.is_empty() {
        format!("  {BOLD}{color}{}{RESET} {}", d.severity, d.message)
    } else {
        format!("  {BOLD}{color}{}{RESET} {}: {}", d.severity, d.path, d.message)
    }
}

fn summary(result: &ValidationResult) -> String {
    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        "No issues found.".to_string()
    } else {
        format!("{errors} error(s), {warnings} warning(s)")
    }
}
