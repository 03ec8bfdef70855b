//! [`Extractor`] backed by the `yt-dlp` command line.

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use {
    async_trait::async_trait,
    linkdrop_config::ExtractorConfig,
    linkdrop_queue::{DownloadTarget, ExtractError, Extractor, MediaKind, Probe},
    serde::Deserialize,
    tracing::{debug, info},
};

use crate::{
    error::{Error, Result},
    process::{failure_message, run_tool},
};

/// Extensions of files yt-dlp is still writing or uses as scratch.
const TRANSIENT_EXTENSIONS: &[&str] = &["part", "ytdl", "temp"];

/// Availability values that mean the media cannot be fetched anonymously.
const RESTRICTED: &[&str] = &["needs_auth", "premium_only", "subscriber_only", "private"];

#[derive(Debug, Clone)]
pub struct YtDlp {
    config: ExtractorConfig,
}

impl YtDlp {
    #[must_use]
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Options shared by probe and download.
    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--no-playlist".to_string(), "--no-progress".to_string()];
        if self.config.use_netrc {
            args.push("--netrc".into());
        }
        if let Some(cookies) = &self.config.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.display().to_string());
        }
        if let Some(user_agent) = &self.config.user_agent {
            args.push("--user-agent".into());
            args.push(user_agent.clone());
        }
        args
    }

    #[must_use]
    pub fn probe_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["--dump-single-json".to_string()];
        args.extend(self.common_args());
        args.push(url.to_string());
        args
    }

    #[must_use]
    pub fn fetch_args(&self, url: &str, kind: MediaKind, target: &DownloadTarget) -> Vec<String> {
        let mut args = match kind {
            MediaKind::Video => vec![
                "-f".to_string(),
                self.config.video_format.clone(),
                "--merge-output-format".into(),
                "mp4".into(),
            ],
            MediaKind::Audio => vec![
                "-f".to_string(),
                "bestaudio/best".into(),
                "--extract-audio".into(),
                "--audio-format".into(),
                self.config.audio_format.clone(),
                "--audio-quality".into(),
                audio_quality_arg(&self.config.audio_quality),
            ],
        };
        args.extend(self.common_args());
        args.extend([
            "-o".to_string(),
            target.pattern().display().to_string(),
            "--print".into(),
            "after_move:filepath".into(),
            url.to_string(),
        ]);
        args
    }

    async fn run(&self, args: Vec<String>, timeout_secs: u64) -> Result<String> {
        let output = run_tool(&self.config.binary, &args, Duration::from_secs(timeout_secs)).await?;
        if !output.success() {
            return Err(Error::Failed {
                program: self.config.binary.clone(),
                message: failure_message(&output.stderr, output.exit_code),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn probe(&self, url: &str) -> std::result::Result<Probe, ExtractError> {
        let stdout = self
            .run(self.probe_args(url), self.config.probe_timeout_secs)
            .await?;
        let probe = parse_probe(&stdout)?;
        debug!(url, duration_secs = ?probe.duration_secs, available = probe.available, "probed");
        Ok(probe)
    }

    async fn fetch(
        &self,
        url: &str,
        kind: MediaKind,
        target: &DownloadTarget,
    ) -> std::result::Result<PathBuf, ExtractError> {
        let stdout = self
            .run(self.fetch_args(url, kind, target), self.config.download_timeout_secs)
            .await?;

        let printed = stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .map(PathBuf::from)
            .filter(|p| p.is_file());
        let path = match printed {
            Some(path) => path,
            None => locate_output(target).await?,
        };
        info!(url, kind = %kind, file = %path.display(), "download finished");
        Ok(path)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeInfo {
    duration: Option<f64>,
    availability: Option<String>,
    #[serde(default)]
    is_live: bool,
}

/// Read duration and availability from `--dump-single-json` output.
pub fn parse_probe(json: &str) -> Result<Probe> {
    let info: ProbeInfo = serde_json::from_str(json)
        .map_err(|e| Error::invalid_output(format!("unreadable metadata: {e}")))?;
    let restricted = info
        .availability
        .as_deref()
        .is_some_and(|a| RESTRICTED.contains(&a));
    Ok(Probe {
        duration_secs: info.duration,
        available: !restricted && !info.is_live,
    })
}

/// `320` means 320 kbit/s; yt-dlp reads bare numbers up to 10 as VBR levels.
fn audio_quality_arg(quality: &str) -> String {
    match quality.parse::<u32>() {
        Ok(n) if n > 10 => format!("{n}K"),
        _ => quality.to_string(),
    }
}

/// Find the finished file for `target` when yt-dlp did not print one: the
/// newest non-transient file carrying the job's stem.
async fn locate_output(target: &DownloadTarget) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(target.dir())
        .await
        .map_err(|e| Error::invalid_output(format!("cannot read {}: {e}", target.dir().display())))?;

    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if !target.owns(&path) || is_transient(&path) {
            continue;
        }
        let modified = entry
            .metadata()
            .await
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((modified, path));
    }

    candidates
        .into_iter()
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
        .ok_or_else(|| Error::invalid_output("download produced no file"))
}

fn is_transient(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TRANSIENT_EXTENSIONS.contains(&e))
}
