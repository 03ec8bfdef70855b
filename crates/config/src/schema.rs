//! Config schema for the bot, the job queue, and the media pipeline.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkdropConfig {
    pub telegram: TelegramConfig,
    pub queue: QueueConfig,
    pub pipeline: PipelineConfig,
    pub extractor: ExtractorConfig,
    pub transcoder: TranscoderConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Telegram bot credentials and polling behaviour.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,

    /// Read the token from this file when `token` is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,

    /// Long-poll timeout passed to `getUpdates` (seconds).
    pub poll_timeout_secs: u32,

    /// Thread replies (acks, media, errors) to the originating message.
    pub reply_to_message: bool,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"[REDACTED]")
            .field("token_file", &self.token_file)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            token_file: None,
            poll_timeout_secs: 30,
            reply_to_message: true,
        }
    }
}

impl TelegramConfig {
    #[must_use]
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Dispatch cadence and concurrency policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueueConfig {
    /// Interval between dispatch scans.
    pub dispatch_interval_ms: u64,
    /// Maximum concurrently running pipelines. `0` means unbounded.
    pub max_in_flight: usize,
    /// Grace period for in-flight jobs on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dispatch_interval_ms: 500,
            max_in_flight: 0,
            shutdown_grace_secs: 30,
        }
    }
}

/// Per-job pipeline limits and scratch space.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Shared scratch directory for downloads and conversions.
    pub tmp_dir: PathBuf,
    /// Videos longer than this are refused before download.
    pub max_video_duration_secs: u64,
    /// Container delivered for video jobs; other containers get transcoded.
    pub video_container: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tmp_dir: PathBuf::from("tmp"),
            max_video_duration_secs: 360,
            video_container: "mp4".into(),
        }
    }
}

/// `yt-dlp` invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractorConfig {
    pub binary: String,
    pub video_format: String,
    pub audio_format: String,
    pub audio_quality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies_file: Option<PathBuf>,
    pub use_netrc: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub probe_timeout_secs: u64,
    pub download_timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".into(),
            video_format: "bv*[height<=1080]+ba/b[height<=1080]/bv*[width<=1080]+ba/b[width<=1080]"
                .into(),
            audio_format: "mp3".into(),
            audio_quality: "320".into(),
            cookies_file: None,
            use_netrc: true,
            user_agent: Some(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                    .into(),
            ),
            probe_timeout_secs: 60,
            download_timeout_secs: 900,
        }
    }
}

/// `ffmpeg` invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TranscoderConfig {
    pub binary: String,
    pub preset: String,
    pub timeout_secs: u64,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".into(),
            preset: "fast".into(),
            timeout_secs: 900,
        }
    }
}

/// Site policy list locations and the audio modifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    pub allowed_sites_file: PathBuf,
    pub blocked_sites_file: PathBuf,
    /// Token that switches a request to audio-only (matched case-insensitively).
    pub audio_flag: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allowed_sites_file: PathBuf::from("allowed_sites.txt"),
            blocked_sites_file: PathBuf::from("blocked_sites.txt"),
            audio_flag: "-a".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append logs to this file in addition to stdout. `None` disables it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("linkdrop.log")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Address for the Prometheus scrape endpoint.
    pub bind: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: "127.0.0.1:9464".into(),
        }
    }
}
