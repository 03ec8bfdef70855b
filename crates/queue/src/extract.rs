//! Boundary to the media extraction tool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    error::ExtractError,
    job::{JobId, MediaKind},
};

/// Metadata returned before committing to a download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Probe {
    /// Reported duration; `None` when the site does not publish one.
    pub duration_secs: Option<f64>,
    pub available: bool,
}

/// Unique per-job location in the shared scratch directory.
///
/// Every file the job creates starts with `stem`, which is what cleanup
/// relies on to find intermediates the extractor leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    dir: PathBuf,
    stem: String,
}

impl DownloadTarget {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    /// `{dir}/{kind}_{job id}`.
    #[must_use]
    pub fn for_job(dir: impl Into<PathBuf>, id: JobId, kind: MediaKind) -> Self {
        Self::new(dir, format!("{kind}_{}", id.simple()))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Output template with an extension placeholder, e.g.
    /// `tmp/video_3f2a….%(ext)s`.
    #[must_use]
    pub fn pattern(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.stem))
    }

    /// A sibling file owned by the same job, e.g. `tmp/video_3f2a…_converted.mp4`.
    #[must_use]
    pub fn derived(&self, suffix: &str, extension: &str) -> PathBuf {
        self.dir.join(format!("{}_{suffix}.{extension}", self.stem))
    }

    /// Whether `path` was created for this job.
    #[must_use]
    pub fn owns(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&self.stem))
    }
}

/// The extraction tool: probes metadata and downloads media.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn probe(&self, url: &str) -> Result<Probe, ExtractError>;

    /// Download `url` to `target` and return the path of the produced file.
    async fn fetch(
        &self,
        url: &str,
        kind: MediaKind,
        target: &DownloadTarget,
    ) -> Result<PathBuf, ExtractError>;
}
