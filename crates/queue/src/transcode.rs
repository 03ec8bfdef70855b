//! Boundary to the transcoding tool.

use std::path::Path;

use async_trait::async_trait;

use crate::error::ConvertError;

/// Converts a downloaded file into the delivered container.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write a converted copy of `input` to `output`.
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// Whether `path` already has `container` as its extension (case-insensitive).
#[must_use]
pub fn has_container(path: &Path, container: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(container))
}
