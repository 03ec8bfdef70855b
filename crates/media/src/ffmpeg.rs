//! [`Transcoder`] backed by `ffmpeg`.

use std::{path::Path, time::Duration};

use {
    async_trait::async_trait,
    linkdrop_config::TranscoderConfig,
    linkdrop_queue::{ConvertError, Transcoder},
    tracing::info,
};

use crate::{
    error::Error,
    process::{failure_message, run_tool},
};

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    config: TranscoderConfig,
}

impl Ffmpeg {
    #[must_use]
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// H.264 video and AAC audio, overwriting `output`.
    #[must_use]
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.display().to_string(),
            "-c:v".into(),
            "libx264".into(),
            "-preset".into(),
            self.config.preset.clone(),
            "-c:a".into(),
            "aac".into(),
            "-y".into(),
            output.display().to_string(),
        ]
    }
}

#[async_trait]
impl Transcoder for Ffmpeg {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let result = run_tool(
            &self.config.binary,
            self.args(input, output),
            Duration::from_secs(self.config.timeout_secs),
        )
        .await?;

        if !result.success() {
            return Err(Error::Failed {
                program: self.config.binary.clone(),
                message: failure_message(&result.stderr, result.exit_code),
            }
            .into());
        }
        info!(input = %input.display(), output = %output.display(), "converted");
        Ok(())
    }
}
