use thiserror::Error;

/// Why an inbound message did not become a job.
///
/// Rejections never reach the queue and never start a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no URL found in message")]
    NoUrlFound,

    #[error("site is not on the allow-list")]
    NotAllowed,

    #[error("site is blocked")]
    Blocked,
}

impl Rejection {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoUrlFound => "no_url",
            Self::NotAllowed => "not_allowed",
            Self::Blocked => "blocked",
        }
    }
}

/// Terminal failure of a dispatched job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("media is {duration_secs:.0}s long, the limit is {limit_secs}s")]
    DurationExceeded { duration_secs: f64, limit_secs: u64 },

    #[error("Download failed: {message}")]
    ExtractionFailed { message: String },

    #[error("Conversion failed: {message}")]
    ConversionFailed { message: String },

    #[error("Delivery failed: {message}")]
    DeliveryFailed { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PipelineError {
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DurationExceeded { .. } => "duration_exceeded",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::ConversionFailed { .. } => "conversion_failed",
            Self::DeliveryFailed { .. } => "delivery_failed",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<ExtractError> for PipelineError {
    fn from(err: ExtractError) -> Self {
        Self::ExtractionFailed {
            message: err.message,
        }
    }
}

impl From<ConvertError> for PipelineError {
    fn from(err: ConvertError) -> Self {
        Self::ConversionFailed {
            message: err.message,
        }
    }
}

impl From<TransportError> for PipelineError {
    fn from(err: TransportError) -> Self {
        Self::DeliveryFailed {
            message: err.message,
        }
    }
}

/// Failure reported by the extraction tool, message kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ExtractError {
    pub message: String,
}

impl ExtractError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by the transcoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConvertError {
    pub message: String,
}

impl ConvertError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure reported by the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn external(context: &str, source: impl std::fmt::Display) -> Self {
        Self {
            message: format!("{context}: {source}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_errors_map_to_stage_failures() {
        let err: PipelineError = ExtractError::new("HTTP Error 404").into();
        assert_eq!(err.kind(), "extraction_failed");
        assert_eq!(err.to_string(), "Download failed: HTTP Error 404");

        let err: PipelineError = ConvertError::new("ffmpeg exited with 1").into();
        assert_eq!(err.kind(), "conversion_failed");

        let err: PipelineError = TransportError::new("Request Entity Too Large").into();
        assert_eq!(err.kind(), "delivery_failed");
    }

    #[test]
    fn duration_message_is_readable() {
        let err = PipelineError::DurationExceeded {
            duration_secs: 725.4,
            limit_secs: 360,
        };
        assert_eq!(err.to_string(), "media is 725s long, the limit is 360s");
    }
}
