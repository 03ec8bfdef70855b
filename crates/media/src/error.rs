use linkdrop_queue::{ConvertError, ExtractError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    /// The tool ran and exited non-zero; `message` is its most useful
    /// diagnostic line.
    #[error("{message}")]
    Failed { program: String, message: String },

    #[error("{message}")]
    InvalidOutput { message: String },
}

impl Error {
    #[must_use]
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    #[must_use]
    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput {
            message: message.into(),
        }
    }
}

impl From<Error> for ExtractError {
    fn from(err: Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<Error> for ConvertError {
    fn from(err: Error) -> Self {
        Self::new(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
