use crate::checkpoint::CheckpointError;
use crate::data::DataError;
use thiserror::Error;

/// Top-level failure of a pipeline run.
///
/// Every phase is fatal on failure: nothing is retried, nothing is
/// suppressed, and the error propagates to the caller untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid run configuration, detected before any phase starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// Missing or corrupt dataset files.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Checkpoint persistence or reload failure.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

impl From<pico_args::Error> for Error {
    fn from(err: pico_args::Error) -> Self {
        Self::Config(err.to_string())
    }
}
