//! Error types for the conversation pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvoiceError {
    #[error("{provider} synthesis failed: {message}")]
    Synthesis {
        provider: &'static str,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Speech API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("{0} is already in progress")]
    Busy(&'static str),

    #[error("Not every turn has audio yet (missing turns: {missing:?})")]
    NotReady { missing: Vec<usize> },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
