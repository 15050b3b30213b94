//! Pipeline-specific error types.

use thiserror::Error;

/// A single packet line that could not be turned into a frame.
///
/// Never fatal: the line is dropped and counted.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Malformed packet: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
