//! Error types for cardfx.
//!
//! The sequencer itself never fails once constructed: `enqueue` is total.
//! These errors cover the edges around it (configuration, choreography
//! files, event streams, runtime setup).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("bad choreography: {0}")]
    Choreography(String),

    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
