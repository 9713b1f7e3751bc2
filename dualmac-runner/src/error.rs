//! Runner error types

use std::path::PathBuf;

use dualmac_sim::SimError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("could not determine settings path")]
    NoConfigDir,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unknown scenario preset '{0}'")]
    UnknownPreset(String),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Sim(#[from] SimError),
}
