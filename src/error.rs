use std::path::PathBuf;

use thiserror::Error;

/// Failures the binaries need to tell apart; everything transient is
/// logged and absorbed at the call site instead of surfacing here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("credential {0} missing from the env file")]
    CredentialMissing(&'static str),

    #[error("bearer token rejected by the chart endpoint (HTTP 401)")]
    Unauthorized,

    #[error("snapshot file not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),

    #[error("env file error: {0}")]
    EnvFile(#[from] dotenv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
