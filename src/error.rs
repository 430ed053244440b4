//! Error taxonomy for the daemon: configuration and
//! startup failures abort the process, transient interface errors are
//! logged and swallowed, fatal runtime errors abort.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("startup error: {0}")]
    Startup(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
