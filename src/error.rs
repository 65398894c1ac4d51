//! Errors raised while building and sending a FastCGI request.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Nothing is attached to the backend channel to consume written records.
    #[error("no protocol handler attached to the FastCGI connection")]
    InvalidConnectionState,

    /// The document root containing the script could not be determined.
    #[error("cannot resolve document root for {}", .0.display())]
    UnresolvedScriptRoot(PathBuf),

    /// A single name-value pair is too large for one Params record.
    #[error("parameter {name} is too long: {len} bytes of record content")]
    ParamTooLong { name: String, len: usize },

    /// The request's records were already handed to the connection.
    #[error("FastCGI request was already sent")]
    AlreadySent,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
