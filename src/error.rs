//! Crate-wide error taxonomy.
//!
//! Callers distinguish failure kinds by variant, never by message text.
//! The cardinal rule is that an error is tagged where it originates: I/O
//! on a caller-supplied source or sink becomes [`Error::CallerStream`] at
//! the read/write call itself, while socket, framing, and protocol-status
//! failures become [`Error::Infrastructure`]. Neither is ever reclassified
//! as the other further up the stack.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Coordinator or storage-node reachability, wire framing, or
    /// protocol-status failure. Callers may retry across replicas or
    /// endpoints.
    #[error("infrastructure failure: {message}")]
    Infrastructure {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    /// The target path does not exist. Never retried across endpoints.
    #[error("not found: {0}")]
    NotFound(String),

    /// An error originating in a caller-supplied source or sink,
    /// propagated verbatim.
    #[error("caller stream error")]
    CallerStream(#[source] io::Error),

    /// Malformed path, missing required input, or negative size. Raised
    /// at the API boundary before any network work.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// An infrastructure failure with no underlying cause.
    pub(crate) fn infra(message: impl Into<String>) -> Self {
        Error::Infrastructure { message: message.into(), source: None }
    }

    /// An infrastructure failure wrapping the error that caused it.
    pub(crate) fn infra_with(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Error::Infrastructure { message: message.into(), source: Some(source.into()) }
    }

    /// True for the semantic not-found kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::infra_with("malformed wire message", err)
    }
}
