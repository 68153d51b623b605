//! Error types for the `sse` crate.
//!
//! A root `Error` struct carries an `ErrorKind` plus the optional source error
//! that caused it, so callers can match on the kind while keeping the chain.

use std::error::Error as StdError;
use std::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// The kinds of failure the registry and the stream lifecycle can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No channel is registered under the targeted session id.
    NotConnected,
    /// The channel rejected a push. The registry entry has already been evicted.
    DeliveryFailed,
    /// Producing the next message (or waiting for it) failed.
    Production,
    /// A session id was empty.
    InvalidSessionId,
}

impl Error {
    pub fn new(error_kind: ErrorKind) -> Self {
        Self {
            source: None,
            error_kind,
        }
    }

    pub fn with_source(
        error_kind: ErrorKind,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            error_kind,
        }
    }

    pub fn not_connected() -> Self {
        Self::new(ErrorKind::NotConnected)
    }

    pub fn delivery_failed(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::with_source(ErrorKind::DeliveryFailed, source)
    }

    pub fn production(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::with_source(ErrorKind::Production, source)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::NotConnected => write!(f, "session is not connected"),
            ErrorKind::DeliveryFailed => write!(f, "message delivery failed"),
            ErrorKind::Production => write!(f, "message production failed"),
            ErrorKind::InvalidSessionId => write!(f, "session id must not be empty"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "SSE error: {}: {}", self.error_kind, source),
            None => write!(f, "SSE error: {}", self.error_kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}
