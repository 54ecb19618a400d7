//! Unified error type for osis_bible
//!
//! Decode and source errors are recovered per book by the loaders; only
//! [`OsisError::NoBooksLoaded`] and [`OsisError::Superseded`] surface from a
//! top-level load.

use std::fmt;

/// Top-level error type for osis_bible operations
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OsisError {
    /// Malformed XML (unclosed tags, bad entities, invalid encoding)
    Xml(String),
    /// Decoded tree has no recognizable book or chapter division
    Structure(String),
    /// I/O error (description only, since `std::io::Error` is not `Clone`)
    Io(String),
    /// The source has no entry for the requested resource
    NotFound {
        /// Book id or fallback document name.
        resource: String,
    },
    /// A fetch did not complete within the configured timeout
    Timeout {
        /// Book id or fallback document name.
        resource: String,
        /// Timeout that expired, in milliseconds.
        millis: u64,
    },
    /// Reference text is not of the form `Book.Chapter[.Verse]`
    InvalidReference(String),
    /// A newer load request replaced this one before it finished
    Superseded {
        /// Generation of the discarded request.
        generation: u64,
    },
    /// Neither the per-book pass nor the fallback document produced a book
    NoBooksLoaded {
        /// Version whose load failed.
        version: String,
        /// Why the fallback document could not fill the gap, if it was tried.
        cause: Option<Box<OsisError>>,
    },
}

impl fmt::Display for OsisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsisError::Xml(msg) => write!(f, "XML error: {}", msg),
            OsisError::Structure(msg) => write!(f, "Invalid OSIS structure: {}", msg),
            OsisError::Io(msg) => write!(f, "I/O error: {}", msg),
            OsisError::NotFound { resource } => write!(f, "Source not found: {}", resource),
            OsisError::Timeout { resource, millis } => {
                write!(f, "Timed out after {} ms fetching {}", millis, resource)
            }
            OsisError::InvalidReference(text) => write!(f, "Invalid reference: '{}'", text),
            OsisError::Superseded { generation } => {
                write!(f, "Load request {} was superseded", generation)
            }
            OsisError::NoBooksLoaded { version, cause } => {
                write!(f, "No books could be loaded for version '{}'", version)?;
                if let Some(cause) = cause {
                    write!(f, " (fallback: {})", cause)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for OsisError {}

impl From<quick_xml::Error> for OsisError {
    fn from(err: quick_xml::Error) -> Self {
        OsisError::Xml(err.to_string())
    }
}

impl From<std::io::Error> for OsisError {
    fn from(err: std::io::Error) -> Self {
        OsisError::Io(err.to_string())
    }
}
