//! Error types and result aliases shared by the VNF manager crates.
//!
//! Errors are structured for programmatic handling and include context for
//! debugging.

use std::fmt;

/// The result type used by shared primitives.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling shared primitives.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A string did not parse as an identifier.
    #[error("invalid identifier: {message}")]
    InvalidId {
        /// What was wrong with it.
        message: String,
    },

    /// A configuration value was missing or malformed.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// Encoding or decoding a payload failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// The underlying codec error.
        message: String,
    },

    /// No entity exists under the given id.
    #[error("not found: {resource_type} with id {id}")]
    ResourceNotFound {
        /// Entity kind, e.g. `vnf` or `vnfd`.
        resource_type: &'static str,
        /// The id that was looked up.
        id: String,
    },
}

impl Error {
    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Builds a [`Error::ResourceNotFound`].
    #[must_use]
    pub fn resource_not_found(resource_type: &'static str, id: impl fmt::Display) -> Self {
        Self::ResourceNotFound {
            resource_type,
            id: id.to_string(),
        }
    }
}
