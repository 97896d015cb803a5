//! Error types for the identifier codec.

use miette::Diagnostic;
use thiserror::Error;

/// Errors raised while decoding or encoding identifiers.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Invalid identifier: {value}")]
    #[diagnostic(
        code(depot_id::invalid_identifier),
        help("Identifiers look like `<category>-<subtype...>-<uuid>`, e.g. `repositories-deb-apt-<uuid>`")
    )]
    InvalidIdentifier { value: String },

    #[error("Unknown repository type: {0}")]
    #[diagnostic(
        code(depot_id::unknown_repo_type),
        help("Valid repository types are: apt, yum, python, file")
    )]
    UnknownRepoType(String),

    #[error("Unknown package type: {0}")]
    #[diagnostic(
        code(depot_id::unknown_package_type),
        help("Valid package types are: deb, deb_src, rpm, python, file")
    )]
    UnknownPackageType(String),
}

impl IdError {
    pub(crate) fn invalid(value: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
        }
    }
}

/// A specialized Result type for identifier operations.
pub type Result<T> = std::result::Result<T, IdError>;
