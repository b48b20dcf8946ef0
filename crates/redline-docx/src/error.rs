//! Error types for package access

use redline_core::{BuildError, LoadError};
use std::io;
use thiserror::Error;

/// Errors raised while opening, reading or writing a word-processing package
#[derive(Error, Debug)]
pub enum PackageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// ZIP archive error
    #[error("ZIP archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// UTF-8 conversion error
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A part the operation needs is absent from the archive
    #[error("missing part: {0}")]
    MissingPart(String),

    /// A part is present but not shaped as expected
    #[error("invalid package structure: {0}")]
    InvalidStructure(String),
}

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PackageError>;

impl From<quick_xml::events::attributes::AttrError> for PackageError {
    #[inline]
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(err.into())
    }
}

impl From<PackageError> for LoadError {
    #[inline]
    fn from(err: PackageError) -> Self {
        Self::MalformedPackage(err.to_string())
    }
}

impl From<PackageError> for BuildError {
    #[inline]
    fn from(err: PackageError) -> Self {
        Self::InvalidTemplate(err.to_string())
    }
}
