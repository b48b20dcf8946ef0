//! Error types for loading, parsing and building reviewed documents

use crate::config::ConfigError;
use crate::tags::TagKind;
use std::fmt;
use thiserror::Error;

/// Which end of a comment range a marker belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorSide {
    /// `commentRangeStart`
    Start,
    /// `commentRangeEnd`
    End,
}

impl fmt::Display for AnchorSide {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Errors and warnings raised while reading a package into a [`Document`](crate::Document)
///
/// Only `MalformedPackage` aborts a load. The other variants are recorded on the
/// document as warnings and the offending markup is dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// Body tree absent or not well-formed
    #[error("malformed package: {0}")]
    MalformedPackage(String),

    /// A comment range marker without its partner
    #[error("comment {id} has a range {side} marker but no matching partner")]
    DanglingCommentAnchor {
        /// Comment id as written in the package
        id: String,
        /// The side that was found
        side: AnchorSide,
    },

    /// Markup the reader does not understand, skipped
    #[error("skipped unsupported element <{name}> in paragraph {paragraph}")]
    UnsupportedElement {
        /// Qualified element name
        name: String,
        /// Index of the paragraph being read (or the next one, at body level)
        paragraph: usize,
    },
}

impl LoadError {
    /// True for the variants that abort a load
    #[inline]
    #[must_use = "checks whether the error aborts the load"]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedPackage(_))
    }
}

/// Errors from scanning and parsing annotated text
///
/// Offsets are byte offsets into the raw (unstripped) input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A tag opened inside a tag of the same kind, or closed across another tag
    #[error("unbalanced {kind} tag at offset {offset}")]
    UnbalancedTag {
        /// Kind of the offending delimiter
        kind: TagKind,
        /// Offset of the offending delimiter
        offset: usize,
    },

    /// An opening delimiter never closed before end of input
    #[error("unterminated {kind} tag opened at offset {offset}")]
    UnterminatedTag {
        /// Kind of the unclosed tag
        kind: TagKind,
        /// Offset of the unmatched opener
        offset: usize,
    },

    /// A replaced tag whose separator is missing or duplicated, or whose new text is empty
    #[error("malformed replaced tag at offset {offset}: {reason}")]
    MalformedReplaced {
        /// Offset of the replaced tag's opener
        offset: usize,
        /// What was wrong with it
        reason: String,
    },

    /// An explicit comment-anchor bracket not immediately followed by a comment
    #[error("comment anchor closed at offset {offset} is not followed by a comment")]
    DanglingCommentAnchor {
        /// Offset of the anchor's closing delimiter
        offset: usize,
    },
}

/// Either an invalid delimiter configuration or malformed markup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors from projecting parsed tags onto a template package
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Template is missing the body tree, comments part or relationships part
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// An allocated id already exists in the template
    #[error("{kind} id {id} already exists in the template")]
    IdCollision {
        /// "revision" or "comment"
        kind: &'static str,
        /// The colliding id
        id: u32,
    },

    /// A tag whose offsets do not fall inside the stripped text
    #[error("tag range {start}..{end} is outside text of length {len}")]
    TagOutOfRange {
        /// Tag start offset
        start: usize,
        /// Tag end offset
        end: usize,
        /// Stripped text length in bytes
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_fatality() {
        assert!(LoadError::MalformedPackage("no body".to_string()).is_fatal());
        assert!(!LoadError::DanglingCommentAnchor {
            id: "3".to_string(),
            side: AnchorSide::Start,
        }
        .is_fatal());
    }

    #[test]
    fn test_error_messages_name_offsets() {
        let err = ParseError::UnterminatedTag {
            kind: TagKind::Added,
            offset: 0,
        };
        assert_eq!(err.to_string(), "unterminated added tag opened at offset 0");

        let err = LoadError::DanglingCommentAnchor {
            id: "7".to_string(),
            side: AnchorSide::End,
        };
        assert!(err.to_string().contains("comment 7"));
        assert!(err.to_string().contains("end"));
    }
}
