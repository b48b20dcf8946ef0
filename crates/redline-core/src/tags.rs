//! Typed spans produced by the markup parser

use serde::Serialize;
use std::fmt;

/// The five kinds of inline review markup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Inserted text
    Added,
    /// Deleted text (still visible in the stripped text)
    Deleted,
    /// Old text swapped for new text; only the new text is visible
    Replaced,
    /// Highlighted text, no revision
    Highlight,
    /// A comment anchored to a range or point
    Comment,
}

impl fmt::Display for TagKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Replaced => "replaced",
            Self::Highlight => "highlight",
            Self::Comment => "comment",
        };
        write!(f, "{s}")
    }
}

/// Kind-specific data carried by a [`Tag`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TagPayload {
    Added,
    Deleted,
    Replaced {
        /// Text before the change; not part of the stripped text
        old: String,
    },
    Highlight,
    Comment {
        /// Free-text comment body
        body: String,
    },
}

/// A typed span over the stripped text
///
/// `start` and `end` are byte offsets into the stripped text, `start <= end`.
/// Only comments may be empty; a replaced tag always covers at least one byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Tag {
    pub start: usize,
    pub end: usize,
    #[serde(flatten)]
    pub payload: TagPayload,
}

impl Tag {
    #[inline]
    #[must_use = "creates a tag"]
    pub const fn new(start: usize, end: usize, payload: TagPayload) -> Self {
        Self {
            start,
            end,
            payload,
        }
    }

    #[inline]
    #[must_use = "returns the tag kind"]
    pub const fn kind(&self) -> TagKind {
        match self.payload {
            TagPayload::Added => TagKind::Added,
            TagPayload::Deleted => TagKind::Deleted,
            TagPayload::Replaced { .. } => TagKind::Replaced,
            TagPayload::Highlight => TagKind::Highlight,
            TagPayload::Comment { .. } => TagKind::Comment,
        }
    }

    #[inline]
    #[must_use = "returns whether the tag covers no text"]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `[start, end)` lies inside this tag's range
    #[inline]
    #[must_use = "returns whether the range is covered"]
    pub const fn covers(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end && start < end
    }

    /// Pre-change text of a replaced tag
    #[inline]
    #[must_use = "returns the replaced text"]
    pub fn old_text(&self) -> Option<&str> {
        match &self.payload {
            TagPayload::Replaced { old } => Some(old),
            _ => None,
        }
    }

    /// Body of a comment tag
    #[inline]
    #[must_use = "returns the comment body"]
    pub fn body(&self) -> Option<&str> {
        match &self.payload {
            TagPayload::Comment { body } => Some(body),
            _ => None,
        }
    }
}

/// Order tags by start offset, outer tags before the tags they contain
pub(crate) fn sort_tags(tags: &mut [Tag]) {
    tags.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
}
