//! Delimiter and review configuration
//!
//! Configuration is always passed in explicitly; nothing here reads the
//! environment. The CLI layers config files and environment variables on top
//! of these defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Author used for synthesized revisions and comments when none is configured
pub const DEFAULT_AUTHOR: &str = "redline";

/// Highlight colour written for highlight tags
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "yellow";

/// Errors from validating a [`TagConfig`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A delimiter string is empty
    #[error("delimiter '{0}' must not be empty")]
    EmptyDelimiter(&'static str),

    /// Two kinds share an opening delimiter
    #[error("opening delimiter {0:?} is used by more than one tag kind")]
    AmbiguousDelimiter(String),
}

/// An opening/closing delimiter pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delimiters {
    pub start: String,
    pub end: String,
}

impl Delimiters {
    #[inline]
    #[must_use = "creates a delimiter pair"]
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Wrap `text` in this pair
    #[inline]
    #[must_use = "returns the wrapped text"]
    pub fn wrap(&self, text: &str) -> String {
        format!("{}{text}{}", self.start, self.end)
    }
}

/// Delimiters of a replaced tag: `start old separator new end`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplacedDelimiters {
    pub start: String,
    pub separator: String,
    pub end: String,
}

impl ReplacedDelimiters {
    #[inline]
    #[must_use = "returns the wrapped substitution"]
    pub fn wrap(&self, old: &str, new: &str) -> String {
        format!("{}{old}{}{new}{}", self.start, self.separator, self.end)
    }
}

/// Delimiters for every tag kind
///
/// `anchor` brackets the range a following comment attaches to; without it a
/// comment attaches to the span immediately before it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TagConfig {
    pub added: Delimiters,
    pub deleted: Delimiters,
    pub highlight: Delimiters,
    pub comment: Delimiters,
    pub anchor: Delimiters,
    pub replaced: ReplacedDelimiters,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            added: Delimiters::new("\\add{", "}"),
            deleted: Delimiters::new("\\del{", "}"),
            highlight: Delimiters::new("\\hl{", "}"),
            comment: Delimiters::new("\\comment{", "}"),
            anchor: Delimiters::new("\\anchor{", "}"),
            replaced: ReplacedDelimiters {
                start: "\\repl{".to_string(),
                separator: "}{".to_string(),
                end: "}".to_string(),
            },
        }
    }
}

impl TagConfig {
    /// Check that every delimiter is non-empty and openers are distinct
    ///
    /// # Errors
    ///
    /// Returns `EmptyDelimiter` naming the first empty field, or
    /// `AmbiguousDelimiter` when two kinds share an opening string.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields: [(&'static str, &str); 13] = [
            ("added.start", &self.added.start),
            ("added.end", &self.added.end),
            ("deleted.start", &self.deleted.start),
            ("deleted.end", &self.deleted.end),
            ("highlight.start", &self.highlight.start),
            ("highlight.end", &self.highlight.end),
            ("comment.start", &self.comment.start),
            ("comment.end", &self.comment.end),
            ("anchor.start", &self.anchor.start),
            ("anchor.end", &self.anchor.end),
            ("replaced.start", &self.replaced.start),
            ("replaced.separator", &self.replaced.separator),
            ("replaced.end", &self.replaced.end),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
            return Err(ConfigError::EmptyDelimiter(name));
        }

        let mut openers = vec![
            &self.added.start,
            &self.deleted.start,
            &self.highlight.start,
            &self.comment.start,
            &self.anchor.start,
            &self.replaced.start,
        ];
        openers.sort();
        if let Some(pair) = openers.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::AmbiguousDelimiter(pair[0].to_string()));
        }
        Ok(())
    }
}

/// Options shared by the reader, renderer and writer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewOptions {
    pub tags: TagConfig,
    /// Fold adjacent runs of the same revision into one span
    pub merge_revisions: bool,
    /// Interleave comments in the tagged transcript
    pub include_comments: bool,
    /// Author written on synthesized revisions and comments
    pub author: String,
    pub highlight_color: String,
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self {
            tags: TagConfig::default(),
            merge_revisions: true,
            include_comments: true,
            author: DEFAULT_AUTHOR.to_string(),
            highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
        }
    }
}
