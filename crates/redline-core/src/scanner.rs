//! Single-pass delimiter scanner for annotated text
//!
//! The scanner walks the input once, left to right, keeping an explicit stack
//! of open tags. Text outside delimiters is copied to the stripped text, and
//! every offset it records is an offset into that stripped text. Comment bodies
//! and the old half of a replaced tag are payload, not stripped text.

use crate::config::{ConfigError, TagConfig};
use crate::error::ParseError;
use crate::tags::{Tag, TagKind, TagPayload};

/// Something the scanner closed, in closing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A closed added, deleted, replaced or highlight tag
    Tag(Tag),
    /// An explicit comment-anchor bracket over `start..end`
    Anchor {
        start: usize,
        end: usize,
        /// Raw offset of the closing delimiter
        raw_offset: usize,
    },
    /// A comment body positioned at `offset` in the stripped text
    Comment {
        offset: usize,
        body: String,
        /// Raw offset of the opening delimiter
        raw_offset: usize,
    },
}

/// Stripped text plus the tokens found while producing it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    pub stripped: String,
    pub tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Added,
    Deleted,
    Highlight,
    Replaced,
    Comment,
    Anchor,
}

impl FrameKind {
    /// Tag kind reported in errors; anchors belong to comments
    const fn tag_kind(self) -> TagKind {
        match self {
            Self::Added => TagKind::Added,
            Self::Deleted => TagKind::Deleted,
            Self::Highlight => TagKind::Highlight,
            Self::Replaced => TagKind::Replaced,
            Self::Comment | Self::Anchor => TagKind::Comment,
        }
    }
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    /// Raw offset of the opening delimiter
    raw_offset: usize,
    /// Stripped offset where the visible range starts
    start: usize,
    /// Comment body, or the old half of a replaced tag
    payload: String,
    /// For replaced tags: the separator has been seen
    in_new: bool,
}

/// Tokenizer for the configured delimiter vocabulary
#[derive(Debug, Clone)]
pub struct MarkupScanner<'a> {
    config: &'a TagConfig,
    /// Openers, longest first so longer delimiters win on shared prefixes
    openers: Vec<(FrameKind, &'a str)>,
}

impl<'a> MarkupScanner<'a> {
    /// Create a scanner for a delimiter configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has empty or ambiguous delimiters.
    pub fn new(config: &'a TagConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut openers = vec![
            (FrameKind::Added, config.added.start.as_str()),
            (FrameKind::Deleted, config.deleted.start.as_str()),
            (FrameKind::Highlight, config.highlight.start.as_str()),
            (FrameKind::Replaced, config.replaced.start.as_str()),
            (FrameKind::Comment, config.comment.start.as_str()),
            (FrameKind::Anchor, config.anchor.start.as_str()),
        ];
        openers.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        Ok(Self { config, openers })
    }

    fn closer(&self, kind: FrameKind) -> &'a str {
        match kind {
            FrameKind::Added => &self.config.added.end,
            FrameKind::Deleted => &self.config.deleted.end,
            FrameKind::Highlight => &self.config.highlight.end,
            FrameKind::Replaced => &self.config.replaced.end,
            FrameKind::Comment => &self.config.comment.end,
            FrameKind::Anchor => &self.config.anchor.end,
        }
    }

    /// Scan `input` into stripped text and tokens
    ///
    /// # Errors
    ///
    /// - `UnbalancedTag` when a tag opens inside a tag of the same kind, or a
    ///   closing delimiter would cross another open tag
    /// - `UnterminatedTag` when input ends with a tag still open
    /// - `MalformedReplaced` when a replaced tag's separator is missing or
    ///   repeated, or its new text is empty
    pub fn scan(&self, input: &str) -> Result<ScanOutput, ParseError> {
        let separator = self.config.replaced.separator.as_str();
        let mut out = ScanOutput::default();
        let mut stack: Vec<Frame> = Vec::new();
        let mut pos = 0;

        while pos < input.len() {
            let rest = &input[pos..];

            // Payload frames only look for their own terminators
            if let Some(top) = stack.last_mut() {
                match top.kind {
                    FrameKind::Comment => {
                        let closer = self.closer(FrameKind::Comment);
                        if !rest.starts_with(closer) {
                            pos += push_char(&mut top.payload, rest);
                            continue;
                        }
                    }
                    FrameKind::Replaced if !top.in_new => {
                        if rest.starts_with(separator) {
                            pos += separator.len();
                            top.in_new = true;
                            top.start = out.stripped.len();
                        } else if rest.starts_with(self.closer(FrameKind::Replaced)) {
                            return Err(ParseError::MalformedReplaced {
                                offset: top.raw_offset,
                                reason: format!("missing separator {separator:?}"),
                            });
                        } else {
                            pos += push_char(&mut top.payload, rest);
                        }
                        continue;
                    }
                    FrameKind::Replaced if rest.starts_with(separator) => {
                        return Err(ParseError::MalformedReplaced {
                            offset: top.raw_offset,
                            reason: format!("separator {separator:?} appears twice"),
                        });
                    }
                    _ => {}
                }
            }

            let top_closer = stack.last().map(|top| self.closer(top.kind));
            if let Some(closer) = top_closer.filter(|c| rest.starts_with(c)) {
                if let Some(frame) = stack.pop() {
                    self.close(frame, &mut out, pos)?;
                }
                pos += closer.len();
                continue;
            }

            if let Some(&(kind, opener)) = self.openers.iter().find(|(_, o)| rest.starts_with(o)) {
                let nests_same_kind = kind != FrameKind::Comment
                    && stack.iter().any(|frame| frame.kind == kind);
                if nests_same_kind {
                    return Err(ParseError::UnbalancedTag {
                        kind: kind.tag_kind(),
                        offset: pos,
                    });
                }
                stack.push(Frame {
                    kind,
                    raw_offset: pos,
                    start: out.stripped.len(),
                    payload: String::new(),
                    in_new: false,
                });
                pos += opener.len();
                continue;
            }

            // A closer belonging to a frame below the top would cross tags
            if let Some(frame) = stack
                .iter()
                .rev()
                .skip(1)
                .find(|frame| rest.starts_with(self.closer(frame.kind)))
            {
                return Err(ParseError::UnbalancedTag {
                    kind: frame.kind.tag_kind(),
                    offset: pos,
                });
            }

            pos += push_char(&mut out.stripped, rest);
        }

        if let Some(frame) = stack.first() {
            return Err(ParseError::UnterminatedTag {
                kind: frame.kind.tag_kind(),
                offset: frame.raw_offset,
            });
        }
        Ok(out)
    }

    /// Turn a popped frame into a token
    fn close(&self, frame: Frame, out: &mut ScanOutput, raw_close: usize) -> Result<(), ParseError> {
        let end = out.stripped.len();
        let payload = match frame.kind {
            FrameKind::Added => TagPayload::Added,
            FrameKind::Deleted => TagPayload::Deleted,
            FrameKind::Highlight => TagPayload::Highlight,
            FrameKind::Replaced => {
                if frame.start == end {
                    return Err(ParseError::MalformedReplaced {
                        offset: frame.raw_offset,
                        reason: "replacement text is empty".to_string(),
                    });
                }
                TagPayload::Replaced { old: frame.payload }
            }
            FrameKind::Anchor => {
                out.tokens.push(Token::Anchor {
                    start: frame.start,
                    end,
                    raw_offset: raw_close,
                });
                return Ok(());
            }
            FrameKind::Comment => {
                out.tokens.push(Token::Comment {
                    offset: end,
                    body: frame.payload,
                    raw_offset: frame.raw_offset,
                });
                return Ok(());
            }
        };

        if frame.start == end {
            log::debug!(
                "dropping empty {} tag at offset {}",
                frame.kind.tag_kind(),
                frame.raw_offset
            );
            return Ok(());
        }
        out.tokens.push(Token::Tag(Tag::new(frame.start, end, payload)));
        Ok(())
    }
}

/// Copy the first char of `rest` into `buf`, returning its byte length
#[inline]
fn push_char(buf: &mut String, rest: &str) -> usize {
    rest.chars().next().map_or(0, |c| {
        buf.push(c);
        c.len_utf8()
    })
}
