//! Markup parser: scanner tokens to an ordered tag list
//!
//! On top of the scanner this resolves what each comment is attached to:
//!
//! - an explicit anchor bracket closing exactly where the comment sits
//!   (`\anchor{text}\comment{body}`) attaches the comment to the bracketed range
//! - otherwise the tag that closed immediately before the comment
//!   (`\add{text}\comment{body}`) lends its range
//! - otherwise the comment marks an insertion point

use crate::config::{ConfigError, TagConfig};
use crate::error::{MarkupError, ParseError};
use crate::scanner::{MarkupScanner, Token};
use crate::tags::{sort_tags, Tag, TagPayload};

/// Stripped text and the tags over it, ordered by start offset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMarkup {
    pub stripped_text: String,
    pub tags: Vec<Tag>,
}

/// Parser for annotated review text
#[derive(Debug, Clone)]
pub struct MarkupParser<'a> {
    scanner: MarkupScanner<'a>,
}

impl<'a> MarkupParser<'a> {
    /// Create a parser for a delimiter configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has empty or ambiguous delimiters.
    pub fn new(config: &'a TagConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            scanner: MarkupScanner::new(config)?,
        })
    }

    /// Parse annotated text into stripped text and ordered tags
    ///
    /// # Errors
    ///
    /// Propagates scanner errors, and returns `DanglingCommentAnchor` when an
    /// anchor bracket is not immediately followed by a comment.
    pub fn parse(&self, input: &str) -> Result<ParsedMarkup, ParseError> {
        let scanned = self.scanner.scan(input)?;
        let mut tags = Vec::with_capacity(scanned.tokens.len());
        // (start, end, raw offset of the anchor's closer)
        let mut pending_anchor: Option<(usize, usize, usize)> = None;
        let mut last_closed: Option<(usize, usize)> = None;

        for token in scanned.tokens {
            match token {
                Token::Tag(tag) => {
                    if let Some((_, end, raw_offset)) = pending_anchor {
                        if end != tag.end {
                            return Err(ParseError::DanglingCommentAnchor { offset: raw_offset });
                        }
                    }
                    last_closed = Some((tag.start, tag.end));
                    tags.push(tag);
                }
                Token::Anchor {
                    start,
                    end,
                    raw_offset,
                } => {
                    if let Some((_, _, earlier)) = pending_anchor {
                        return Err(ParseError::DanglingCommentAnchor { offset: earlier });
                    }
                    pending_anchor = Some((start, end, raw_offset));
                }
                Token::Comment { offset, body, .. } => {
                    let (start, end) = match pending_anchor.take() {
                        Some((start, end, _)) if end == offset => (start, end),
                        Some((_, _, raw_offset)) => {
                            return Err(ParseError::DanglingCommentAnchor { offset: raw_offset });
                        }
                        None => match last_closed {
                            Some((start, end)) if end == offset => (start, end),
                            _ => (offset, offset),
                        },
                    };
                    log::debug!("comment anchored to {start}..{end}");
                    tags.push(Tag::new(start, end, TagPayload::Comment { body }));
                }
            }
        }

        if let Some((_, _, raw_offset)) = pending_anchor {
            return Err(ParseError::DanglingCommentAnchor { offset: raw_offset });
        }

        sort_tags(&mut tags);
        Ok(ParsedMarkup {
            stripped_text: scanned.stripped,
            tags,
        })
    }
}

/// Parse with a one-off parser
///
/// # Errors
///
/// Returns `MarkupError::Config` for an invalid delimiter configuration and
/// `MarkupError::Parse` for malformed markup.
pub fn parse_markup(input: &str, config: &TagConfig) -> Result<ParsedMarkup, MarkupError> {
    let parser = MarkupParser::new(config)?;
    Ok(parser.parse(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Delimiters;
    use crate::tags::TagKind;

    fn parse(input: &str) -> Result<ParsedMarkup, MarkupError> {
        parse_markup(input, &TagConfig::default())
    }

    #[test]
    fn test_plain_text_has_no_tags() {
        let parsed = parse("nothing to see").unwrap();
        assert_eq!(parsed.stripped_text, "nothing to see");
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_bracket_delimiters() {
        let config = TagConfig {
            added: Delimiters::new("[ADD]", "[/ADD]"),
            ..TagConfig::default()
        };
        let parsed = parse_markup("a[ADD]b[/ADD]c", &config).unwrap();
        assert_eq!(parsed.stripped_text, "abc");
        assert_eq!(parsed.tags, vec![Tag::new(1, 2, TagPayload::Added)]);
    }

    #[test]
    fn test_comment_attaches_to_preceding_tag() {
        let parsed = parse("keep \\add{this}\\comment{why?} rest").unwrap();
        assert_eq!(parsed.stripped_text, "keep this rest");
        assert_eq!(
            parsed.tags,
            vec![
                Tag::new(5, 9, TagPayload::Added),
                Tag::new(
                    5,
                    9,
                    TagPayload::Comment {
                        body: "why?".to_string()
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_comment_after_text_is_a_point() {
        let parsed = parse("ab\\comment{here}cd").unwrap();
        assert_eq!(parsed.stripped_text, "abcd");
        assert_eq!(parsed.tags.len(), 1);
        assert_eq!(parsed.tags[0].start, 2);
        assert!(parsed.tags[0].is_empty());
        assert_eq!(parsed.tags[0].body(), Some("here"));
    }

    #[test]
    fn test_comment_after_outer_tag_takes_outer_range() {
        let parsed = parse("\\add{a\\hl{b}}\\comment{c}").unwrap();
        let comment = parsed
            .tags
            .iter()
            .find(|t| t.kind() == TagKind::Comment)
            .unwrap();
        assert_eq!((comment.start, comment.end), (0, 2));
    }

    #[test]
    fn test_explicit_anchor() {
        let parsed = parse("x \\anchor{two words}\\comment{note} y").unwrap();
        assert_eq!(parsed.stripped_text, "x two words y");
        assert_eq!(
            parsed.tags,
            vec![Tag::new(
                2,
                11,
                TagPayload::Comment {
                    body: "note".to_string()
                }
            )]
        );
    }

    #[test]
    fn test_explicit_anchor_wins_over_enclosing_tag() {
        let parsed = parse("\\add{a\\anchor{b}}\\comment{c}").unwrap();
        let comment = parsed
            .tags
            .iter()
            .find(|t| t.kind() == TagKind::Comment)
            .unwrap();
        assert_eq!((comment.start, comment.end), (1, 2));
    }

    #[test]
    fn test_anchor_without_comment() {
        let err = parse("\\anchor{lonely} text").unwrap_err();
        assert!(matches!(
            err,
            MarkupError::Parse(ParseError::DanglingCommentAnchor { .. })
        ));
    }

    #[test]
    fn test_tags_sorted_by_start() {
        let parsed = parse("\\del{a} b \\add{c} \\hl{d}").unwrap();
        let starts: Vec<usize> = parsed.tags.iter().map(|t| t.start).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
        assert_eq!(parsed.tags.len(), 3);
    }

    #[test]
    fn test_same_kind_nesting() {
        let err = parse("\\add{x\\add{y}z}").unwrap_err();
        assert!(matches!(
            err,
            MarkupError::Parse(ParseError::UnbalancedTag {
                kind: TagKind::Added,
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_config() {
        let mut config = TagConfig::default();
        config.added.start.clear();
        assert!(matches!(
            parse_markup("x", &config),
            Err(MarkupError::Config(_))
        ));
    }
}
